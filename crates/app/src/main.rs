mod cli;
mod render;
mod repl;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cogito_chat::SessionController;
use cogito_llm::{LlmProvider, create_provider};
use snafu::{ResultExt, Snafu};
use tracing_subscriber::{EnvFilter, fmt};

use cli::Args;
use repl::{Repl, ReplError};
use settings::{Settings, SettingsError, SettingsStore};

#[derive(Debug, Snafu)]
enum AppError {
    #[snafu(display("failed to save settings on `{stage}`: {source}"))]
    SaveSettings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("chat loop stopped on `{stage}`: {source}"))]
    Repl {
        stage: &'static str,
        source: ReplError,
    },
}

type AppResult<T> = Result<T, AppError>;

/// Application entry point.
///
/// Logs go to stderr so they never interleave with streamed answers; the
/// default level is `warn` and `RUST_LOG` overrides it.
#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "cogito exited with an error");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> AppResult<()> {
    let mut store = match &args.config {
        Some(path) => SettingsStore::load_from(path.clone()),
        None => SettingsStore::load(),
    };
    let settings = args.apply_overrides(store.settings().clone());

    if args.save_settings {
        store.update(settings.clone()).context(SaveSettingsSnafu {
            stage: "save-effective-settings",
        })?;
        println!("Saved settings to {}", store.config_path().display());
    }

    let controller = SessionController::new(
        build_provider(&settings),
        settings.request_options(),
        settings.system_prompt(),
    );

    Repl::new(controller, &settings)
        .run()
        .await
        .context(ReplSnafu {
            stage: "run-chat-loop",
        })
}

fn build_provider(settings: &Settings) -> Option<Arc<dyn LlmProvider>> {
    let Some(config) = settings.to_provider_config() else {
        tracing::warn!("no API key configured; turns will be rejected");
        return None;
    };

    match create_provider(config) {
        Ok(provider) => {
            tracing::info!(
                provider = provider.id(),
                model = %settings.model_name,
                "completion provider ready"
            );
            Some(provider)
        }
        Err(error) => {
            tracing::error!(error = %error, "failed to initialize completion provider");
            None
        }
    }
}
