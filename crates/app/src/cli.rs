use std::path::PathBuf;

use clap::Parser;

use crate::settings::Settings;

/// Terminal chat client for DeepSeek reasoning models.
#[derive(Debug, Parser)]
#[command(name = "cogito", version, about)]
pub struct Args {
    /// Settings file to load instead of the per-user default.
    #[arg(long, env = "COGITO_CONFIG")]
    pub config: Option<PathBuf>,

    /// API key for the completion service.
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Model id to request, e.g. `deepseek-reasoner` or `deepseek-chat`.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Replace the configured system prompt.
    #[arg(long, conflicts_with = "no_system_prompt")]
    pub system_prompt: Option<String>,

    /// Start the conversation without a system message.
    #[arg(long)]
    pub no_system_prompt: bool,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u64>,

    /// Do not print the model's reasoning while it streams.
    #[arg(long)]
    pub hide_reasoning: bool,

    /// Show the system message and other advanced details.
    #[arg(long)]
    pub advanced: bool,

    /// Write the effective settings back to the settings file.
    #[arg(long)]
    pub save_settings: bool,
}

impl Args {
    /// Layers command-line overrides on top of loaded settings.
    pub fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(api_key) = &self.api_key {
            settings.api_key = api_key.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.model {
            settings.model_name = model.clone();
        }
        if let Some(system_prompt) = &self.system_prompt {
            settings.system_prompt = system_prompt.clone();
        }
        if self.no_system_prompt {
            settings.system_prompt.clear();
        }
        if self.temperature.is_some() {
            settings.temperature = self.temperature;
        }
        if self.max_tokens.is_some() {
            settings.max_tokens = self.max_tokens;
        }
        if self.hide_reasoning {
            settings.show_reasoning = false;
        }
        if self.advanced {
            settings.show_advanced = true;
        }
        settings.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("cogito").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn no_flags_keep_loaded_settings() {
        let loaded = Settings {
            api_key: "sk-file".to_string(),
            ..Settings::default()
        };
        let args = Args {
            api_key: None,
            ..parse(&[])
        };
        assert_eq!(args.apply_overrides(loaded.clone()), loaded);
    }

    #[test]
    fn flags_override_loaded_settings() {
        let args = parse(&[
            "--api-key",
            "sk-cli",
            "--model",
            "deepseek-chat",
            "--temperature",
            "0.2",
            "--hide-reasoning",
            "--advanced",
        ]);
        let settings = args.apply_overrides(Settings::default());

        assert_eq!(settings.api_key, "sk-cli");
        assert_eq!(settings.model_name, "deepseek-chat");
        assert_eq!(settings.temperature, Some(0.2));
        assert!(!settings.show_reasoning);
        assert!(settings.show_advanced);
    }

    #[test]
    fn system_prompt_can_be_replaced_or_disabled() {
        let replaced = parse(&["--system-prompt", "Be brief."]).apply_overrides(Settings::default());
        assert_eq!(replaced.system_prompt(), Some("Be brief."));

        let disabled = parse(&["--no-system-prompt"]).apply_overrides(Settings::default());
        assert_eq!(disabled.system_prompt(), None);
    }

    #[test]
    fn conflicting_system_prompt_flags_are_rejected() {
        let result = Args::try_parse_from([
            "cogito",
            "--system-prompt",
            "x",
            "--no-system-prompt",
        ]);
        assert!(result.is_err());
    }
}
