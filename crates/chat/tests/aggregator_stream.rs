mod common;

use std::sync::Arc;

use cogito_chat::{
    AccumulatedResponse, CANCELLED_DETAIL, CompletionCall, Generation, Message, RequestOptions,
    ResponseAggregator, ResponseStatus, StreamSessionId, StreamTarget, UNTERMINATED_STREAM_DETAIL,
};
use cogito_llm::{LlmProvider, StreamEvent};
use tokio::sync::oneshot;

use common::{Script, ScriptedProvider, content, error, reasoning, wait_until};

fn target() -> StreamTarget {
    StreamTarget::new(Generation::new(0), StreamSessionId::new(7))
}

fn aggregator(provider: Arc<ScriptedProvider>) -> ResponseAggregator {
    ResponseAggregator::new(
        Some(provider as Arc<dyn LlmProvider>),
        RequestOptions::new("scripted-model")
            .with_temperature(Some(0.3))
            .with_max_tokens(Some(256)),
    )
}

fn snapshot() -> Vec<Message> {
    vec![Message::system("S"), Message::user("add two numbers in code")]
}

#[tokio::test]
async fn complete_stream_returns_both_channels() {
    let provider = ScriptedProvider::new([Script::Events(vec![
        reasoning("Consider"),
        reasoning(" edge cases."),
        content("def add(a,b): return a+b"),
        StreamEvent::Done,
    ])]);
    let aggregator = aggregator(provider.clone());

    let mut updates = Vec::new();
    let response = aggregator
        .run(CompletionCall::new(target(), snapshot()), |update| {
            updates.push(update.clone())
        })
        .await
        .expect("configured");

    assert_eq!(
        response,
        AccumulatedResponse {
            reasoning: "Consider edge cases.".to_string(),
            content: "def add(a,b): return a+b".to_string(),
            status: ResponseStatus::Complete,
        }
    );
    assert_eq!(updates.last(), Some(&response));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, target());
    assert_eq!(requests[0].model_id, "scripted-model");
    assert_eq!(requests[0].temperature, Some(0.3));
    assert_eq!(requests[0].max_tokens, Some(256));
    assert_eq!(requests[0].messages.len(), 2);
}

#[tokio::test]
async fn buffered_events_are_coalesced_into_one_update() {
    // The scripted worker sends everything before the aggregator is polled
    // again, so the whole burst is drained in one pass.
    let provider = ScriptedProvider::new([Script::Events(vec![
        content("a"),
        content("b"),
        content("c"),
        StreamEvent::Done,
    ])]);

    let mut updates = Vec::new();
    let response = aggregator(provider)
        .run(CompletionCall::new(target(), snapshot()), |update| {
            updates.push(update.clone())
        })
        .await
        .expect("configured");

    assert_eq!(response.content, "abc");
    assert_eq!(updates, vec![response]);
}

#[tokio::test]
async fn error_event_fails_with_detail_and_keeps_partial_text() {
    let provider = ScriptedProvider::new([Script::Events(vec![
        reasoning("thinking"),
        error("connection reset"),
        content("never seen"),
    ])]);

    let response = aggregator(provider)
        .collect(CompletionCall::new(target(), snapshot()))
        .await
        .expect("configured");

    assert_eq!(response.failure_detail(), Some("connection reset"));
    assert_eq!(response.reasoning, "thinking");
    assert!(response.content.is_empty());
}

#[tokio::test]
async fn stream_closing_without_terminal_event_fails() {
    let provider = ScriptedProvider::new([Script::Events(vec![content("half an ans")])]);

    let response = aggregator(provider)
        .collect(CompletionCall::new(target(), snapshot()))
        .await
        .expect("configured");

    assert_eq!(response.failure_detail(), Some(UNTERMINATED_STREAM_DETAIL));
    assert_eq!(response.content, "half an ans");
}

#[tokio::test]
async fn rejected_handshake_fails_without_events() {
    let provider = ScriptedProvider::new([Script::Reject]);

    let mut updates = Vec::new();
    let response = aggregator(provider)
        .run(CompletionCall::new(target(), snapshot()), |update| {
            updates.push(update.clone())
        })
        .await
        .expect("configured");

    assert!(matches!(response.status, ResponseStatus::Failed { .. }));
    assert_eq!(updates, vec![response]);
}

#[tokio::test]
async fn events_for_other_calls_are_dropped() {
    let provider = ScriptedProvider::new([Script::Foreign {
        foreign: vec![content("stale "), StreamEvent::Done],
        events: vec![content("fresh"), StreamEvent::Done],
    }]);

    let response = aggregator(provider)
        .collect(CompletionCall::new(target(), snapshot()))
        .await
        .expect("configured");

    assert_eq!(response.content, "fresh");
    assert!(response.is_complete());
}

#[tokio::test]
async fn cancellation_resolves_as_failed() {
    let provider = ScriptedProvider::new([Script::Hang]);
    let aggregator = aggregator(provider);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let run = aggregator.collect(CompletionCall::new(target(), snapshot()).with_cancel(cancel_rx));
    let cancel = async {
        tokio::task::yield_now().await;
        let _ = cancel_tx.send(());
    };
    let (response, ()) = tokio::join!(run, cancel);

    let response = response.expect("configured");
    assert_eq!(response.failure_detail(), Some(CANCELLED_DETAIL));
}

#[tokio::test]
async fn intermediate_updates_grow_monotonically() {
    let (gate_tx, gate_rx) = oneshot::channel();
    let provider = ScriptedProvider::new([Script::Gated {
        before: vec![reasoning("step one. "), content("par")],
        gate: gate_rx,
        after: vec![reasoning("step two."), content("tial"), StreamEvent::Done],
    }]);
    let aggregator = aggregator(provider);

    let updates = std::sync::Mutex::new(Vec::<AccumulatedResponse>::new());
    let run = aggregator.run(CompletionCall::new(target(), snapshot()), |update| {
        updates.lock().expect("updates lock").push(update.clone())
    });
    let release = async {
        wait_until(|| !updates.lock().expect("updates lock").is_empty()).await;
        let _ = gate_tx.send(());
    };
    let (response, ()) = tokio::join!(run, release);
    let response = response.expect("configured");

    let updates = updates.into_inner().expect("updates lock");
    assert!(updates.len() >= 2);
    assert_eq!(updates[0].status, ResponseStatus::InProgress);
    assert_eq!(updates[0].content, "par");
    for pair in updates.windows(2) {
        assert!(pair[1].reasoning.starts_with(&pair[0].reasoning));
        assert!(pair[1].content.starts_with(&pair[0].content));
    }
    assert_eq!(response.content, "partial");
    assert_eq!(response.reasoning, "step one. step two.");
}
