//! Per-iteration mechanics used by [`super::harness::Harness`]: the retrying,
//! cancellable model call and call-id normalization.

use super::events::{EventHandler, HarnessEvent};
use crate::Message;
use crate::api::gateway::{GatewayError, ModelGateway, ModelRequest, ModelResponse};
use crate::api::retry::RetryConfig;
use crate::api::trace::generate_call_id;
use crate::transcript::Transcript;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why [`complete_with_retry`] gave up.
#[derive(Debug)]
pub(crate) enum CallError {
    Cancelled,
    Failed { error: GatewayError, attempts: u32 },
}

/// Ask the gateway for the next assistant message.
///
/// Transient failures are retried with backoff up to `retry.max_retries`
/// times; fatal failures return at once. Both the call and the backoff sleep
/// are raced against `cancel`.
pub(crate) async fn complete_with_retry(
    gateway: &dyn ModelGateway,
    request: ModelRequest<'_>,
    retry: &RetryConfig,
    cancel: &CancellationToken,
    event_handler: &dyn EventHandler,
) -> Result<ModelResponse, CallError> {
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
            r = gateway.complete(request) => r,
        };

        match result {
            Ok(response) => return Ok(response),
            Err(error) if error.is_transient() && attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                attempt += 1;
                let message = error.to_string();
                event_handler.on_event(&HarnessEvent::GatewayRetry {
                    attempt,
                    max_retries: retry.max_retries,
                    delay,
                    error: &message,
                });
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(CallError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(error) => {
                return Err(CallError::Failed {
                    error,
                    attempts: attempt + 1,
                });
            }
        }
    }
}

/// Give every tool call in `message` an id that is non-empty and unique
/// across the transcript. Returns the number of calls re-keyed.
pub(crate) fn normalize_call_ids(
    message: &mut Message,
    transcript: &Transcript,
    trace_id: &str,
    iteration: u32,
) -> usize {
    let Some(calls) = message.tool_calls.as_mut() else {
        return 0;
    };

    let mut seen: HashSet<String> = transcript
        .messages()
        .iter()
        .flat_map(|m| m.tool_calls())
        .map(|c| c.id.clone())
        .collect();

    let mut rekeyed = 0;
    for (index, call) in calls.iter_mut().enumerate() {
        if call.id.trim().is_empty() || seen.contains(&call.id) {
            let base = generate_call_id(trace_id, iteration, index);
            let mut fresh = base.clone();
            let mut n = 1;
            while seen.contains(&fresh) {
                fresh = format!("{base}-{n}");
                n += 1;
            }
            debug!("Re-keyed tool call {index} ('{}') as '{fresh}'", call.id);
            call.id = fresh;
            rekeyed += 1;
        }
        seen.insert(call.id.clone());
    }
    rekeyed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;

    #[test]
    fn unique_ids_are_untouched() {
        let transcript = Transcript::new(None, "task");
        let mut message = Message::assistant(
            None,
            vec![ToolCall::new("a", "add", "{}"), ToolCall::new("b", "add", "{}")],
        );
        assert_eq!(normalize_call_ids(&mut message, &transcript, "tr", 1), 0);
        assert_eq!(message.tool_calls()[0].id, "a");
        assert_eq!(message.tool_calls()[1].id, "b");
    }

    #[test]
    fn empty_and_duplicate_ids_are_rekeyed() {
        let transcript = Transcript::new(None, "task");
        let mut message = Message::assistant(
            None,
            vec![
                ToolCall::new("", "add", "{}"),
                ToolCall::new("x", "add", "{}"),
                ToolCall::new("x", "add", "{}"),
            ],
        );
        assert_eq!(normalize_call_ids(&mut message, &transcript, "tr", 2), 2);
        let ids: Vec<&str> = message.tool_calls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call-tr:i2-0", "x", "call-tr:i2-2"]);
    }

    #[test]
    fn ids_used_in_earlier_rounds_are_rekeyed() {
        let mut transcript = Transcript::new(None, "task");
        transcript
            .commit_round(
                Message::assistant(None, vec![ToolCall::new("c1", "add", "{}")]),
                vec![Message::tool_result("c1", "7")],
            )
            .unwrap();
        let mut message = Message::assistant(None, vec![ToolCall::new("c1", "add", "{}")]);
        assert_eq!(normalize_call_ids(&mut message, &transcript, "tr", 2), 1);
        assert_ne!(message.tool_calls()[0].id, "c1");
    }

    #[test]
    fn final_answers_have_nothing_to_normalize() {
        let transcript = Transcript::new(None, "task");
        let mut message = Message::assistant_text("35");
        assert_eq!(normalize_call_ids(&mut message, &transcript, "tr", 1), 0);
    }
}
