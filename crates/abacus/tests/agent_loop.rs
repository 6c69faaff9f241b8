//! Integration tests for the agent loop.
//!
//! Each test drives a real [`Harness`] with the arithmetic tools against a
//! scripted model gateway, then inspects the outcome and transcript.

mod common;

use abacus::api::gateway::GatewayError;
use abacus::prelude::*;
use abacus::transcript::TranscriptError;
use common::*;
use serde_json::json;
use std::time::Duration;

// ── Happy path ───────────────────────────────────────────────────────

#[tokio::test]
async fn add_divide_multiply_reports_35() {
    let gateway = ScriptedGateway::new(vec![
        respond_calls(vec![
            call("c1", "add", json!({"a": 3, "b": 4})),
            call("c2", "divide", json!({"a": 10, "b": 2})),
        ]),
        respond_calls(vec![call("c3", "multiply", json!({"a": 7, "b": 5}))]),
        respond_answer("The final result is 35."),
    ]);
    let tools = arithmetic_tools();
    let recorder = Recorder::default();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .with_event_handler(&recorder)
        .run("add 3 and 4, then divide 10 by 2, then multiply the two results")
        .await
        .unwrap();

    assert_eq!(outcome.iterations, 3);
    assert!(outcome.text().contains("35"));
    assert!(outcome.finished_at >= outcome.started_at);

    let messages = outcome.transcript.messages();
    let roles: Vec<String> = messages.iter().map(|m| m.role.to_string()).collect();
    assert_eq!(
        roles,
        vec!["system", "user", "assistant", "tool", "tool", "assistant", "tool", "assistant"]
    );
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(messages[3].text(), "7");
    assert_eq!(messages[4].tool_call_id.as_deref(), Some("c2"));
    assert_eq!(messages[4].text(), "5");
    assert_eq!(messages[6].text(), "35");
    outcome.transcript.verify().unwrap();

    // The second request already carries both results.
    let requests = gateway.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].len(), 5);
    assert_eq!(requests[1][4].text(), "5");

    assert_eq!(recorder.count("round:"), 3);
    assert_eq!(recorder.count("result:"), 3);
    assert_eq!(recorder.labels().last().map(String::as_str), Some("finished"));
}

#[tokio::test]
async fn transcript_only_grows_between_requests() {
    let gateway = ScriptedGateway::new(vec![
        respond_calls(vec![call("c1", "add", json!({"a": 1, "b": 2}))]),
        respond_calls(vec![call("c2", "multiply", json!({"a": 3, "b": 3}))]),
        respond_answer("9"),
    ]);
    let tools = arithmetic_tools();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .run("compute")
        .await
        .unwrap();

    let finished = outcome.transcript.messages();
    let mut previous = 0;
    for request in gateway.requests() {
        assert!(request.len() >= previous);
        assert_eq!(request.as_slice(), &finished[..request.len()]);
        previous = request.len();
    }
}

#[tokio::test]
async fn answer_without_tools_finishes_in_one_iteration() {
    let gateway = ScriptedGateway::new(vec![respond_answer("Hello!")]);
    let tools = arithmetic_tools();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .run("say hello")
        .await
        .unwrap();

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.text(), "Hello!");
    assert_eq!(outcome.transcript.len(), 3);
}

#[tokio::test]
async fn token_usage_is_summed() {
    let usage = abacus::UsageInfo {
        prompt_tokens: Some(100),
        completion_tokens: Some(10),
        total_tokens: Some(110),
    };
    let gateway = ScriptedGateway::new(vec![
        Step::Respond(
            ModelResponse::calls(vec![call("c1", "add", json!({"a": 1, "b": 1}))]).with_usage(usage),
        ),
        Step::Respond(ModelResponse::answer("2").with_usage(usage)),
    ]);
    let tools = arithmetic_tools();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .run("1 + 1")
        .await
        .unwrap();

    assert_eq!(outcome.usage.prompt_tokens, Some(200));
    assert_eq!(outcome.usage.total_tokens, Some(220));
}

// ── Tool errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_tool_is_reported_and_run_recovers() {
    let gateway = ScriptedGateway::new(vec![
        respond_calls(vec![call("c1", "sqrt", json!({"a": 16}))]),
        respond_calls(vec![call("c2", "multiply", json!({"a": 4, "b": 4}))]),
        respond_answer("16"),
    ]);
    let tools = arithmetic_tools();
    let recorder = Recorder::default();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .with_event_handler(&recorder)
        .run("square 4")
        .await
        .unwrap();

    let error_result = &outcome.transcript.messages()[3];
    assert_eq!(error_result.tool_call_id.as_deref(), Some("c1"));
    assert!(error_result.text().starts_with("Error: unknown tool 'sqrt'"));
    assert!(error_result.text().contains("add, divide, multiply"));
    assert!(recorder.labels().contains(&"result:sqrt:err".to_string()));
    assert_eq!(outcome.text(), "16");
}

#[tokio::test]
async fn invalid_arguments_are_reported_not_executed() {
    let gateway = ScriptedGateway::new(vec![
        respond_calls(vec![call("c1", "add", json!({"a": "three", "b": 4}))]),
        respond_answer("I could not add those."),
    ]);
    let tools = arithmetic_tools();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .run("add three and 4")
        .await
        .unwrap();

    let result = outcome.transcript.messages()[3].text();
    assert!(result.starts_with("Error: invalid arguments for tool 'add'"), "{result}");
}

#[tokio::test]
async fn division_by_zero_is_reported_to_the_model() {
    let gateway = ScriptedGateway::new(vec![
        respond_calls(vec![call("c1", "divide", json!({"a": 1, "b": 0}))]),
        respond_answer("Division by zero is undefined."),
    ]);
    let tools = arithmetic_tools();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .run("divide 1 by 0")
        .await
        .unwrap();

    let result = outcome.transcript.messages()[3].text();
    assert!(result.starts_with("Error:"));
    assert!(result.contains("division by zero"));
    assert_eq!(outcome.iterations, 2);
}

#[tokio::test]
async fn repeated_tool_faults_abort_after_budget() {
    let gateway = ScriptedGateway::repeating(ModelResponse::calls(vec![call(
        "z",
        "divide",
        json!({"a": 1, "b": 0}),
    )]));
    let tools = arithmetic_tools();
    let config = test_config().with_tool_failure_budget(1);

    let err = Harness::new(&gateway, &tools, config)
        .run("keep dividing by zero")
        .await
        .unwrap_err();

    assert_eq!(
        err.reason,
        AbortReason::ToolFailuresExceeded { count: 2, budget: 1 }
    );
    assert_eq!(err.iterations, 2);
    // The failing round is committed before the abort.
    assert_eq!(err.transcript.len(), 6);
    assert!(err.transcript.unanswered_calls().is_empty());
}

#[tokio::test]
async fn duplicate_call_ids_are_rekeyed_and_answered() {
    let gateway = ScriptedGateway::new(vec![
        respond_calls(vec![
            call("dup", "add", json!({"a": 3, "b": 4})),
            call("dup", "divide", json!({"a": 10, "b": 2})),
        ]),
        respond_answer("7 and 5"),
    ]);
    let tools = arithmetic_tools();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .run("add and divide")
        .await
        .unwrap();

    let messages = outcome.transcript.messages();
    let ids: Vec<&str> = messages[2].tool_calls().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids[0], "dup");
    assert_ne!(ids[1], "dup");
    assert_eq!(messages[3].tool_call_id.as_deref(), Some(ids[0]));
    assert_eq!(messages[4].tool_call_id.as_deref(), Some(ids[1]));
    assert_eq!(messages[4].text(), "5");
    outcome.transcript.verify().unwrap();
}

// ── Gateway failures ─────────────────────────────────────────────────

#[tokio::test]
async fn transient_failures_within_budget_are_invisible() {
    let gateway = ScriptedGateway::new(vec![
        Step::Fail(GatewayError::Transient("request timed out".into())),
        Step::Fail(GatewayError::Transient("request timed out".into())),
        respond_answer("done"),
    ]);
    let tools = arithmetic_tools();
    let recorder = Recorder::default();

    let outcome = Harness::new(&gateway, &tools, test_config())
        .with_event_handler(&recorder)
        .run("anything")
        .await
        .unwrap();

    assert_eq!(outcome.text(), "done");
    assert_eq!(outcome.iterations, 1);
    assert_eq!(gateway.call_count(), 3);
    assert_eq!(recorder.count("retry:"), 2);
    assert_eq!(outcome.transcript.len(), 3);
}

#[tokio::test]
async fn exhausted_retries_abort_with_last_transient_error() {
    let gateway = ScriptedGateway::new(vec![
        Step::Fail(GatewayError::Transient("HTTP 503".into())),
        Step::Fail(GatewayError::Transient("HTTP 503".into())),
        Step::Fail(GatewayError::Transient("HTTP 429".into())),
    ]);
    let tools = arithmetic_tools();
    let config = test_config().with_retry(RetryConfig::immediate(2));

    let err = Harness::new(&gateway, &tools, config)
        .run("anything")
        .await
        .unwrap_err();

    assert_eq!(
        err.reason,
        AbortReason::Gateway {
            error: GatewayError::Transient("HTTP 429".into()),
            attempts: 3,
        }
    );
    assert_eq!(err.reason.kind(), "gateway_transient");
    assert_eq!(gateway.call_count(), 3);
}

#[tokio::test]
async fn fatal_error_aborts_without_retry() {
    let gateway = ScriptedGateway::new(vec![
        Step::Fail(GatewayError::Fatal("HTTP 401: invalid api key".into())),
        respond_answer("never reached"),
    ]);
    let tools = arithmetic_tools();

    let err = Harness::new(&gateway, &tools, test_config())
        .run("anything")
        .await
        .unwrap_err();

    assert_eq!(err.reason.kind(), "gateway_fatal");
    assert_eq!(gateway.call_count(), 1);
    assert_eq!(err.transcript.len(), 2);
    assert!(!err.trace_id.is_empty());
}

// ── Termination ──────────────────────────────────────────────────────

#[tokio::test]
async fn endless_tool_calls_stop_exactly_at_the_bound() {
    let gateway = ScriptedGateway::repeating(ModelResponse::calls(vec![call(
        "again",
        "add",
        json!({"a": 1, "b": 1}),
    )]));
    let tools = arithmetic_tools();
    let config = test_config().with_max_iterations(4);

    let err = Harness::new(&gateway, &tools, config)
        .run("loop forever")
        .await
        .unwrap_err();

    assert_eq!(err.reason, AbortReason::IterationLimitExceeded { limit: 4 });
    assert_eq!(err.iterations, 4);
    assert_eq!(gateway.call_count(), 4);
    // system + user + 4 committed rounds of (assistant, tool).
    assert_eq!(err.transcript.len(), 2 + 4 * 2);
    err.transcript.verify().unwrap();
}

#[tokio::test]
async fn zero_iterations_never_calls_the_model() {
    let gateway = ScriptedGateway::new(vec![respond_answer("unused")]);
    let tools = arithmetic_tools();

    let err = Harness::new(&gateway, &tools, test_config().with_max_iterations(0))
        .run("anything")
        .await
        .unwrap_err();

    assert_eq!(err.reason, AbortReason::IterationLimitExceeded { limit: 0 });
    assert_eq!(gateway.call_count(), 0);
}

// ── Cancellation ─────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_before_start() {
    let gateway = ScriptedGateway::new(vec![respond_answer("unused")]);
    let tools = arithmetic_tools();
    let token = CancellationToken::new();
    token.cancel();

    let err = Harness::new(&gateway, &tools, test_config())
        .with_cancellation(token)
        .run("anything")
        .await
        .unwrap_err();

    assert_eq!(err.reason, AbortReason::Cancelled);
    assert_eq!(err.iterations, 0);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn cancelled_during_retry_backoff() {
    let gateway = ScriptedGateway::new(vec![
        Step::Fail(GatewayError::Transient("HTTP 503".into())),
        respond_answer("too late"),
    ]);
    let tools = arithmetic_tools();
    let retry = RetryConfig {
        max_retries: 3,
        initial_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(10),
        multiplier: 2.0,
        jitter: false,
    };
    let token = CancellationToken::new();
    let recorder = Recorder::default();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = Harness::new(&gateway, &tools, test_config().with_retry(retry))
        .with_event_handler(&recorder)
        .with_cancellation(token)
        .run("anything")
        .await
        .unwrap_err();

    assert_eq!(err.reason, AbortReason::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(recorder.count("retry:"), 1);
    assert_eq!(gateway.call_count(), 1);
    assert_eq!(err.transcript.len(), 2);
}

#[tokio::test]
async fn cancelled_while_waiting_for_the_model() {
    let gateway = ScriptedGateway::new(vec![Step::Hang]);
    let tools = arithmetic_tools();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = Harness::new(&gateway, &tools, test_config())
        .with_cancellation(token)
        .run("anything")
        .await
        .unwrap_err();

    assert_eq!(err.reason, AbortReason::Cancelled);
    assert_eq!(err.transcript.len(), 2);
}

#[tokio::test]
async fn cancelled_mid_round_leaves_no_dangling_calls() {
    let token = CancellationToken::new();
    let mut tools = arithmetic_tools();
    tools.replace(CancellingTool(token.clone()));

    let gateway = ScriptedGateway::new(vec![
        respond_calls(vec![call("c1", "add", json!({"a": 1, "b": 2}))]),
        respond_calls(vec![
            call("c2", "multiply", json!({"a": 3, "b": 3})),
            call("c3", "cancel_run", json!({})),
        ]),
        respond_answer("unused"),
    ]);
    let recorder = Recorder::default();

    let err = Harness::new(&gateway, &tools, test_config())
        .with_event_handler(&recorder)
        .with_cancellation(token)
        .run("anything")
        .await
        .unwrap_err();

    assert_eq!(err.reason, AbortReason::Cancelled);
    assert_eq!(err.iterations, 2);
    // Only the first, completed round is kept.
    assert_eq!(err.transcript.len(), 4);
    assert!(err.transcript.unanswered_calls().is_empty());
    err.transcript.verify().unwrap();
    assert_eq!(recorder.labels().last().map(String::as_str), Some("aborted:cancelled"));
    assert!(recorder.labels().contains(&"state:aborted".to_string()));
}

// ── Seeded histories ─────────────────────────────────────────────────

#[tokio::test]
async fn run_with_messages_continues_a_history() {
    let gateway = ScriptedGateway::new(vec![respond_answer("12")]);
    let tools = arithmetic_tools();
    let history = vec![
        Message::system(ARITHMETIC_SYSTEM_PROMPT),
        Message::user("what is 3 * 4?"),
        Message::assistant(None, vec![call("c1", "multiply", json!({"a": 3, "b": 4}))]),
        Message::tool_result("c1", "12"),
    ];

    let outcome = Harness::new(&gateway, &tools, test_config())
        .run_with_messages(history)
        .await
        .unwrap();

    assert_eq!(outcome.transcript.len(), 5);
    assert_eq!(gateway.requests()[0].len(), 4);
}

#[tokio::test]
async fn run_with_messages_rejects_dangling_calls() {
    let gateway = ScriptedGateway::new(vec![respond_answer("unused")]);
    let tools = arithmetic_tools();
    let history = vec![
        Message::user("what is 3 * 4?"),
        Message::assistant(None, vec![call("c1", "multiply", json!({"a": 3, "b": 4}))]),
    ];

    let err = Harness::new(&gateway, &tools, test_config())
        .run_with_messages(history.clone())
        .await
        .unwrap_err();

    assert_eq!(
        err.reason,
        AbortReason::InvalidRound(TranscriptError::Unanswered("c1".into()))
    );
    assert_eq!(gateway.call_count(), 0);
    // The rejected history is handed back as given.
    assert_eq!(err.transcript.messages(), history.as_slice());
    assert_eq!(err.iterations, 0);
}
