//! End-to-end attempt-loop behavior: provider choice, retries, failover,
//! budgets, and circuit interaction, all against scripted adapters.

mod common;

use std::time::{Duration, Instant};

use llm_gateway::error::{FaultKind, TerminalError};
use llm_gateway::lifecycle::{CancelHandle, Cancellation};
use llm_gateway::resilience::CircuitState;
use llm_gateway::types::AttemptStatus;

use common::{fast_config, orchestrator, provider, request, CompleteScript, MockAdapter};

#[tokio::test]
async fn first_eligible_provider_serves_the_request() {
    let alpha = MockAdapter::new();
    alpha.script_complete([CompleteScript::Ok("hello")]);
    let beta = MockAdapter::new();

    let config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    let orch = orchestrator(&config, vec![("alpha", alpha.clone()), ("beta", beta.clone())]);

    let completion = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();

    assert_eq!(completion.provider, "alpha");
    assert_eq!(completion.content, "hello");
    assert_eq!(completion.attempts, 1);
    assert_eq!(completion.tokens_used, Some(42));
    assert_eq!(alpha.calls(), 1);
    assert_eq!(beta.calls(), 0);
}

#[tokio::test]
async fn preferred_provider_is_tried_first() {
    let alpha = MockAdapter::new();
    let beta = MockAdapter::new();

    let config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    let orch = orchestrator(&config, vec![("alpha", alpha.clone()), ("beta", beta.clone())]);

    let mut req = request("gpt-4");
    req.preferred_provider = Some("beta".to_string());

    let completion = orch.execute(req, Cancellation::none()).await.unwrap();

    assert_eq!(completion.provider, "beta");
    assert_eq!(completion.attempts, 1);
    assert_eq!(alpha.calls(), 0);
}

#[tokio::test]
async fn transient_faults_retry_the_same_provider() {
    let alpha = MockAdapter::new();
    alpha.script_complete([
        CompleteScript::Fault(FaultKind::ServerFault, "upstream 503"),
        CompleteScript::Fault(FaultKind::Timeout, "read timed out"),
        CompleteScript::Ok("done"),
    ]);
    let beta = MockAdapter::new();

    let config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    let orch = orchestrator(&config, vec![("alpha", alpha.clone()), ("beta", beta.clone())]);

    let completion = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();

    assert_eq!(completion.provider, "alpha");
    assert_eq!(completion.content, "done");
    assert_eq!(completion.attempts, 3);
    assert_eq!(beta.calls(), 0);
}

#[tokio::test]
async fn rate_limit_fails_over_without_waiting() {
    let alpha = MockAdapter::new();
    alpha.script_complete([CompleteScript::Fault(FaultKind::RateLimit, "429")]);
    let beta = MockAdapter::new();
    beta.script_complete([CompleteScript::Ok("served by beta")]);

    let mut config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    // A rate limit must not consume any backoff delay locally.
    config.retries.base_delay_ms = 5_000;
    config.retries.max_delay_ms = 5_000;
    let orch = orchestrator(&config, vec![("alpha", alpha), ("beta", beta)]);

    let started = Instant::now();
    let completion = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(completion.provider, "beta");
    assert_eq!(completion.attempts, 2);
}

#[tokio::test]
async fn client_fault_aborts_without_failover() {
    let alpha = MockAdapter::new();
    alpha.script_complete([CompleteScript::Fault(FaultKind::ClientFault, "invalid api key")]);
    let beta = MockAdapter::new();

    let config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    let orch = orchestrator(&config, vec![("alpha", alpha), ("beta", beta.clone())]);

    let failure = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        TerminalError::NonRetryable {
            kind: FaultKind::ClientFault,
            ..
        }
    ));
    assert_eq!(failure.attempts.len(), 1);
    assert_eq!(beta.calls(), 0);
}

#[tokio::test]
async fn exhausting_one_provider_fails_over_to_the_next() {
    let alpha = MockAdapter::new();
    alpha.script_complete([
        CompleteScript::Fault(FaultKind::Timeout, "t1"),
        CompleteScript::Fault(FaultKind::Timeout, "t2"),
        CompleteScript::Fault(FaultKind::Timeout, "t3"),
    ]);
    let beta = MockAdapter::new();
    beta.script_complete([CompleteScript::Ok("beta wins")]);

    let config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    let orch = orchestrator(&config, vec![("alpha", alpha), ("beta", beta)]);

    let completion = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();

    assert_eq!(completion.provider, "beta");
    assert_eq!(completion.attempts, 4);
}

#[tokio::test]
async fn attempt_numbering_restarts_per_provider() {
    let alpha = MockAdapter::new();
    alpha.script_complete([
        CompleteScript::Fault(FaultKind::ServerFault, "e1"),
        CompleteScript::Fault(FaultKind::ServerFault, "e2"),
        CompleteScript::Fault(FaultKind::ServerFault, "e3"),
    ]);
    let beta = MockAdapter::new();
    beta.script_complete([CompleteScript::Fault(FaultKind::ClientFault, "bad request")]);

    let config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    let orch = orchestrator(&config, vec![("alpha", alpha), ("beta", beta)]);

    let failure = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap_err();

    let numbers: Vec<(String, u32)> = failure
        .attempts
        .iter()
        .map(|a| (a.provider.clone(), a.attempt_number))
        .collect();
    assert_eq!(
        numbers,
        vec![
            ("alpha".to_string(), 1),
            ("alpha".to_string(), 2),
            ("alpha".to_string(), 3),
            ("beta".to_string(), 1),
        ]
    );
    assert!(failure
        .attempts
        .iter()
        .all(|a| a.status == AttemptStatus::Failed));
}

#[tokio::test]
async fn global_budget_caps_total_attempts() {
    let alpha = MockAdapter::new();
    alpha.script_complete([
        CompleteScript::Fault(FaultKind::ServerFault, "e"),
        CompleteScript::Fault(FaultKind::ServerFault, "e"),
    ]);
    let beta = MockAdapter::new();
    beta.script_complete([
        CompleteScript::Fault(FaultKind::ServerFault, "e"),
        CompleteScript::Fault(FaultKind::ServerFault, "e"),
    ]);

    let mut config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    config.retries.max_attempts_per_provider = 2;
    config.retries.max_total_attempts = 3;
    let orch = orchestrator(&config, vec![("alpha", alpha), ("beta", beta)]);

    let failure = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        TerminalError::ExhaustedRetries { attempts: 3 }
    ));
    assert_eq!(failure.attempts.len(), 3);
}

#[tokio::test]
async fn unknown_model_yields_no_provider_available() {
    let alpha = MockAdapter::new();

    let config = fast_config(vec![provider("alpha", 0, &["gpt-4"])]);
    let orch = orchestrator(&config, vec![("alpha", alpha.clone())]);

    let failure = orch
        .execute(request("claude-3"), Cancellation::none())
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        TerminalError::NoProviderAvailable { ref model } if model == "claude-3"
    ));
    assert!(failure.attempts.is_empty());
    assert_eq!(alpha.calls(), 0);
}

#[tokio::test]
async fn cancellation_mid_attempt_records_no_provider_failure() {
    let alpha = MockAdapter::new();
    alpha.script_complete([CompleteScript::Hang]);

    let config = fast_config(vec![provider("alpha", 0, &["gpt-4"])]);
    let orch = orchestrator(&config, vec![("alpha", alpha)]);

    let (handle, token): (CancelHandle, Cancellation) = CancelHandle::new();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let failure = orch.execute(request("gpt-4"), token).await.unwrap_err();

    assert!(matches!(failure.error, TerminalError::Cancelled));
    let snap = orch.circuits().snapshot("alpha").unwrap();
    assert_eq!(snap.consecutive_failures, 0);
    assert_eq!(snap.state, CircuitState::Closed);
}

#[tokio::test]
async fn open_circuit_routes_the_next_request_around_the_provider() {
    let alpha = MockAdapter::new();
    alpha.script_complete([
        CompleteScript::Fault(FaultKind::ServerFault, "down"),
        CompleteScript::Fault(FaultKind::ServerFault, "down"),
        CompleteScript::Fault(FaultKind::ServerFault, "down"),
    ]);
    let beta = MockAdapter::new();

    let mut config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    // Keep the circuit open for the whole test.
    config.circuit_breaker.reset_timeout_ms = 60_000;
    let orch = orchestrator(&config, vec![("alpha", alpha.clone()), ("beta", beta.clone())]);

    let first = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();
    assert_eq!(first.provider, "beta");
    assert_eq!(alpha.calls(), 3);
    assert_eq!(
        orch.circuits().snapshot("alpha").unwrap().state,
        CircuitState::Open
    );

    // Second request: no attempt reaches alpha at all.
    let second = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();
    assert_eq!(second.provider, "beta");
    assert_eq!(second.attempts, 1);
    assert_eq!(alpha.calls(), 3);
}

#[tokio::test]
async fn cancelled_probe_attempt_does_not_wedge_the_circuit() {
    let alpha = MockAdapter::new();
    alpha.script_complete([
        CompleteScript::Fault(FaultKind::ServerFault, "down"),
        CompleteScript::Hang,
    ]);
    let beta = MockAdapter::new();

    let mut config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    config.retries.max_attempts_per_provider = 1;
    config.circuit_breaker.failure_threshold = 1;
    config.circuit_breaker.reset_timeout_ms = 50;
    let orch = std::sync::Arc::new(orchestrator(
        &config,
        vec![("alpha", alpha.clone()), ("beta", beta)],
    ));

    // Opens alpha's circuit, serves from beta.
    let first = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();
    assert_eq!(first.provider, "beta");

    tokio::time::sleep(Duration::from_millis(80)).await;

    // Alpha is admitted as the half-open probe, then the caller cancels
    // while the attempt hangs.
    let (handle, token) = CancelHandle::new();
    let task = orch.clone();
    let run = tokio::spawn(async move { task.execute(request("gpt-4"), token).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();
    let failure = run.await.unwrap().unwrap_err();
    assert!(matches!(failure.error, TerminalError::Cancelled));

    // The abandoned probe went back: the circuit is Open with its original
    // timer, not half-open forever.
    assert_eq!(
        orch.circuits().snapshot("alpha").unwrap().state,
        CircuitState::Open
    );

    // The timer already elapsed, so the next request re-probes and recovers.
    let recovered = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();
    assert_eq!(recovered.provider, "alpha");
    assert_eq!(
        orch.circuits().snapshot("alpha").unwrap().state,
        CircuitState::Closed
    );
}

#[tokio::test]
async fn budget_exhaustion_does_not_consume_a_probe() {
    let alpha = MockAdapter::new();
    alpha.script_complete([
        CompleteScript::Fault(FaultKind::ServerFault, "e"),
        CompleteScript::Fault(FaultKind::ServerFault, "e"),
    ]);
    let beta = MockAdapter::new();

    let mut config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    config.retries.max_attempts_per_provider = 2;
    config.retries.max_total_attempts = 2;
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.reset_timeout_ms = 50;
    let orch = orchestrator(&config, vec![("alpha", alpha), ("beta", beta.clone())]);

    // Open beta's circuit and let its reset timer elapse, so a selection
    // touching beta would hand out its half-open probe.
    orch.circuits().record_failure("beta");
    orch.circuits().record_failure("beta");
    orch.circuits().record_failure("beta");
    tokio::time::sleep(Duration::from_millis(80)).await;

    let failure = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap_err();
    assert!(matches!(
        failure.error,
        TerminalError::ExhaustedRetries { attempts: 2 }
    ));

    // The budget ran out before another selection: beta was never asked,
    // and its probe window is intact for the next request.
    assert_eq!(beta.calls(), 0);
    assert_eq!(
        orch.circuits().snapshot("beta").unwrap().state,
        CircuitState::Open
    );
}

#[tokio::test]
async fn half_open_probe_success_restores_the_provider() {
    let alpha = MockAdapter::new();
    alpha.script_complete([CompleteScript::Fault(FaultKind::ServerFault, "down")]);
    let beta = MockAdapter::new();

    let mut config = fast_config(vec![
        provider("alpha", 0, &["gpt-4"]),
        provider("beta", 1, &["gpt-4"]),
    ]);
    config.retries.max_attempts_per_provider = 1;
    config.circuit_breaker.failure_threshold = 1;
    config.circuit_breaker.reset_timeout_ms = 100;
    let orch = orchestrator(&config, vec![("alpha", alpha.clone()), ("beta", beta)]);

    // Opens alpha's circuit, serves from beta.
    let first = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();
    assert_eq!(first.provider, "beta");
    assert_eq!(
        orch.circuits().snapshot("alpha").unwrap().state,
        CircuitState::Open
    );

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Reset timeout elapsed: alpha gets the probe and recovers.
    let probe = orch
        .execute(request("gpt-4"), Cancellation::none())
        .await
        .unwrap();
    assert_eq!(probe.provider, "alpha");
    assert_eq!(
        orch.circuits().snapshot("alpha").unwrap().state,
        CircuitState::Closed
    );
}
