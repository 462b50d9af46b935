/// Gradebox Runner - Sandbox Runtime
///
/// Runs inside the disposable container. Reads one `EvaluationRequest` from
/// stdin, grades it, and writes exactly one `EvaluationResult` JSON object
/// to stdout before exiting - always, even for garbage input, because the
/// host has no other signal. Diagnostics go to stderr only.
mod sanitize;
mod sandbox;

#[cfg(test)]
mod engine_tests;

use std::io::{Read as _, Write as _};

use gradebox_common::{EvaluationRequest, EvaluationResult};
use tracing::debug;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut payload = String::new();
    let verdict = match std::io::stdin().read_to_string(&mut payload) {
        Ok(_) => grade(&payload),
        Err(e) => EvaluationResult::failure(format!("Failed to read request: {e}")),
    };

    debug!(
        passed = verdict.passed,
        total = verdict.total,
        "Emitting verdict"
    );
    emit(&verdict);
}

fn grade(payload: &str) -> EvaluationResult {
    match serde_json::from_str::<EvaluationRequest>(payload) {
        Ok(request) => sandbox::evaluate(&request),
        Err(e) => EvaluationResult::failure(format!("Malformed evaluation request: {e}")),
    }
}

fn emit(verdict: &EvaluationResult) {
    let body = serde_json::to_string(verdict).unwrap_or_else(|_| {
        // Hand-rolled synthetic failure, in case serialization itself fails
        r#"{"passed":false,"passedCount":0,"total":0,"results":[],"output":"Runner error","feedback":"Verdict serialization failed"}"#
            .to_string()
    });

    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(body.as_bytes());
    let _ = stdout.flush();
}
