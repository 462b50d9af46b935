/// Evaluation Orchestrator - Disposable Sandbox Invocation
///
/// **Core Responsibility:**
/// Spawn one capability-stripped, single-use sandbox process per grading
/// request, feed it the request over stdin, enforce a hard wall-clock
/// timeout, and translate whatever comes back into a trusted
/// `EvaluationResult`.
///
/// **Safety Guarantees:**
/// - Hard timeout via `tokio::time::timeout`; the child is killed when the
///   future is dropped (`kill_on_drop`)
/// - Every failure below the orchestration boundary (launch error, timeout,
///   empty or garbled output) becomes the synthetic-failure verdict, never
///   a propagated error
/// - No shared mutable state between calls: each call owns its process, so
///   unbounded concurrent invocation is safe
use std::process::Stdio;
use std::time::Instant;

use gradebox_common::{
    effective_timeout_ms, EvaluationRequest, EvaluationResult, TestSpec,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::HostConfig;

/// Orchestrates sandboxed evaluations. Cheap to clone per request; holds
/// only the invocation recipe.
#[derive(Debug, Clone)]
pub struct Evaluator {
    program: String,
    args: Vec<String>,
    wall_timeout: std::time::Duration,
}

impl Evaluator {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            program: config.runtime_bin.clone(),
            args: config.sandbox_args(),
            wall_timeout: config.wall_timeout,
        }
    }

    /// Bypass the standard `docker run` recipe and invoke an arbitrary
    /// program as the sandbox. Used by alternative isolation runtimes with
    /// a compatible stdin/stdout contract, and by the test suite.
    pub fn with_invocation(
        program: impl Into<String>,
        args: Vec<String>,
        wall_timeout: std::time::Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            wall_timeout,
        }
    }

    /// Grade `code` against `tests`. Always returns a well-formed verdict;
    /// sandbox-side faults are reported as data (spec: this path is a
    /// normal, reportable outcome, not a system fault).
    pub async fn evaluate(&self, tests: &TestSpec, code: &str) -> EvaluationResult {
        if code.trim().is_empty() {
            return EvaluationResult::failure("No code submitted");
        }
        if tests.cases.is_empty() {
            return EvaluationResult::failure("No test cases configured");
        }

        // Clamp the per-call budget before it crosses the boundary so the
        // wall clock always dominates it.
        let mut tests = tests.clone();
        tests.timeout_ms = effective_timeout_ms(tests.timeout_ms);

        let request = EvaluationRequest {
            code: code.to_string(),
            tests,
        };
        let payload = match serde_json::to_string(&request) {
            Ok(payload) => payload,
            Err(e) => {
                return EvaluationResult::failure(format!("Failed to encode request: {e}"))
            }
        };

        let eval_id = Uuid::new_v4();
        let case_count = request.tests.cases.len();
        debug!(
            eval_id = %eval_id,
            function = %request.tests.function,
            case_count,
            payload_bytes = payload.len(),
            "Dispatching evaluation to sandbox"
        );

        let started = Instant::now();
        let verdict = self.invoke(&payload).await;

        info!(
            eval_id = %eval_id,
            passed = verdict.passed,
            passed_count = verdict.passed_count,
            total = verdict.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evaluation completed"
        );

        verdict
    }

    async fn invoke(&self, payload: &str) -> EvaluationResult {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, error = %e, "Failed to launch sandbox");
                return EvaluationResult::failure(format!("Failed to launch sandbox: {e}"));
            }
        };

        // The wall clock bounds the entire sandbox lifetime, payload
        // handoff included: a sandbox that never drains stdin would
        // otherwise stall the write once the payload exceeds the pipe
        // buffer.
        let lifetime = async {
            if let Some(mut stdin) = child.stdin.take() {
                // A write error here usually means the child died early;
                // the wait below will surface whatever it managed to say.
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    warn!(error = %e, "Short write of request payload to sandbox");
                }
                // Dropping stdin closes the pipe; the runner reads to EOF.
            }
            child.wait_with_output().await
        };

        match timeout(self.wall_timeout, lifetime).await {
            Ok(Ok(output)) => parse_runner_output(&output.stdout, &output.stderr),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to collect sandbox output");
                EvaluationResult::failure(format!("Failed to collect sandbox output: {e}"))
            }
            Err(_) => {
                // The dropped future kills the child; `--rm` lets the
                // daemon reap the container once its client is gone.
                warn!(
                    wall_timeout_secs = self.wall_timeout.as_secs(),
                    "Sandbox exceeded wall-clock limit, killed"
                );
                EvaluationResult::failure(format!(
                    "Evaluation exceeded the {}s time limit",
                    self.wall_timeout.as_secs()
                ))
            }
        }
    }
}

/// Translate the raw sandbox streams into a verdict. Empty stdout means the
/// runner never produced its one JSON object: fall back to stderr for a
/// diagnostic, then to a generic message.
fn parse_runner_output(stdout: &[u8], stderr: &[u8]) -> EvaluationResult {
    let raw = String::from_utf8_lossy(stdout);
    let raw = raw.trim();

    if raw.is_empty() {
        let diagnostic = String::from_utf8_lossy(stderr).trim().to_string();
        return EvaluationResult::failure(if diagnostic.is_empty() {
            "No output from sandbox".to_string()
        } else {
            diagnostic
        });
    }

    match serde_json::from_str::<EvaluationResult>(raw) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(error = %e, "Sandbox produced malformed verdict");
            EvaluationResult::failure("Malformed verdict from sandbox")
        }
    }
}
