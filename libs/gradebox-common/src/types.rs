/// Wire-Format Contract - Shared Between Host and Runner
///
/// **Core Responsibility:**
/// Define the exact JSON shapes that cross the trust boundary, in both
/// directions, plus the aggregation rules that turn per-case verdicts into
/// one evaluation verdict.
///
/// **Critical Properties:**
/// - Knows nothing about Docker
/// - Knows nothing about the JS engine
/// - Host and runner can never drift: both sides serialize through these
///   types only
///
/// **Wire shapes:**
/// - Host → Runner: `{"code": "...", "tests": {"function": "...",
///   "equality": "deep"|"strict", "timeoutMs": 1000, "cases": [...]}}`
/// - Runner → Host: `{"passed": bool, "passedCount": n, "total": n,
///   "results": [{"index": i, "pass": bool, "error"?: "..."}],
///   "output": "Tests: X/Y passed", "feedback": "..."}`
use serde::{Deserialize, Serialize};

/// Per-call budget applied when a test spec does not carry one.
pub const DEFAULT_PER_CALL_TIMEOUT_MS: u64 = 1000;

/// Hard ceiling on the per-call budget. The host floors its own wall-clock
/// timeout at twice this value, so a single call can never outlive the
/// sandbox that runs it.
pub const PER_CALL_TIMEOUT_CEILING_MS: u64 = 2000;

/// Clamp a requested per-call timeout into the enforceable range.
///
/// Applied by the host before serializing a request and again by the runner
/// on receipt, so neither a misconfigured caller nor a hand-crafted payload
/// can invert the per-call < wall-clock relationship.
pub fn effective_timeout_ms(requested: u64) -> u64 {
    requested.clamp(1, PER_CALL_TIMEOUT_CEILING_MS)
}

/// Comparison strategy used to judge a success-expectation case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualityMode {
    /// Structural equality via canonical JSON encoding comparison. Two
    /// values are equal iff their encodings are byte-identical. Cannot
    /// distinguish values whose encodings collide (key order, NaN,
    /// cyclic values) - documented limitation, not a bug.
    #[default]
    Deep,
    /// Identity/primitive equality, no structural traversal. Distinct
    /// objects are never equal even when structurally identical.
    Strict,
}

/// One input/expected-outcome pair used to grade the candidate function.
///
/// Exactly one of `expect` / `throws` is set by the authoring layer; the
/// engine does not re-validate this beyond defensive defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Positional arguments, spread into the call.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// Success expectation: the value the call must return. A JSON `null`
    /// here parses the same as an absent field; the runner grades both
    /// against null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<serde_json::Value>,
    /// Failure expectation: the call must throw.
    #[serde(default, skip_serializing_if = "is_false")]
    pub throws: bool,
}

fn is_false(flag: &bool) -> bool {
    !flag
}

/// The grading contract for one code question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Symbol the runner must locate and invoke.
    pub function: String,
    #[serde(default)]
    pub equality: EqualityMode,
    /// Budget for a single call, milliseconds. Clamped to
    /// [`PER_CALL_TIMEOUT_CEILING_MS`] on both sides of the boundary.
    #[serde(rename = "timeoutMs", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Ordered, non-empty (caller's responsibility).
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_PER_CALL_TIMEOUT_MS
}

/// Payload the host writes to the sandbox's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub code: String,
    pub tests: TestSpec,
}

/// Verdict for a single test case. `index` is the case's position in the
/// original sequence and is never reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub index: usize,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaseResult {
    pub fn pass(index: usize) -> Self {
        Self {
            index,
            pass: true,
            error: None,
        }
    }

    pub fn fail(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            pass: false,
            error: Some(error.into()),
        }
    }
}

/// The single JSON object the runner writes to stdout, and the shape the
/// host always hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub passed: bool,
    pub passed_count: usize,
    pub total: usize,
    #[serde(default)]
    pub results: Vec<CaseResult>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub feedback: String,
}

impl EvaluationResult {
    /// Aggregate per-case verdicts into the evaluation verdict.
    ///
    /// Invariants upheld here:
    /// - `passed == (passed_count == total && total > 0)`
    /// - `output` is the human summary `"Tests: X/Y passed"`
    /// - `feedback` is the first failing case's error, formatted with its
    ///   1-based position, or empty when everything passed
    pub fn from_cases(results: Vec<CaseResult>) -> Self {
        let total = results.len();
        let passed_count = results.iter().filter(|r| r.pass).count();
        let feedback = results
            .iter()
            .find(|r| !r.pass)
            .map(|r| {
                format!(
                    "Case #{}: {}",
                    r.index + 1,
                    r.error.as_deref().unwrap_or("failed")
                )
            })
            .unwrap_or_default();

        Self {
            passed: passed_count == total && total > 0,
            passed_count,
            total,
            output: format!("Tests: {passed_count}/{total} passed"),
            results,
            feedback,
        }
    }

    /// Whole-evaluation failure: orchestration faults (launch error,
    /// timeout, garbled output) and load-phase aborts (candidate code
    /// failed to load, target symbol missing). No case ever ran, so
    /// `results` is empty and `total` is zero.
    pub fn failure(feedback: impl Into<String>) -> Self {
        Self {
            passed: false,
            passed_count: 0,
            total: 0,
            results: Vec::new(),
            output: "Runner error".to_string(),
            feedback: feedback.into(),
        }
    }
}
