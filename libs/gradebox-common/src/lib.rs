pub mod types;

pub use types::{
    effective_timeout_ms, CaseResult, EqualityMode, EvaluationRequest, EvaluationResult, TestCase,
    TestSpec, DEFAULT_PER_CALL_TIMEOUT_MS, PER_CALL_TIMEOUT_CEILING_MS,
};
