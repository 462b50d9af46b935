/// Gradebox Host - Evaluation Orchestrator
///
/// **Core Responsibility:**
/// Safely invoke the sandbox runtime once per grading request and normalize
/// its outcome into a trusted `EvaluationResult`.
///
/// **Critical Architectural Boundary:**
/// - The host knows HOW to isolate (container flags, wall-clock timeout)
/// - The host does NOT execute candidate code
/// - The host does NOT decide pass/fail for individual cases
/// - Everything below the orchestration boundary is data, not exceptions
pub mod config;
pub mod evaluator;

pub use config::{HostConfig, SandboxLimits};
pub use evaluator::Evaluator;
