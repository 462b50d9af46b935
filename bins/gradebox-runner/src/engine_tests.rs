/// Scenario tests for the grading engine
///
/// These exercise the full runner path (parse → sanitize → load → resolve →
/// execute → aggregate) against real candidate code in the embedded engine:
/// 1. Value and throw expectations, both equality modes
/// 2. Load-phase aborts vs per-case failures
/// 3. Per-call timeout isolation between cases
/// 4. Verdict shape invariants and determinism
use gradebox_common::{EqualityMode, EvaluationRequest, EvaluationResult, TestCase, TestSpec};
use serde_json::json;

use crate::sandbox;

fn request(code: &str, function: &str, equality: EqualityMode, cases: Vec<TestCase>) -> EvaluationRequest {
    EvaluationRequest {
        code: code.to_string(),
        tests: TestSpec {
            function: function.to_string(),
            equality,
            timeout_ms: 1000,
            cases,
        },
    }
}

fn expect_case(args: Vec<serde_json::Value>, expect: serde_json::Value) -> TestCase {
    TestCase {
        args,
        expect: Some(expect),
        throws: false,
    }
}

fn throws_case(args: Vec<serde_json::Value>) -> TestCase {
    TestCase {
        args,
        expect: None,
        throws: true,
    }
}

#[test]
fn test_strict_add_passes() {
    let request = request(
        "function add(a, b) { return a + b; }",
        "add",
        EqualityMode::Strict,
        vec![expect_case(vec![json!(2), json!(3)], json!(5))],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(verdict.passed);
    assert_eq!(verdict.passed_count, 1);
    assert_eq!(verdict.total, 1);
    assert_eq!(verdict.output, "Tests: 1/1 passed");
    assert!(verdict.feedback.is_empty());
}

#[test]
fn test_strict_rejects_coerced_string() {
    // add(2, "3") returns "23"; strict mode must not equate it with 5
    let request = request(
        "function add(a, b) { return a + b; }",
        "add",
        EqualityMode::Strict,
        vec![expect_case(vec![json!(2), json!("3")], json!(5))],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(
        verdict.results[0].error.as_deref(),
        Some("Expected 5, got \"23\"")
    );
    assert_eq!(verdict.feedback, "Case #1: Expected 5, got \"23\"");
}

#[test]
fn test_missing_function_aborts_evaluation() {
    let request = request(
        "function subtract(a, b) { return a - b; }",
        "add",
        EqualityMode::Deep,
        vec![expect_case(vec![json!(2), json!(3)], json!(5))],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(verdict.total, 0);
    assert!(verdict.results.is_empty());
    assert_eq!(verdict.feedback, "Function 'add' not found");
}

#[test]
fn test_throw_expectation_satisfied_by_throw() {
    let request = request(
        "function boom() { throw new Error('nope'); }",
        "boom",
        EqualityMode::Deep,
        vec![throws_case(vec![])],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(verdict.passed);
    assert_eq!(verdict.passed_count, 1);
}

#[test]
fn test_throw_expectation_failed_by_return() {
    let request = request(
        "function calm() { return 1; }",
        "calm",
        EqualityMode::Deep,
        vec![throws_case(vec![])],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(
        verdict.results[0].error.as_deref(),
        Some("Expected to throw, but returned")
    );
}

#[test]
fn test_unexpected_throw_captured_per_case() {
    let request = request(
        "function flaky(n) { if (n > 1) throw new Error('too big'); return n; }",
        "flaky",
        EqualityMode::Deep,
        vec![
            expect_case(vec![json!(1)], json!(1)),
            expect_case(vec![json!(5)], json!(5)),
        ],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(verdict.passed_count, 1);
    assert_eq!(verdict.total, 2);
    assert!(verdict.results[0].pass);
    assert_eq!(verdict.results[1].error.as_deref(), Some("too big"));
    assert_eq!(verdict.feedback, "Case #2: too big");
}

#[test]
fn test_timeout_fails_that_case_only() {
    let mut request = request(
        "function maybeSpin(n) { if (n === 0) { while (true) {} } return n; }",
        "maybeSpin",
        EqualityMode::Deep,
        vec![
            expect_case(vec![json!(0)], json!(0)),
            expect_case(vec![json!(7)], json!(7)),
        ],
    );
    request.tests.timeout_ms = 100;

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(verdict.total, 2);
    assert_eq!(
        verdict.results[0].error.as_deref(),
        Some("Execution timed out after 100ms")
    );
    // The context survives an interrupted call; the next case still runs
    assert!(verdict.results[1].pass);
}

#[test]
fn test_timeout_never_satisfies_throw_expectation() {
    let mut request = request(
        "function spin() { while (true) {} }",
        "spin",
        EqualityMode::Deep,
        vec![throws_case(vec![])],
    );
    request.tests.timeout_ms = 100;

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(
        verdict.results[0].error.as_deref(),
        Some("Execution timed out after 100ms")
    );
}

#[test]
fn test_deep_equality_on_structures() {
    // Deep mode compares canonical encodings byte for byte, so key order
    // matters: the candidate inserts keys in the same order the wire
    // payload carries them (the documented limitation, not a bug).
    let request = request(
        "function wrap(x) { return { tags: ['a', 'b'], value: x }; }",
        "wrap",
        EqualityMode::Deep,
        vec![
            expect_case(vec![json!(1)], json!({"tags": ["a", "b"], "value": 1})),
            expect_case(vec![json!(2)], json!({"tags": ["a", "b"], "value": 1})),
        ],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(verdict.results[0].pass);
    assert!(!verdict.results[1].pass);
}

#[test]
fn test_export_syntax_accepted() {
    let request = request(
        "export function add(a, b) { return a + b; }",
        "add",
        EqualityMode::Deep,
        vec![expect_case(vec![json!(2), json!(3)], json!(5))],
    );

    assert!(sandbox::evaluate(&request).passed);
}

#[test]
fn test_cases_share_load_phase_state_in_order() {
    // Cases run strictly in input order within one context; globally
    // visible state from the load phase is shared by contract
    let request = request(
        "let n = 0; function next() { n += 1; return n; }",
        "next",
        EqualityMode::Strict,
        vec![
            expect_case(vec![], json!(1)),
            expect_case(vec![], json!(2)),
            expect_case(vec![], json!(3)),
        ],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(verdict.passed);
    assert_eq!(verdict.passed_count, 3);
}

#[test]
fn test_result_indices_match_case_order() {
    let request = request(
        "function even(n) { return n % 2 === 0; }",
        "even",
        EqualityMode::Deep,
        (0..6)
            .map(|n| expect_case(vec![json!(n)], json!(true)))
            .collect(),
    );

    let verdict = sandbox::evaluate(&request);

    assert_eq!(verdict.results.len(), 6);
    for (i, case) in verdict.results.iter().enumerate() {
        assert_eq!(case.index, i);
    }
}

#[test]
fn test_determinism_across_runs() {
    let build = || {
        request(
            "function classify(n) { return n < 0 ? 'neg' : 'pos'; }",
            "classify",
            EqualityMode::Deep,
            vec![
                expect_case(vec![json!(-1)], json!("neg")),
                expect_case(vec![json!(1)], json!("neg")),
                expect_case(vec![json!(2)], json!("pos")),
            ],
        )
    };

    let first = sandbox::evaluate(&build());
    let second = sandbox::evaluate(&build());

    assert_eq!(first, second);
}

#[test]
fn test_load_phase_syntax_error_shape() {
    let request = request(
        "function add(a, b { return a + b; }",
        "add",
        EqualityMode::Deep,
        vec![expect_case(vec![json!(1), json!(1)], json!(2))],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(verdict.total, 0);
    assert!(verdict.results.is_empty());
    assert_eq!(verdict.output, "Runner error");
    assert!(!verdict.feedback.is_empty());
}

#[test]
fn test_empty_function_name_rejected() {
    let request = request(
        "function add(a, b) { return a + b; }",
        "",
        EqualityMode::Deep,
        vec![expect_case(vec![], json!(null))],
    );

    let verdict = sandbox::evaluate(&request);

    assert!(!verdict.passed);
    assert_eq!(verdict.feedback, "Function name is required");
}

#[test]
fn test_malformed_payload_still_yields_verdict() {
    let verdict = crate::grade("this is not json");

    assert!(!verdict.passed);
    assert_eq!(verdict.output, "Runner error");
    assert!(verdict.results.is_empty());
    assert!(verdict.feedback.starts_with("Malformed evaluation request"));
}

#[test]
fn test_wire_payload_end_to_end() {
    // The exact shape the host writes, straight through the parse path
    let payload = r#"{
        "code": "export function add(a, b) { return a + b; }",
        "tests": {
            "function": "add",
            "equality": "strict",
            "timeoutMs": 500,
            "cases": [
                {"args": [2, 3], "expect": 5},
                {"args": [], "throws": true}
            ]
        }
    }"#;

    let verdict = crate::grade(payload);

    assert!(!verdict.passed);
    assert_eq!(verdict.total, 2);
    assert!(verdict.results[0].pass);
    assert_eq!(
        verdict.results[1].error.as_deref(),
        Some("Expected to throw, but returned")
    );

    // And the verdict itself serializes to the documented wire names
    let wire = serde_json::to_value(&verdict).unwrap();
    assert!(wire.get("passedCount").is_some());
    assert!(wire.get("results").is_some());
}

#[test]
fn test_verdict_parses_back_as_evaluation_result() {
    let request = request(
        "function id(x) { return x; }",
        "id",
        EqualityMode::Deep,
        vec![expect_case(vec![json!([1, 2])], json!([1, 2]))],
    );

    let verdict = sandbox::evaluate(&request);
    let reparsed: EvaluationResult =
        serde_json::from_str(&serde_json::to_string(&verdict).unwrap()).unwrap();

    assert_eq!(verdict, reparsed);
}
