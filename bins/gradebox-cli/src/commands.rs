// Command implementations for the Gradebox CLI. The CLI stands in for the
// grading platform's caller: it reads authored files, hands them to the
// orchestrator, and renders the verdict.

use anyhow::{bail, Context, Result};
use gradebox_common::{TestSpec, PER_CALL_TIMEOUT_CEILING_MS};
use gradebox_host::{Evaluator, HostConfig};

pub async fn evaluate(code_path: &str, tests_path: &str, json: bool) -> Result<()> {
    let code = std::fs::read_to_string(code_path)
        .with_context(|| format!("Failed to read code file '{code_path}'"))?;
    let tests = load_spec(tests_path)?;

    let config = HostConfig::from_env();
    let evaluator = Evaluator::new(&config);

    let verdict = evaluator.evaluate(&tests, &code).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        println!("{}", verdict.output);
        for case in &verdict.results {
            match &case.error {
                None => println!("  ✓ case {}", case.index + 1),
                Some(error) => println!("  ✗ case {}: {}", case.index + 1, error),
            }
        }
        if !verdict.feedback.is_empty() {
            println!();
            println!("Feedback: {}", verdict.feedback);
        }
    }

    if !verdict.passed {
        std::process::exit(1);
    }
    Ok(())
}

pub fn validate(tests_path: &str) -> Result<()> {
    let spec = load_spec(tests_path)?;

    if spec.function.is_empty() {
        bail!("Test spec names no target function");
    }
    if spec.cases.is_empty() {
        bail!("Test spec has no cases; an empty set can never pass");
    }
    for (index, case) in spec.cases.iter().enumerate() {
        if case.throws && case.expect.is_some() {
            bail!("Case {} sets both 'expect' and 'throws'", index + 1);
        }
        if !case.throws && case.expect.is_none() {
            bail!("Case {} sets neither 'expect' nor 'throws'", index + 1);
        }
    }
    if spec.timeout_ms > PER_CALL_TIMEOUT_CEILING_MS {
        println!(
            "note: timeoutMs {} exceeds the {}ms ceiling and will be clamped",
            spec.timeout_ms, PER_CALL_TIMEOUT_CEILING_MS
        );
    }

    println!(
        "ok: {} case(s) for function '{}', {:?} equality, {}ms per call",
        spec.cases.len(),
        spec.function,
        spec.equality,
        spec.timeout_ms,
    );
    Ok(())
}

fn load_spec(tests_path: &str) -> Result<TestSpec> {
    let raw = std::fs::read_to_string(tests_path)
        .with_context(|| format!("Failed to read tests file '{tests_path}'"))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Tests file '{tests_path}' is not a valid test spec"))
}
