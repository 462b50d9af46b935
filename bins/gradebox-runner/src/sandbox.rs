/// Execution Context + Comparison Engine
///
/// **Core Responsibility:**
/// Load candidate code into a fresh, minimal QuickJS context, invoke the
/// target function once per test case under the per-call budget, and judge
/// each outcome by the configured equality mode.
///
/// **Isolation model:**
/// The container boundary is the source of truth for safety; this module
/// adds defense in depth. A bare QuickJS context has no filesystem, network
/// or process-spawn capability to begin with; the prelude additionally
/// no-ops `console` so candidate code cannot pollute the verdict channel,
/// and the engine carries a memory ceiling and stack limit of its own.
///
/// **Timeout model:**
/// The per-call budget is enforced through the engine's interrupt handler:
/// a deadline is armed around every load/call, and the handler aborts the
/// current execution once it lapses. An interrupted call fails that case
/// only; the context stays usable for the remaining cases.
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use gradebox_common::{
    effective_timeout_ms, CaseResult, EqualityMode, EvaluationRequest, EvaluationResult,
    TestCase, TestSpec,
};
use rquickjs::function::Args;
use rquickjs::{Context, Ctx, Error, Function, Object, Runtime, Type, Value};
use tracing::debug;

use crate::sanitize::strip_module_exports;

const MEMORY_LIMIT_BYTES: usize = 64 << 20;
const STACK_LIMIT_BYTES: usize = 1 << 20;

/// Conventions candidate code may rely on: CommonJS-style `module.exports`,
/// a `global` alias, and a console that swallows everything.
const PRELUDE: &str = r#"
globalThis.global = globalThis;
globalThis.module = { exports: {} };
globalThis.exports = globalThis.module.exports;
globalThis.console = { log() {}, info() {}, warn() {}, error() {}, debug() {}, trace() {} };
"#;

/// Run one evaluation request end to end. Every failure mode maps to a
/// well-formed verdict; nothing escapes as a panic or raw error.
pub fn evaluate(request: &EvaluationRequest) -> EvaluationResult {
    let tests = &request.tests;
    if tests.function.is_empty() {
        return EvaluationResult::failure("Function name is required");
    }

    let budget_ms = effective_timeout_ms(tests.timeout_ms);
    let sandbox = match Sandbox::new(budget_ms) {
        Ok(sandbox) => sandbox,
        Err(e) => return EvaluationResult::failure(format!("Sandbox init failed: {e}")),
    };

    // Pure text transformation; candidate code has not run yet.
    let code = strip_module_exports(&request.code);

    // Load phase: a syntax error, top-level throw or timeout here aborts
    // the whole evaluation before any case runs.
    if let Err(message) = sandbox.load(&code) {
        return EvaluationResult::failure(message);
    }

    match sandbox.run_cases(tests) {
        Ok(results) => {
            debug!(
                total = results.len(),
                passed = results.iter().filter(|r| r.pass).count(),
                "All cases executed"
            );
            EvaluationResult::from_cases(results)
        }
        Err(message) => EvaluationResult::failure(message),
    }
}

/// How a guarded execution failed. The distinction matters for
/// failure-expectation cases: a thrown exception satisfies them, an
/// exhausted budget never does.
enum CallFailure {
    Thrown(String),
    TimedOut(String),
}

impl CallFailure {
    fn into_message(self) -> String {
        match self {
            CallFailure::Thrown(message) | CallFailure::TimedOut(message) => message,
        }
    }
}

struct Sandbox {
    // The interrupt handler lives on the runtime; keep it for the whole
    // evaluation.
    _runtime: Runtime,
    context: Context,
    deadline: Rc<Cell<Option<Instant>>>,
    // Set by the interrupt handler when it aborts an execution; the one
    // reliable signal that a raised error is a timeout and not a throw.
    interrupted: Rc<Cell<bool>>,
    budget: Duration,
}

impl Sandbox {
    fn new(budget_ms: u64) -> Result<Self, Error> {
        let runtime = Runtime::new()?;
        runtime.set_memory_limit(MEMORY_LIMIT_BYTES);
        runtime.set_max_stack_size(STACK_LIMIT_BYTES);

        let deadline: Rc<Cell<Option<Instant>>> = Rc::new(Cell::new(None));
        let interrupted: Rc<Cell<bool>> = Rc::new(Cell::new(false));
        let armed = Rc::clone(&deadline);
        let fired = Rc::clone(&interrupted);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            let lapsed = armed.get().map_or(false, |at| Instant::now() >= at);
            if lapsed {
                fired.set(true);
            }
            lapsed
        })));

        let context = Context::full(&runtime)?;
        context.with(|ctx| ctx.eval::<Value, _>(PRELUDE).map(|_| ()))?;

        Ok(Self {
            _runtime: runtime,
            context,
            deadline,
            interrupted,
            budget: Duration::from_millis(budget_ms),
        })
    }

    /// Compile and execute the candidate source once, under the budget.
    fn load(&self, code: &str) -> Result<(), String> {
        self.context.with(|ctx| {
            self.guarded(&ctx, || ctx.eval::<Value, _>(code))
                .map(|_| ())
                .map_err(CallFailure::into_message)
        })
    }

    /// Resolve the target symbol and execute every case, strictly in input
    /// order. Returns `Err` only for the symbol-resolution abort.
    fn run_cases(&self, tests: &TestSpec) -> Result<Vec<CaseResult>, String> {
        self.context.with(|ctx| {
            let target = resolve_function(&ctx, &tests.function)?;

            let mut results = Vec::with_capacity(tests.cases.len());
            for (index, case) in tests.cases.iter().enumerate() {
                results.push(self.run_case(&ctx, &target, tests.equality, index, case));
            }
            Ok(results)
        })
    }

    fn run_case<'js>(
        &self,
        ctx: &Ctx<'js>,
        target: &Function<'js>,
        equality: EqualityMode,
        index: usize,
        case: &TestCase,
    ) -> CaseResult {
        // Arguments pass through the engine's own argument API; no scratch
        // globals exist, so one case cannot observe another's residue.
        let call = self.guarded(ctx, || {
            let mut args = Args::new(ctx.clone(), case.args.len());
            for arg in &case.args {
                args.push_arg(json_to_js(ctx, arg)?)?;
            }
            target.call_arg::<Value>(args)
        });

        match call {
            Ok(_) if case.throws => CaseResult::fail(index, "Expected to throw, but returned"),
            Ok(returned) => {
                let expected = case.expect.clone().unwrap_or(serde_json::Value::Null);
                match judge(ctx, equality, &returned, &expected) {
                    Ok(()) => CaseResult::pass(index),
                    Err(mismatch) => CaseResult::fail(index, mismatch),
                }
            }
            Err(CallFailure::Thrown(_)) if case.throws => CaseResult::pass(index),
            Err(failure) => CaseResult::fail(index, failure.into_message()),
        }
    }

    /// Arm the interrupt deadline around one engine entry. An error is a
    /// timeout only when the interrupt handler actually aborted the
    /// execution; a genuine throw near or past the deadline stays a throw.
    fn guarded<'js, T>(
        &self,
        ctx: &Ctx<'js>,
        run: impl FnOnce() -> rquickjs::Result<T>,
    ) -> Result<T, CallFailure> {
        self.interrupted.set(false);
        self.deadline.set(Some(Instant::now() + self.budget));
        let outcome = run();
        self.deadline.set(None);

        outcome.map_err(|error| {
            if self.interrupted.get() {
                CallFailure::TimedOut(format!(
                    "Execution timed out after {}ms",
                    self.budget.as_millis()
                ))
            } else {
                CallFailure::Thrown(thrown_message(ctx, error))
            }
        })
    }
}

/// Two-step resolution contract: a context-global binding first, then the
/// conventional `module.exports` container. Anything else is an abort.
fn resolve_function<'js>(ctx: &Ctx<'js>, name: &str) -> Result<Function<'js>, String> {
    let globals = ctx.globals();

    if let Ok(direct) = globals.get::<_, Value>(name) {
        if let Some(function) = direct.as_function() {
            return Ok(function.clone());
        }
    }

    if let Ok(module) = globals.get::<_, Object>("module") {
        if let Ok(exported) = module.get::<_, Value>("exports") {
            if let Some(exports) = exported.as_object() {
                if let Ok(candidate) = exports.get::<_, Value>(name) {
                    if let Some(function) = candidate.as_function() {
                        return Ok(function.clone());
                    }
                }
            }
        }
    }

    Err(format!("Function '{name}' not found"))
}

/// Compare a returned value against the expectation under the configured
/// equality mode. `Err` carries the mismatch message for the case result.
fn judge<'js>(
    ctx: &Ctx<'js>,
    equality: EqualityMode,
    returned: &Value<'js>,
    expected: &serde_json::Value,
) -> Result<(), String> {
    let expected_js = match json_to_js(ctx, expected) {
        Ok(value) => value,
        Err(_) => return Err("Expected value is not representable".to_string()),
    };

    let equal = match equality {
        EqualityMode::Strict => strict_eq(returned, &expected_js),
        EqualityMode::Deep => deep_eq(ctx, returned, &expected_js),
    };

    if equal {
        Ok(())
    } else {
        Err(format!(
            "Expected {}, got {}",
            encode(ctx, &expected_js).unwrap_or_else(|| "undefined".to_string()),
            encode(ctx, returned).unwrap_or_else(|| "undefined".to_string()),
        ))
    }
}

/// `===` semantics: primitives by value, everything else by identity. The
/// expectation is freshly parsed JSON, so it can never alias a value the
/// candidate produced - objects under strict mode simply never match.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a.type_of(), b.type_of()) {
        (Type::Undefined, Type::Undefined) | (Type::Null, Type::Null) => true,
        (Type::Bool, Type::Bool) => a.as_bool() == b.as_bool(),
        (Type::String, Type::String) => match (text_of(a), text_of(b)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        },
        (ta, tb) if is_number(ta) && is_number(tb) => number_of(a) == number_of(b),
        _ => false,
    }
}

fn is_number(kind: Type) -> bool {
    matches!(kind, Type::Int | Type::Float)
}

fn number_of(value: &Value) -> Option<f64> {
    value.as_int().map(f64::from).or_else(|| value.as_float())
}

fn text_of(value: &Value) -> Option<String> {
    value.as_string().and_then(|s| s.to_string().ok())
}

/// Structural equality via canonical-encoding comparison: equal iff the
/// engine's JSON encodings are byte-identical. Encodings that collide
/// (key order, and values JSON cannot express) are indistinguishable by
/// design. Unencodable values never compare equal.
fn deep_eq<'js>(ctx: &Ctx<'js>, a: &Value<'js>, b: &Value<'js>) -> bool {
    match (encode(ctx, a), encode(ctx, b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn encode<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Option<String> {
    match ctx.json_stringify(value.clone()) {
        Ok(Some(text)) => text.to_string().ok(),
        _ => None,
    }
}

fn json_to_js<'js>(ctx: &Ctx<'js>, value: &serde_json::Value) -> rquickjs::Result<Value<'js>> {
    // Encoding a serde_json::Value is infallible in practice; the fallback
    // keeps this path panic-free regardless.
    let text = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    ctx.json_parse(text)
}

/// Extract a human-readable message from a raised error: the thrown Error's
/// `message` when there is one, the JSON rendering of a thrown non-Error
/// value otherwise.
fn thrown_message<'js>(ctx: &Ctx<'js>, error: Error) -> String {
    match error {
        Error::Exception => {
            let caught = ctx.catch();
            if let Some(object) = caught.as_object() {
                if let Ok(message) = object.get::<_, rquickjs::String>("message") {
                    if let Ok(text) = message.to_string() {
                        return text;
                    }
                }
            }
            encode(ctx, &caught).unwrap_or_else(|| "Unknown error".to_string())
        }
        other => other.to_string(),
    }
}
