use std::sync::{Arc, Mutex};

use periscope_script::ast::{Block, EmitSegment, Item, Stmt, StmtKind};
use periscope_script::compile;
use periscope_script::error::{CallError, RuntimeError};
use periscope_script::host::{EmitHook, ScriptHost};
use periscope_script::parse::parse_module;
use periscope_script::value::Value;

/// Test hook that records everything it receives.
#[derive(Default)]
struct CollectHook {
    logs: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, String)>>,
}

impl CollectHook {
    fn logs(&self) -> Vec<String> {
        self.logs.lock().expect("logs lock").clone()
    }

    fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().expect("errors lock").clone()
    }
}

impl EmitHook for CollectHook {
    fn log(&self, message: &str) {
        self.logs.lock().expect("logs lock").push(message.to_string());
    }

    fn error(&self, trace_id: &str, message: &str) {
        self.errors
            .lock()
            .expect("errors lock")
            .push((trace_id.to_string(), message.to_string()));
    }
}

/// Parses `src`, clones the first function's body, and lets `edit` rewrite
/// it before compiling the result into a fresh code body.
fn rewritten_body(
    src: &str,
    edit: impl FnOnce(&mut Block),
) -> Arc<compile::CodeBody> {
    let parsed = parse_module(src).expect("Failed to parse source");
    let Item::Function(decl) = &parsed.items[0] else {
        panic!("expected a top-level function");
    };
    let mut body = decl.body.clone();
    edit(&mut body);
    let code = compile::compile(&decl.name, &decl.params, &body).expect("Failed to compile body");
    Arc::new(code)
}

fn guarded_emit(trace_id: &str, line: u32, segments: Vec<EmitSegment>) -> Stmt {
    let emit = Stmt {
        line,
        kind: StmtKind::Emit { trace_id: trace_id.to_string(), segments },
    };
    Stmt {
        line,
        kind: StmtKind::Guard {
            trace_id: trace_id.to_string(),
            body: Block { stmts: vec![emit] },
        },
    }
}

#[test]
fn test_fibonacci_executes() {
    let host = ScriptHost::new();
    host.load_str(
        "demo.fib",
        "fn fib(n) {\n  if n < 2 {\n    return n;\n  }\n  return fib(n - 1) + fib(n - 2);\n}\n",
    )
    .expect("Failed to load module");

    let result = host
        .call("demo.fib", "fib", vec![Value::Int(15)])
        .expect("Failed to call fib");
    assert_eq!(result, Value::Int(610));
}

#[test]
fn test_while_loop_accumulates() {
    let host = ScriptHost::new();
    host.load_str(
        "demo.sum",
        "fn sum_to(n) {\n  let total = 0;\n  let i = 1;\n  while i <= n {\n    total = total + i;\n    i = i + 1;\n  }\n  return total;\n}\n",
    )
    .expect("Failed to load module");

    let result = host
        .call("demo.sum", "sum_to", vec![Value::Int(10)])
        .expect("Failed to call sum_to");
    assert_eq!(result, Value::Int(55));
}

#[test]
fn test_group_methods_call_each_other() {
    let host = ScriptHost::new();
    host.load_str(
        "demo.counter",
        "group Counter {\n  fn step(n) {\n    return n + 1;\n  }\n  fn bump_twice(n) {\n    return Counter.step(Counter.step(n));\n  }\n}\n",
    )
    .expect("Failed to load module");

    let result = host
        .call("demo.counter", "Counter.bump_twice", vec![Value::Int(5)])
        .expect("Failed to call Counter.bump_twice");
    assert_eq!(result, Value::Int(7));
}

#[test]
fn test_string_concatenation() {
    let host = ScriptHost::new();
    host.load_str(
        "demo.greet",
        "fn greet(name) {\n  return \"hi \" + name + \"!\";\n}\n",
    )
    .expect("Failed to load module");

    let result = host
        .call("demo.greet", "greet", vec![Value::Str("ada".to_string())])
        .expect("Failed to call greet");
    assert_eq!(result, Value::Str("hi ada!".to_string()));
}

#[test]
fn test_unguarded_runtime_error_reaches_caller() {
    let host = ScriptHost::new();
    host.load_str("demo.div", "fn div(a, b) {\n  return a / b;\n}\n")
        .expect("Failed to load module");

    let err = host
        .call("demo.div", "div", vec![Value::Int(1), Value::Int(0)])
        .expect_err("division by zero must surface");
    assert!(matches!(err, CallError::Runtime(RuntimeError::DivisionByZero)));
}

#[test]
fn test_injected_emit_reports_through_hook() {
    const SRC: &str = "fn sample(x, y) {\n  let total = x + y;\n  return total;\n}\n";

    let host = ScriptHost::new();
    host.load_str("demo.sample", SRC).expect("Failed to load module");
    let hook = Arc::new(CollectHook::default());
    host.set_emit_hook(hook.clone());

    // Inject `emit "x=" x` at the top of the body, wrapped in a guard.
    let module = host.module("demo.sample").expect("module missing");
    let func = module.function_named("sample").expect("function missing");
    let code = rewritten_body(SRC, |body| {
        let segments = vec![
            EmitSegment::Literal("x=".to_string()),
            EmitSegment::Placeholder("x".to_string()),
        ];
        body.stmts.insert(0, guarded_emit("t1", 2, segments));
    });
    func.swap_code(code);

    let result = host
        .call("demo.sample", "sample", vec![Value::Int(3), Value::Int(4)])
        .expect("Failed to call sample");
    assert_eq!(result, Value::Int(7));
    assert_eq!(hook.logs(), ["x=3"]);
    assert!(hook.errors().is_empty());
}

#[test]
fn test_guard_contains_failure_and_function_completes() {
    const SRC: &str = "fn double(a) {\n  let b = a * 2;\n  return b;\n}\n";

    let host = ScriptHost::new();
    host.load_str("demo.double", SRC).expect("Failed to load module");
    let hook = Arc::new(CollectHook::default());
    host.set_emit_hook(hook.clone());

    // The injected emit reads `b` before its `let` has run, which fails at
    // runtime; the guard must absorb that and let the call finish.
    let module = host.module("demo.double").expect("module missing");
    let func = module.function_named("double").expect("function missing");
    let code = rewritten_body(SRC, |body| {
        let segments = vec![EmitSegment::Placeholder("b".to_string())];
        body.stmts.insert(0, guarded_emit("t9", 1, segments));
    });
    func.swap_code(code);

    let result = host
        .call("demo.double", "double", vec![Value::Int(8)])
        .expect("Failed to call double");
    assert_eq!(result, Value::Int(16));
    assert!(hook.logs().is_empty());

    let errors = hook.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "t9");
    assert!(errors[0].1.contains("`b`"));
}

#[test]
fn test_swap_back_restores_original_behavior() {
    const SRC: &str = "fn sample(x, y) {\n  let total = x + y;\n  return total;\n}\n";

    let host = ScriptHost::new();
    host.load_str("demo.sample", SRC).expect("Failed to load module");
    let hook = Arc::new(CollectHook::default());
    host.set_emit_hook(hook.clone());

    let module = host.module("demo.sample").expect("module missing");
    let func = module.function_named("sample").expect("function missing");
    let code = rewritten_body(SRC, |body| {
        let segments = vec![EmitSegment::Literal("seen".to_string())];
        body.stmts.insert(0, guarded_emit("t2", 2, segments));
    });
    let original = func.swap_code(code);

    host.call("demo.sample", "sample", vec![Value::Int(1), Value::Int(2)])
        .expect("Failed to call patched sample");
    assert_eq!(hook.logs(), ["seen"]);

    // Restoring the original body stops the emission.
    func.swap_code(original);
    host.call("demo.sample", "sample", vec![Value::Int(1), Value::Int(2)])
        .expect("Failed to call restored sample");
    assert_eq!(hook.logs(), ["seen"]);
}
