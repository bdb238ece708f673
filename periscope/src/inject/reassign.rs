//! Original-body bookkeeping for reversible code mutation.
//!
//! The record for a binding is created the first time that binding is
//! assigned and holds the body displaced by that first swap. It is never
//! overwritten while it exists, so repeated assign cycles always revert
//! and re-synthesize from the clean pre-injection base, and dropped on
//! revert, so "a record exists" means exactly "the live body is not the
//! original".

use std::collections::HashMap;
use std::sync::Arc;

use periscope_script::compile::CodeBody;
use periscope_script::host::ScriptFunction;

use crate::domain::{BindingKey, ReassignError};

struct TrackedBinding {
    func: Arc<ScriptFunction>,
    original: Arc<CodeBody>,
}

/// Tracks the original code body of every mutated function.
#[derive(Default)]
pub struct Reassigner {
    tracked: HashMap<BindingKey, TrackedBinding>,
}

impl Reassigner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key_of(func: &ScriptFunction) -> BindingKey {
        BindingKey::new(func.module_path(), func.qualified_name())
    }

    /// The body `func` had before any assignment through this reassigner.
    /// For an untracked function that is simply its current body; nothing
    /// is recorded by asking.
    #[must_use]
    pub fn original(&self, func: &ScriptFunction) -> Arc<CodeBody> {
        match self.tracked.get(&Self::key_of(func)) {
            Some(tracked) => Arc::clone(&tracked.original),
            None => func.current_code(),
        }
    }

    /// Swaps `new_code` in, recording the displaced body as this binding's
    /// original on the first assignment only.
    pub fn assign(&mut self, func: &Arc<ScriptFunction>, new_code: Arc<CodeBody>) {
        let key = Self::key_of(func);
        let displaced = func.swap_code(new_code);
        self.tracked.entry(key).or_insert_with(|| TrackedBinding {
            func: Arc::clone(func),
            original: displaced,
        });
    }

    /// Restores the original body recorded for `key` and drops the record.
    pub fn revert_key(&mut self, key: &BindingKey) -> Result<(), ReassignError> {
        let Some(tracked) = self.tracked.remove(key) else {
            return Err(ReassignError::Unassigned(key.clone()));
        };
        tracked.func.swap_code(tracked.original);
        Ok(())
    }

    /// Restores `func`'s recorded original and drops the record.
    pub fn revert(&mut self, func: &ScriptFunction) -> Result<(), ReassignError> {
        self.revert_key(&Self::key_of(func))
    }

    /// Restores every tracked function. Calling with nothing tracked is a
    /// no-op, so teardown can run on every exit path.
    pub fn revert_all(&mut self) {
        for (_, tracked) in self.tracked.drain() {
            tracked.func.swap_code(tracked.original);
        }
    }

    #[must_use]
    pub fn is_tracked(&self, key: &BindingKey) -> bool {
        self.tracked.contains_key(key)
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use periscope_script::ast::Item;
    use periscope_script::compile;
    use periscope_script::host::ScriptHost;
    use periscope_script::parse::parse_module;
    use periscope_script::value::Value;

    fn loaded_function(src: &str) -> (ScriptHost, Arc<ScriptFunction>) {
        let host = ScriptHost::new();
        host.load_str("demo.mod", src).expect("load");
        let func = host
            .module("demo.mod")
            .expect("module")
            .functions()
            .into_iter()
            .next()
            .expect("function");
        (host, func)
    }

    fn compiled(src: &str) -> Arc<CodeBody> {
        let parsed = parse_module(src).expect("parse");
        let Item::Function(decl) = &parsed.items[0] else {
            panic!("expected function");
        };
        Arc::new(compile::compile(&decl.name, &decl.params, &decl.body).expect("compile"))
    }

    #[test]
    fn test_first_assignment_records_the_original() {
        let (_host, func) = loaded_function("fn id(x) {\n  return x;\n}\n");
        let original = func.current_code();
        let mut reassigner = Reassigner::new();

        reassigner.assign(&func, compiled("fn id(x) {\n  return x * 2;\n}\n"));
        reassigner.assign(&func, compiled("fn id(x) {\n  return x * 3;\n}\n"));

        assert!(Arc::ptr_eq(&reassigner.original(&func), &original));
        assert_eq!(reassigner.tracked_count(), 1);
    }

    #[test]
    fn test_revert_restores_and_drops_the_record() {
        let (host, func) = loaded_function("fn id(x) {\n  return x;\n}\n");
        let original = func.current_code();
        let mut reassigner = Reassigner::new();

        reassigner.assign(&func, compiled("fn id(x) {\n  return x * 2;\n}\n"));
        let patched = host.call("demo.mod", "id", vec![Value::Int(4)]).expect("call");
        assert_eq!(patched, Value::Int(8));

        reassigner.revert(&func).expect("revert");
        assert!(Arc::ptr_eq(&func.current_code(), &original));
        assert_eq!(reassigner.tracked_count(), 0);

        let err = reassigner.revert(&func).expect_err("second revert must fail");
        assert_eq!(
            err,
            ReassignError::Unassigned(BindingKey::new("demo.mod", "id"))
        );
    }

    #[test]
    fn test_revert_all_is_idempotent() {
        let (_host, func) = loaded_function("fn id(x) {\n  return x;\n}\n");
        let original = func.current_code();
        let mut reassigner = Reassigner::new();

        reassigner.assign(&func, compiled("fn id(x) {\n  return x * 2;\n}\n"));
        reassigner.revert_all();
        reassigner.revert_all();

        assert!(Arc::ptr_eq(&func.current_code(), &original));
        assert_eq!(reassigner.tracked_count(), 0);
    }

    #[test]
    fn test_original_of_untracked_function_is_current_body() {
        let (_host, func) = loaded_function("fn id(x) {\n  return x;\n}\n");
        let reassigner = Reassigner::new();
        assert!(Arc::ptr_eq(&reassigner.original(&func), &func.current_code()));
        assert_eq!(reassigner.tracked_count(), 0);
    }
}
