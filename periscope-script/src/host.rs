//! Module registry, live function cells, and the emit hook seam.
//!
//! A [`ScriptHost`] owns every loaded module. Each function lives behind an
//! [`arc_swap::ArcSwap`] cell, so installing a rewritten body is one atomic
//! pointer swap: in-flight calls keep the body they loaded, the next call
//! sees the new one. Emit and guard statements report through the host's
//! [`EmitHook`], which starts as [`NullHook`] until a real consumer is
//! registered.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwap;

use crate::ast::{FunctionDecl, Item};
use crate::compile::{self, CodeBody};
use crate::error::{CallError, CompileError, LoadError};
use crate::eval::Interp;
use crate::parse::parse_module;
use crate::value::Value;

/// Receiver for output produced while script code runs.
///
/// `log` carries formatted emit text; `error` carries a failure caught by a
/// guard, tagged with the id of the trace whose statement failed.
pub trait EmitHook: Send + Sync {
    fn log(&self, message: &str);
    fn error(&self, trace_id: &str, message: &str);
}

/// Hook that discards everything.
#[derive(Debug, Default)]
pub struct NullHook;

impl EmitHook for NullHook {
    fn log(&self, _message: &str) {}
    fn error(&self, _trace_id: &str, _message: &str) {}
}

/// One callable function and its swappable code cell.
#[derive(Debug)]
pub struct ScriptFunction {
    module: String,
    qualified: String,
    start_line: u32,
    end_line: u32,
    cell: ArcSwap<CodeBody>,
}

impl ScriptFunction {
    fn new(module: &str, qualified: String, decl: &FunctionDecl) -> Result<Self, CompileError> {
        let code = compile::compile(&qualified, &decl.params, &decl.body)?;
        Ok(ScriptFunction {
            module: module.to_string(),
            qualified,
            start_line: decl.line,
            end_line: decl.end_line,
            cell: ArcSwap::from_pointee(code),
        })
    }

    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module
    }

    /// Dotted name relative to the module root, e.g. `Counter.bump`.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    /// Line of the `fn` keyword in the source file.
    #[must_use]
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Line of the function's closing brace.
    #[must_use]
    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// The body the next call will execute.
    #[must_use]
    pub fn current_code(&self) -> Arc<CodeBody> {
        self.cell.load_full()
    }

    /// Atomically installs `code` and returns the body it replaced.
    pub fn swap_code(&self, code: Arc<CodeBody>) -> Arc<CodeBody> {
        self.cell.swap(code)
    }
}

#[derive(Debug, Default)]
struct Namespace {
    functions: HashMap<String, Arc<ScriptFunction>>,
    groups: HashMap<String, Namespace>,
}

/// An immutable view of one loaded source file.
#[derive(Debug)]
pub struct ScriptModule {
    path: String,
    root: Namespace,
}

impl ScriptModule {
    /// Dotted module path the file was registered under.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks up a function by path segments relative to the module root.
    /// All but the last segment must name nested groups.
    pub fn function<S: AsRef<str>>(&self, segments: &[S]) -> Option<Arc<ScriptFunction>> {
        let (name, groups) = segments.split_last()?;
        let mut namespace = &self.root;
        for group in groups {
            namespace = namespace.groups.get(group.as_ref())?;
        }
        namespace.functions.get(name.as_ref()).cloned()
    }

    /// Looks up a function by dotted qualified name, e.g. `"Counter.bump"`.
    #[must_use]
    pub fn function_named(&self, qualified: &str) -> Option<Arc<ScriptFunction>> {
        let segments: Vec<&str> = qualified.split('.').collect();
        self.function(&segments)
    }

    /// Every function in the module, groups included, in no particular order.
    #[must_use]
    pub fn functions(&self) -> Vec<Arc<ScriptFunction>> {
        fn walk(namespace: &Namespace, out: &mut Vec<Arc<ScriptFunction>>) {
            out.extend(namespace.functions.values().cloned());
            for group in namespace.groups.values() {
                walk(group, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn build_namespace(
    module: &str,
    prefix: &str,
    items: &[Item],
    namespace: &mut Namespace,
) -> Result<(), LoadError> {
    for item in items {
        let name = match item {
            Item::Function(decl) => &decl.name,
            Item::Group(decl) => &decl.name,
        };
        if namespace.functions.contains_key(name) || namespace.groups.contains_key(name) {
            return Err(LoadError::DuplicateItem {
                module: module.to_string(),
                item: qualify(prefix, name),
            });
        }
        match item {
            Item::Function(decl) => {
                let func = ScriptFunction::new(module, qualify(prefix, &decl.name), decl)?;
                namespace.functions.insert(decl.name.clone(), Arc::new(func));
            }
            Item::Group(decl) => {
                let mut child = Namespace::default();
                build_namespace(module, &qualify(prefix, &decl.name), &decl.items, &mut child)?;
                namespace.groups.insert(decl.name.clone(), child);
            }
        }
    }
    Ok(())
}

/// Thread-safe registry of loaded modules plus the process-wide emit hook.
pub struct ScriptHost {
    modules: RwLock<HashMap<String, Arc<ScriptModule>>>,
    hook: RwLock<Arc<dyn EmitHook>>,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost {
    #[must_use]
    pub fn new() -> Self {
        ScriptHost {
            modules: RwLock::new(HashMap::new()),
            hook: RwLock::new(Arc::new(NullHook)),
        }
    }

    /// Parses and registers `source` under the dotted module path `path`.
    pub fn load_str(&self, path: &str, source: &str) -> Result<(), LoadError> {
        let parsed = parse_module(source)?;
        let mut root = Namespace::default();
        build_namespace(path, "", &parsed.items, &mut root)?;
        let module = Arc::new(ScriptModule { path: path.to_string(), root });

        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        if modules.contains_key(path) {
            return Err(LoadError::DuplicateModule(path.to_string()));
        }
        log::debug!("Loaded module {} ({} functions)", path, module.functions().len());
        modules.insert(path.to_string(), module);
        Ok(())
    }

    /// Reads `file` and registers it under `path`.
    pub fn load_file(&self, path: &str, file: &Path) -> Result<(), LoadError> {
        let source = std::fs::read_to_string(file)?;
        self.load_str(path, &source)
    }

    #[must_use]
    pub fn module(&self, path: &str) -> Option<Arc<ScriptModule>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    #[must_use]
    pub fn has_module(&self, path: &str) -> bool {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Sorted list of loaded module paths.
    #[must_use]
    pub fn module_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Replaces the process-wide emit hook. Calls already running keep the
    /// hook they captured at entry.
    pub fn set_emit_hook(&self, hook: Arc<dyn EmitHook>) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = hook;
    }

    #[must_use]
    pub fn emit_hook(&self) -> Arc<dyn EmitHook> {
        self.hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls `function` (dotted qualified name) in `module` with `args`.
    pub fn call(&self, module: &str, function: &str, args: Vec<Value>) -> Result<Value, CallError> {
        let module = self
            .module(module)
            .ok_or_else(|| CallError::NoSuchModule(module.to_string()))?;
        let func = module.function_named(function).ok_or_else(|| {
            CallError::NoSuchFunction {
                module: module.path().to_string(),
                function: function.to_string(),
            }
        })?;
        let mut interp = Interp::new(&module, self.emit_hook());
        Ok(interp.invoke(&func, args)?)
    }
}
