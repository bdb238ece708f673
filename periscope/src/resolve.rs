//! Function resolution: turning `<module>:<function>` paths into live
//! script functions.
//!
//! Module paths may be relative to the configured package. A leading `.`
//! anchors the path at the package itself; each additional `.` pops one
//! trailing package segment. `.logging` inside package `app.web` resolves
//! to `app.web.logging`, `..util` to `app.util`.
//!
//! Lookups go through two caches so repeated reconciliations of the same
//! targets do not re-walk the module tree. Loaded modules never change
//! identity in-process, so cached entries are never invalidated.

use std::collections::HashMap;
use std::sync::Arc;

use periscope_script::host::{ScriptFunction, ScriptHost, ScriptModule};

use crate::domain::TraceError;

/// Rewrites a relative module path into an absolute one against `package`.
///
/// Absolute paths (no leading `.`) pass through untouched. Returns `None`
/// when the relative path climbs above the package root.
#[must_use]
pub fn absolutize(module_path: &str, package: &str) -> Option<String> {
    if !module_path.starts_with('.') {
        return Some(module_path.to_string());
    }

    let mut segments: Vec<&str> = package.split('.').collect();
    let mut dots = 0;
    for ch in module_path[1..].chars() {
        if ch == '.' {
            if segments.pop().is_none() {
                return None;
            }
            dots += 1;
        } else {
            break;
        }
    }

    let remainder = &module_path[dots + 1..];
    if !remainder.is_empty() {
        segments.push(remainder);
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

/// Resolves trace target paths to script functions, with caching.
///
/// Not internally synchronized; the reconciliation engine holds it behind
/// its own lock.
pub struct FunctionResolver {
    host: Arc<ScriptHost>,
    package: String,
    modules: HashMap<String, Arc<ScriptModule>>,
    functions: HashMap<(String, String), Arc<ScriptFunction>>,
}

impl FunctionResolver {
    #[must_use]
    pub fn new(host: Arc<ScriptHost>, package: impl Into<String>) -> Self {
        FunctionResolver {
            host,
            package: package.into(),
            modules: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Resolves a combined `<module>:<function>` path.
    pub fn resolve(&mut self, path: &str) -> Result<Arc<ScriptFunction>, TraceError> {
        match path.split_once(':') {
            Some((module, function)) if !function.contains(':') => {
                self.resolve_parts(module, function)
            }
            _ => Err(TraceError::Path { path: path.to_string() }),
        }
    }

    /// Resolves a module path and a dotted qualified function name.
    pub fn resolve_parts(
        &mut self,
        module_path: &str,
        qualified: &str,
    ) -> Result<Arc<ScriptFunction>, TraceError> {
        let module = self.module(module_path)?;

        let cache_key = (module.path().to_string(), qualified.to_string());
        if let Some(func) = self.functions.get(&cache_key) {
            return Ok(Arc::clone(func));
        }

        let segments: Vec<&str> = qualified.split('.').collect();
        let func = module.function(&segments).ok_or_else(|| TraceError::FunctionResolution {
            module: module.path().to_string(),
            function: qualified.to_string(),
        })?;

        self.functions.insert(cache_key, Arc::clone(&func));
        Ok(func)
    }

    fn module(&mut self, module_path: &str) -> Result<Arc<ScriptModule>, TraceError> {
        if let Some(module) = self.modules.get(module_path) {
            return Ok(Arc::clone(module));
        }

        let missing = || TraceError::ModuleResolution {
            module: module_path.to_string(),
            package: self.package.clone(),
        };

        let absolute = absolutize(module_path, &self.package).ok_or_else(missing)?;
        let module = self.host.module(&absolute).ok_or_else(missing)?;

        self.modules.insert(module_path.to_string(), Arc::clone(&module));
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with(path: &str, source: &str) -> Arc<ScriptHost> {
        let host = Arc::new(ScriptHost::new());
        host.load_str(path, source).expect("Failed to load module");
        host
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize(".", "package"), Some("package".to_string()));
        assert_eq!(absolutize(".module", "package"), Some("package.module".to_string()));
        assert_eq!(absolutize("..module", "package.subpackage"), Some("package.module".to_string()));
        assert_eq!(absolutize("..", "package.subpackage"), Some("package".to_string()));
        assert_eq!(
            absolutize("..module.submodule", "package.subpackage"),
            Some("package.module.submodule".to_string())
        );
        assert_eq!(absolutize("plain.path", "package"), Some("plain.path".to_string()));
        assert_eq!(absolutize("...too.far", "package"), None);
    }

    #[test]
    fn test_resolve_absolute_path() {
        let host = host_with("app.math", "fn double(x) { return x * 2; }\n");
        let mut resolver = FunctionResolver::new(host, "app");

        let func = resolver.resolve("app.math:double").expect("Failed to resolve");
        assert_eq!(func.module_path(), "app.math");
        assert_eq!(func.qualified_name(), "double");
    }

    #[test]
    fn test_resolve_relative_path() {
        let host = host_with("app.math", "fn double(x) { return x * 2; }\n");
        let mut resolver = FunctionResolver::new(host, "app");

        let func = resolver.resolve(".math:double").expect("Failed to resolve");
        assert_eq!(func.module_path(), "app.math");
    }

    #[test]
    fn test_resolve_group_member() {
        let host = host_with(
            "app.shapes",
            "group Circle {\n    fn area(r) {\n        return r * r * 3;\n    }\n}\n",
        );
        let mut resolver = FunctionResolver::new(host, "app");

        let func = resolver.resolve_parts("app.shapes", "Circle.area").expect("Failed to resolve");
        assert_eq!(func.qualified_name(), "Circle.area");
    }

    #[test]
    fn test_resolution_is_cached() {
        let host = host_with("app.math", "fn double(x) { return x * 2; }\n");
        let mut resolver = FunctionResolver::new(host, "app");

        let first = resolver.resolve("app.math:double").expect("Failed to resolve");
        let second = resolver.resolve(".math:double").expect("Failed to resolve");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_module_error() {
        let host = host_with("app.math", "fn double(x) { return x * 2; }\n");
        let mut resolver = FunctionResolver::new(host, "app");

        let err = resolver.resolve("app.nope:double").expect_err("Resolution should fail");
        assert_eq!(
            err,
            TraceError::ModuleResolution {
                module: "app.nope".to_string(),
                package: "app".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_function_error() {
        let host = host_with("app.math", "fn double(x) { return x * 2; }\n");
        let mut resolver = FunctionResolver::new(host, "app");

        let err = resolver.resolve("app.math:triple").expect_err("Resolution should fail");
        assert_eq!(
            err,
            TraceError::FunctionResolution {
                module: "app.math".to_string(),
                function: "triple".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_path_error() {
        let host = host_with("app.math", "fn double(x) { return x * 2; }\n");
        let mut resolver = FunctionResolver::new(host, "app");

        for path in ["app.math", "a:b:c", "double"] {
            let err = resolver.resolve(path).expect_err("Resolution should fail");
            assert_eq!(err, TraceError::Path { path: path.to_string() });
        }
    }

    #[test]
    fn test_relative_escape_above_root() {
        let host = host_with("app.math", "fn double(x) { return x * 2; }\n");
        let mut resolver = FunctionResolver::new(host, "app");

        let err = resolver.resolve("...math:double").expect_err("Resolution should fail");
        assert!(matches!(err, TraceError::ModuleResolution { .. }));
    }
}
