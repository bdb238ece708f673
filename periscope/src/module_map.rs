//! Mapping control-plane file names to loaded module paths.
//!
//! The control plane addresses functions by the script file they live in
//! (`"worker/tasks.psc"`). Loaded modules are addressed by dotted path
//! (`worker.tasks`). File names are always relative to the script root and
//! `/`-separated regardless of the probe's platform.

use std::sync::Arc;

use periscope_script::host::ScriptHost;

use crate::domain::TraceError;

/// Resolves script file names to module paths, confined to the host's
/// loaded set.
pub struct FileModuleResolver {
    host: Arc<ScriptHost>,
    package: String,
}

impl FileModuleResolver {
    #[must_use]
    pub fn new(host: Arc<ScriptHost>, package: impl Into<String>) -> Self {
        FileModuleResolver { host, package: package.into() }
    }

    /// Converts a file name into the dotted path of a loaded module.
    ///
    /// Fails for names that are not relative `.psc` paths and for files
    /// whose module was never loaded into the host.
    pub fn module_for(&self, file_name: &str) -> Result<String, TraceError> {
        let stem = match file_name.strip_suffix(".psc") {
            Some(stem) if !stem.is_empty() && !file_name.starts_with('/') => stem,
            _ => {
                return Err(TraceError::ModuleResolution {
                    module: file_name.to_string(),
                    package: self.package.clone(),
                })
            }
        };

        let module = stem.replace('/', ".");
        if !self.host.has_module(&module) {
            return Err(TraceError::ModuleResolution {
                module,
                package: self.package.clone(),
            });
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FileModuleResolver {
        let host = Arc::new(ScriptHost::new());
        host.load_str("worker.tasks", "fn run() { return 1; }\n")
            .expect("Failed to load module");
        host.load_str("main", "fn entry() { return 0; }\n")
            .expect("Failed to load module");
        FileModuleResolver::new(host, "worker")
    }

    #[test]
    fn test_nested_file_resolves() {
        let resolver = resolver();
        let module = resolver.module_for("worker/tasks.psc").expect("Failed to resolve");
        assert_eq!(module, "worker.tasks");
    }

    #[test]
    fn test_root_file_resolves() {
        let resolver = resolver();
        let module = resolver.module_for("main.psc").expect("Failed to resolve");
        assert_eq!(module, "main");
    }

    #[test]
    fn test_rejects_non_script_file() {
        let resolver = resolver();
        let err = resolver.module_for("worker/tasks.txt").expect_err("Resolution should fail");
        assert!(matches!(err, TraceError::ModuleResolution { module, .. } if module == "worker/tasks.txt"));
    }

    #[test]
    fn test_rejects_absolute_path() {
        let resolver = resolver();
        let err = resolver.module_for("/etc/worker/tasks.psc").expect_err("Resolution should fail");
        assert!(matches!(err, TraceError::ModuleResolution { .. }));
    }

    #[test]
    fn test_rejects_unloaded_module() {
        let resolver = resolver();
        let err = resolver.module_for("worker/other.psc").expect_err("Resolution should fail");
        assert!(matches!(err, TraceError::ModuleResolution { module, .. } if module == "worker.other"));
    }
}
