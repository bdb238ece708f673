//! Desired-state reconciliation over live script functions.
//!
//! The control plane sends the complete set of traces that should be live;
//! the probe owns making reality match. Every reconciliation:
//!
//! 1. resolves each desired trace to a `(module, function)` binding,
//! 2. diffs by trace id against the active set,
//! 3. queues bindings that lost every trace for revert,
//! 4. re-synthesizes every other touched binding from its original body
//!    with all of its desired traces,
//! 5. applies reverts, then swaps in the successfully built bodies,
//! 6. records per-binding failures,
//! 7. commits the new active set.
//!
//! Synthesis is completed before any function is mutated, so a binding
//! whose new body fails to build keeps running its previous one. Failures
//! never cross bindings: one bad trace statement cannot disturb traces on
//! other functions.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error};
use periscope_script::compile::CodeBody;
use periscope_script::host::{EmitHook, ScriptFunction, ScriptHost};
use periscope_wire::TraceSpec;

use crate::domain::{
    BindingFailure, BindingKey, MultiTraceError, ResolvedTrace, TraceDirective, TraceError,
};
use crate::inject::{synthesize, Reassigner, SynthesisFault};
use crate::module_map::FileModuleResolver;
use crate::resolve::{absolutize, FunctionResolver};
use crate::sink::SinkRegistry;

/// Live trace injector for one script host.
///
/// All mutation funnels through [`Probe::reconcile`], serialized by an
/// internal mutex. Dropping the probe retracts every active trace.
pub struct Probe {
    host: Arc<ScriptHost>,
    sinks: Arc<SinkRegistry>,
    package: String,
    inner: Mutex<Inner>,
}

struct Inner {
    host: Arc<ScriptHost>,
    active: HashMap<String, ResolvedTrace>,
    resolver: FunctionResolver,
    files: FileModuleResolver,
    reassigner: Reassigner,
}

impl Probe {
    /// Creates a probe over `host` and installs `sinks` as the host's emit
    /// hook, so trace output flows to registered sinks from then on.
    #[must_use]
    pub fn new(host: Arc<ScriptHost>, package: impl Into<String>, sinks: Arc<SinkRegistry>) -> Self {
        let package = package.into();
        let hook: Arc<dyn EmitHook> = sinks.clone();
        host.set_emit_hook(hook);
        let inner = Inner {
            host: Arc::clone(&host),
            active: HashMap::new(),
            resolver: FunctionResolver::new(Arc::clone(&host), package.clone()),
            files: FileModuleResolver::new(Arc::clone(&host), package.clone()),
            reassigner: Reassigner::new(),
        };
        Probe {
            host,
            sinks,
            package,
            inner: Mutex::new(inner),
        }
    }

    #[must_use]
    pub fn host(&self) -> &Arc<ScriptHost> {
        &self.host
    }

    #[must_use]
    pub fn sinks(&self) -> &Arc<SinkRegistry> {
        &self.sinks
    }

    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Makes the set of installed traces match `desired` exactly.
    ///
    /// On `Err`, the returned map describes every binding that could not be
    /// brought to the desired state; those bindings keep their previous
    /// physical state and previously active traces. All other bindings are
    /// committed.
    pub fn reconcile(&self, desired: &[TraceSpec]) -> Result<(), MultiTraceError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut errors = MultiTraceError::new();
        debug!("Reconciling {} desired traces", desired.len());

        let resolved = inner.resolve_all(desired, &mut errors);

        // Diff against the active set by trace id. A binding is touched
        // when any trace on it was added, removed, or changed; untouched
        // bindings pass through without re-synthesis.
        let touched: BTreeSet<BindingKey> = {
            let desired_ids: HashSet<&str> = resolved.iter().map(|t| t.id.as_str()).collect();
            let mut touched = BTreeSet::new();
            for trace in &resolved {
                match inner.active.get(&trace.id) {
                    None => {
                        touched.insert(trace.key.clone());
                    }
                    Some(prev) if prev != trace => {
                        touched.insert(prev.key.clone());
                        touched.insert(trace.key.clone());
                    }
                    Some(_) => {}
                }
            }
            for (id, prev) in &inner.active {
                if !desired_ids.contains(id.as_str()) {
                    touched.insert(prev.key.clone());
                }
            }
            touched
        };

        let mut groups: HashMap<BindingKey, Vec<TraceDirective>> = HashMap::new();
        for trace in &resolved {
            if touched.contains(&trace.key) {
                groups.entry(trace.key.clone()).or_default().push(TraceDirective {
                    trace_id: trace.id.clone(),
                    line: trace.line,
                    statement: trace.statement.clone(),
                });
            }
        }

        let mut reverts: Vec<BindingKey> = Vec::new();
        let mut synths: Vec<(BindingKey, Vec<TraceDirective>)> = Vec::new();
        for key in touched {
            match groups.remove(&key) {
                None => reverts.push(key),
                Some(mut directives) => {
                    // Stable sort: same-line directives keep arrival order.
                    directives.sort_by_key(|d| d.line);
                    synths.push((key, directives));
                }
            }
        }

        // Phase one: build every replacement body. No function has been
        // touched yet, so any failure here leaves its binding intact.
        let mut assigns: Vec<(Arc<ScriptFunction>, Arc<CodeBody>)> = Vec::new();
        for (key, directives) in synths {
            match inner.prepare(&key, &directives) {
                Ok(assign) => assigns.push(assign),
                Err(failure) => errors.record(key, failure),
            }
        }

        // Phase two: restore bindings that lost every trace, then swap in
        // the new bodies.
        for key in &reverts {
            if let Err(err) = inner.reassigner.revert_key(key) {
                // Every active trace implies a tracked binding; reaching
                // this is an engine invariant violation, not a user error.
                error!("Failed to revert {key}: {err}");
            }
        }
        for (func, code) in assigns {
            inner.reassigner.assign(&func, code);
        }

        // Commit: desired traces on healthy bindings, plus previously
        // active traces on bindings that failed (their physical state did
        // not change).
        let mut next_active: HashMap<String, ResolvedTrace> = HashMap::new();
        for trace in resolved {
            if errors.get(&trace.key).is_none() {
                next_active.insert(trace.id.clone(), trace);
            }
        }
        for (id, prev) in std::mem::take(&mut inner.active) {
            if errors.get(&prev.key).is_some() {
                next_active.insert(id, prev);
            }
        }
        inner.active = next_active;

        debug!(
            "Reconciled: {} active traces, {} tracked bindings, {} failed",
            inner.active.len(),
            inner.reassigner.tracked_count(),
            errors.len()
        );
        errors.into_result()
    }

    /// Retracts every active trace. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if let Err(err) = self.reconcile(&[]) {
            error!("Teardown reconciliation reported failures: {err}");
        }
    }

    /// Snapshot of the active traces, sorted by trace id.
    #[must_use]
    pub fn active_traces(&self) -> Vec<ResolvedTrace> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut traces: Vec<ResolvedTrace> = inner.active.values().cloned().collect();
        traces.sort_by(|a, b| a.id.cmp(&b.id));
        traces
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn resolve_all(
        &mut self,
        desired: &[TraceSpec],
        errors: &mut MultiTraceError,
    ) -> Vec<ResolvedTrace> {
        let mut resolved = Vec::with_capacity(desired.len());
        for spec in desired {
            let qualified = match &spec.function.parent_class {
                Some(class) => format!("{}.{}", class.name, spec.function.name),
                None => spec.function.name.clone(),
            };
            match self.module_of(&spec.function.file.name) {
                Ok(module) => resolved.push(ResolvedTrace {
                    id: spec.id.clone(),
                    key: BindingKey::new(module, qualified),
                    statement: spec.statement.clone(),
                    line: spec.line,
                }),
                Err(err) => {
                    // The true module is unknown; key the failure by the
                    // name the control plane used.
                    let key = BindingKey::new(spec.function.file.name.clone(), qualified);
                    errors.record(key, BindingFailure::new(Some(spec.id.clone()), err));
                }
            }
        }
        resolved
    }

    /// Maps a wire file reference to a loaded module path. File names go
    /// through the file resolver; plain module paths (used by tests and
    /// local tooling) absolutize against the package directly.
    fn module_of(&mut self, name: &str) -> Result<String, TraceError> {
        if name.ends_with(".psc") {
            return self.files.module_for(name);
        }
        let missing = || TraceError::ModuleResolution {
            module: name.to_string(),
            package: self.resolver.package().to_string(),
        };
        let absolute = absolutize(name, self.resolver.package()).ok_or_else(missing)?;
        if !self.host.has_module(&absolute) {
            return Err(missing());
        }
        Ok(absolute)
    }

    fn prepare(
        &mut self,
        key: &BindingKey,
        directives: &[TraceDirective],
    ) -> Result<(Arc<ScriptFunction>, Arc<CodeBody>), BindingFailure> {
        let func = self
            .resolver
            .resolve_parts(&key.module, &key.function)
            .map_err(|err| BindingFailure::new(None, err))?;
        let original = self.reassigner.original(&func);
        let code = synthesize(&func, &original, directives).map_err(|fault| match fault {
            SynthesisFault::Trace { trace_id, error } => BindingFailure::new(Some(trace_id), error),
            SynthesisFault::Internal(message) => {
                error!("Recompilation fault on {key}: {message}");
                BindingFailure::new(None, TraceError::Internal(message))
            }
        })?;
        Ok((func, Arc::new(code)))
    }
}
