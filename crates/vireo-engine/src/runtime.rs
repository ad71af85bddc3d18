//! The runtime seam and engine configuration
//!
//! The interpreter/JIT lives outside this crate. A [`Runtime`] builds one
//! [`ExecContext`] per loaded unit; the context turns compiled method
//! descriptors into invocables. The domain only ever calls these two
//! methods.

use crate::callable::{Callable, FnCallable};
use crate::error::{VmError, VmResult};
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use vireo_bytecode::UnitDef;

/// Execution policy for a domain's code. Consumed by the [`Runtime`]
/// implementation; the domain core carries it but never acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Always run the interpreter.
    #[default]
    AlwaysInterpret,
    /// Let the runtime promote hot methods to compiled code.
    HeuristicJit,
}

/// Produces execution contexts for loaded units.
pub trait Runtime: Send + Sync {
    /// Construct the execution context for a unit being loaded.
    fn create_context(&self, unit: &Arc<UnitDef>, mode: ExecMode) -> Arc<dyn ExecContext>;
}

/// Per-unit execution context: the seam through which compiled methods
/// become invocables.
pub trait ExecContext: Send + Sync {
    /// Produce an invocable from a compiled method descriptor. The domain
    /// invokes script initializers this way, with the script's global as
    /// receiver.
    fn create_function(&self, method: usize) -> VmResult<Arc<dyn Callable>>;
}

/// Registry of native functions, looked up by name.
#[derive(Default)]
pub struct NativeRegistry {
    natives: RwLock<FxHashMap<String, Arc<dyn Callable>>>,
}

impl NativeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native function under a name.
    pub fn register(&self, name: impl Into<String>, f: Arc<dyn Callable>) {
        self.natives.write().insert(name.into(), f);
    }

    /// Look up a native function.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Callable>> {
        self.natives.read().get(name).cloned()
    }

    /// Whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.natives.read().contains_key(name)
    }

    /// Number of registered natives.
    pub fn len(&self) -> usize {
        self.natives.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.natives.read().is_empty()
    }
}

/// Wrap a native registry as the resolver hook injected into globals when
/// a domain allows natives: called with a name string, it returns the
/// registered native function.
pub fn native_hook(registry: Arc<NativeRegistry>) -> Value {
    Value::Function(Arc::new(FnCallable::new(move |_receiver, args| {
        let name = match args.first() {
            Some(Value::Str(s)) => s.as_ref(),
            other => {
                return Err(VmError::TypeError(format!(
                    "native resolver expects a name string, got {}",
                    other.map(Value::type_name).unwrap_or("nothing")
                )))
            }
        };
        match registry.get(name) {
            Some(f) => Ok(Value::Function(f)),
            None => Err(VmError::RuntimeError(format!(
                "Unknown native function: {}",
                name
            ))),
        }
    })))
}

/// Tracing switches, passed in at construction. There is no process-wide
/// flag registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceOptions {
    /// Dump created classes after a unit's entry script executes.
    pub trace_classes: bool,
    /// Log domain property probes to stderr.
    pub trace_domain: bool,
}

/// The VM services handed to every domain of a hierarchy: the runtime
/// seam, the native registry, and tracing configuration.
pub struct VmEnv {
    /// The runtime producing per-unit execution contexts.
    pub runtime: Arc<dyn Runtime>,
    /// Native functions exposed through the resolver hook.
    pub natives: Arc<NativeRegistry>,
    /// Tracing switches.
    pub trace: TraceOptions,
}

impl VmEnv {
    /// Bundle a runtime with an empty native registry and tracing off.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            natives: Arc::new(NativeRegistry::new()),
            trace: TraceOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register_and_get() {
        let registry = NativeRegistry::new();
        registry.register(
            "math.abs",
            Arc::new(FnCallable::new(|_, _| Ok(Value::Number(42.0)))),
        );

        assert!(registry.contains("math.abs"));
        assert!(!registry.contains("math.sqrt"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("math.abs").is_some());
    }

    #[test]
    fn test_native_hook_resolves() {
        let registry = Arc::new(NativeRegistry::new());
        registry.register(
            "math.answer",
            Arc::new(FnCallable::new(|_, _| Ok(Value::Int(42)))),
        );

        let hook = native_hook(registry);
        let resolver = match &hook {
            Value::Function(f) => f.clone(),
            other => panic!("Expected function hook, got {:?}", other),
        };

        let resolved = resolver
            .invoke(Value::Undefined, &[Value::string("math.answer")])
            .unwrap();
        let f = match resolved {
            Value::Function(f) => f,
            other => panic!("Expected function, got {:?}", other),
        };
        assert_eq!(f.invoke(Value::Undefined, &[]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_native_hook_unknown_name() {
        let hook = native_hook(Arc::new(NativeRegistry::new()));
        let resolver = match &hook {
            Value::Function(f) => f.clone(),
            _ => unreachable!(),
        };
        let err = resolver
            .invoke(Value::Undefined, &[Value::string("missing")])
            .unwrap_err();
        assert!(err.to_string().contains("Unknown native function"));
    }

    #[test]
    fn test_native_hook_rejects_non_string() {
        let hook = native_hook(Arc::new(NativeRegistry::new()));
        let resolver = match &hook {
            Value::Function(f) => f.clone(),
            _ => unreachable!(),
        };
        let err = resolver.invoke(Value::Undefined, &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }
}
