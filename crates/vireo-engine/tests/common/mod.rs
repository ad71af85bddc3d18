//! Shared test harness: a scripted runtime whose initializer bodies are
//! plain Rust closures keyed by (unit name, method index).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use vireo_engine::{
    Callable, ExecContext, ExecMode, FnCallable, Global, MethodDef, Multiname, QName, Runtime,
    ScriptDef, UnitDef, Value, VmEnv, VmError, VmResult,
};

/// An initializer body: receives the script's global namespace.
pub type Body = Arc<dyn Fn(Arc<Global>) -> VmResult<()> + Send + Sync>;

type BodyMap = Arc<Mutex<HashMap<(String, usize), Body>>>;

/// Runtime stub that executes registered closures as script initializers.
#[derive(Default)]
pub struct ScriptedRuntime {
    bodies: BodyMap,
}

impl ScriptedRuntime {
    /// Register the initializer body for a unit's method.
    pub fn on_init(
        &self,
        unit: &str,
        method: usize,
        body: impl Fn(Arc<Global>) -> VmResult<()> + Send + Sync + 'static,
    ) {
        self.bodies
            .lock()
            .insert((unit.to_string(), method), Arc::new(body));
    }
}

impl Runtime for ScriptedRuntime {
    fn create_context(&self, unit: &Arc<UnitDef>, _mode: ExecMode) -> Arc<dyn ExecContext> {
        Arc::new(ScriptedContext {
            unit: unit.name.clone(),
            bodies: self.bodies.clone(),
        })
    }
}

struct ScriptedContext {
    unit: String,
    bodies: BodyMap,
}

impl ExecContext for ScriptedContext {
    fn create_function(&self, method: usize) -> VmResult<Arc<dyn Callable>> {
        let body = self
            .bodies
            .lock()
            .get(&(self.unit.clone(), method))
            .cloned()
            .ok_or_else(|| {
                VmError::RuntimeError(format!("no body for {}/{}", self.unit, method))
            })?;
        Ok(Arc::new(FnCallable::new(move |receiver, _args| {
            match receiver {
                Value::Global(global) => {
                    body(global)?;
                    Ok(Value::Undefined)
                }
                other => Err(VmError::TypeError(format!(
                    "initializer receiver must be a global, got {}",
                    other.type_name()
                ))),
            }
        })))
    }
}

/// Build a scripted runtime and the environment wrapping it.
pub fn scripted_env() -> (Arc<VmEnv>, Arc<ScriptedRuntime>) {
    let runtime = Arc::new(ScriptedRuntime::default());
    let env = Arc::new(VmEnv::new(runtime.clone()));
    (env, runtime)
}

/// Parse a `"ns::name"` / `"name"` string into a qualified name.
pub fn qname(simple: &str) -> QName {
    match Multiname::from_simple_name(simple) {
        Multiname::QName(q) => q,
        _ => unreachable!(),
    }
}

/// Build a unit definition: one method per script, script `i` declaring
/// the given trait names with initializer method `i`.
pub fn unit_def(name: &str, scripts: &[&[&str]]) -> Arc<UnitDef> {
    let mut def = UnitDef::new(name);
    for (i, traits) in scripts.iter().enumerate() {
        def.methods.push(MethodDef::new(format!("{}$init{}", name, i), 0));
        def.scripts
            .push(ScriptDef::new(i, traits.iter().map(|s| qname(s)).collect()));
    }
    def.validate().expect("test unit must be structurally valid");
    Arc::new(def)
}

/// Shorthand for `Multiname::from_simple_name`.
pub fn name(simple: &str) -> Multiname {
    Multiname::from_simple_name(simple)
}
