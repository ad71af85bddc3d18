//! Domains: name isolation, delegation, and lazy unit initialization
//!
//! A domain owns an ordered list of loaded code units, a cache of resolved
//! classes, and an optional base domain whose definitions take priority.
//! Resolution searches base-first (classloader delegation order), then the
//! domain's own units in load order. Resolving a name lazily executes
//! exactly the script that defines it; executing a unit's entry script
//! pulls in the rest of the program transitively through the same
//! mechanism.
//!
//! Everything here is synchronous and cooperative. The one control-flow
//! hazard is reentrancy: a running initializer may resolve names that land
//! back in its own script. The script's in-progress state is the guard:
//! reentrant callers observe the partially-populated global and continue.

use crate::callable::{Callable, NotConstructible};
use crate::error::{VmError, VmResult};
use crate::global::Global;
use crate::object::{ClassArena, ClassId, InstanceTemplate};
use crate::runtime::{native_hook, ExecMode, VmEnv};
use crate::trace::IndentingWriter;
use crate::unit::{Script, ScriptState, Unit};
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vireo_bytecode::Multiname;

static NEXT_DOMAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique domain identifier, recorded on units at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(u64);

impl DomainId {
    fn next() -> Self {
        DomainId(NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain-{}", self.0)
    }
}

/// Arena ids of the bootstrap class definitions owned by the system
/// domain.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapClasses {
    /// The `Class` class.
    pub class: ClassId,
    /// The `MethodClosure` class.
    pub method_closure: ClassId,
}

/// A successful name resolution: the defining script and the qualified key
/// the name resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedName {
    /// The unit owning the defining script.
    pub unit: Arc<Unit>,
    /// Index of the defining script within the unit.
    pub script: usize,
    /// The fully qualified key in the script's global.
    pub qualified: String,
}

impl ResolvedName {
    /// The defining script's global namespace object.
    pub fn global(&self) -> &Arc<Global> {
        self.unit.script(self.script).global()
    }
}

/// A namespace-resolution scope with an optional base domain.
pub struct Domain {
    id: DomainId,
    env: Arc<VmEnv>,
    base: Option<Arc<Domain>>,
    classes: Arc<RwLock<ClassArena>>,
    bootstrap: BootstrapClasses,
    units: RwLock<Vec<Arc<Unit>>>,
    class_cache: RwLock<FxHashMap<String, ClassId>>,
    mode: ExecMode,
    allow_natives: bool,
}

impl Domain {
    /// Create a domain.
    ///
    /// With no base this becomes the system domain of a new hierarchy: it
    /// allocates the class arena and the bootstrap `Class` and
    /// `MethodClosure` definitions. With a base, the arena and bootstrap
    /// ids are inherited; the base is shared, never owned, and the
    /// hierarchy is acyclic by construction (a base must exist before its
    /// children).
    ///
    /// No units are loaded here and nothing executes.
    pub fn new(
        env: Arc<VmEnv>,
        base: Option<Arc<Domain>>,
        mode: ExecMode,
        allow_natives: bool,
    ) -> Arc<Self> {
        let (classes, bootstrap) = match &base {
            Some(b) => (b.classes.clone(), b.bootstrap),
            None => {
                let mut arena = ClassArena::new();
                let class = arena.alloc("Class", None, Some(Arc::new(NotConstructible("Class"))));
                let method_closure = arena.alloc(
                    "MethodClosure",
                    None,
                    Some(Arc::new(NotConstructible("MethodClosure"))),
                );
                (
                    Arc::new(RwLock::new(arena)),
                    BootstrapClasses {
                        class,
                        method_closure,
                    },
                )
            }
        };
        Arc::new(Self {
            id: DomainId::next(),
            env,
            base,
            classes,
            bootstrap,
            units: RwLock::new(Vec::new()),
            class_cache: RwLock::new(FxHashMap::default()),
            mode,
            allow_natives,
        })
    }

    /// This domain's id.
    pub fn id(&self) -> DomainId {
        self.id
    }

    /// The base domain, if any.
    pub fn base(&self) -> Option<&Arc<Domain>> {
        self.base.as_ref()
    }

    /// The root of the hierarchy (self, for the system domain).
    pub fn system(&self) -> &Domain {
        let mut domain = self;
        while let Some(base) = &domain.base {
            domain = base;
        }
        domain
    }

    /// The hierarchy-shared class arena.
    pub fn classes(&self) -> &Arc<RwLock<ClassArena>> {
        &self.classes
    }

    /// The bootstrap class ids.
    pub fn bootstrap(&self) -> BootstrapClasses {
        self.bootstrap
    }

    /// The execution mode handed to the runtime.
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Whether globals in this domain get the native-resolver hook.
    pub fn allow_natives(&self) -> bool {
        self.allow_natives
    }

    /// Register a unit's scripts with this domain without executing any of
    /// them.
    ///
    /// Reloading a unit into the domain it is already loaded into is a
    /// no-op; loading it into a second domain is an error.
    pub fn load_unit(&self, unit: &Arc<Unit>) -> VmResult<()> {
        match unit.loaded_into() {
            Some(owner) if owner == self.id => return Ok(()),
            Some(_) => {
                return Err(VmError::AlreadyLoaded {
                    unit: unit.name().to_string(),
                })
            }
            None => {}
        }

        let context = self.env.runtime.create_context(unit.def(), self.mode);

        // Globals are constructed in reverse script order. Hard contract:
        // a later-indexed script's global must exist before any
        // earlier-indexed one is constructed; content relies on the last
        // script's global being first.
        let defs = &unit.def().scripts;
        let hook = if self.allow_natives {
            Some(native_hook(self.env.natives.clone()))
        } else {
            None
        };
        let mut scripts: Vec<Option<Arc<Script>>> = vec![None; defs.len()];
        for (index, def) in defs.iter().enumerate().rev() {
            // The hook goes in before any trait name is added.
            let global = Global::new(def, hook.clone());
            scripts[index] = Some(Script::new(index, def, global));
        }
        let scripts = scripts.into_iter().flatten().collect();

        unit.install(self.id, context, scripts)?;
        self.units.write().push(unit.clone());
        Ok(())
    }

    /// Load a unit if needed, then execute its designated entry script
    /// (the last one).
    pub fn execute_unit(&self, unit: &Arc<Unit>) -> VmResult<()> {
        self.load_unit(unit)?;
        let entry = unit.def().entry_script().ok_or_else(|| {
            VmError::RuntimeError(format!("Unit {:?} has no scripts", unit.name()))
        })?;
        self.execute_script(unit, entry)?;
        if self.env.trace.trace_classes {
            let _ = self.dump_loaded_classes(&mut io::stderr());
        }
        Ok(())
    }

    /// Find the first script that defines a multiname.
    ///
    /// Base-domain definitions always take precedence over this domain's
    /// own units, regardless of load order. Within a domain, units are
    /// searched in load order, so a later-loaded unit with a conflicting
    /// definition is never resolved. First match wins; sibling ambiguity
    /// is not detected.
    ///
    /// With `execute`, the defining script is executed (lazily, tolerant
    /// of reentrancy) before the resolution is returned. `Ok(None)` means
    /// no definition anywhere in the chain; strictness is the caller's
    /// concern.
    pub fn find_defining_script(
        &self,
        name: &Multiname,
        execute: bool,
    ) -> VmResult<Option<ResolvedName>> {
        if let Some(base) = &self.base {
            if let Some(resolved) = base.find_defining_script(name, execute)? {
                return Ok(Some(resolved));
            }
        }

        // Snapshot the unit list so no lock is held while an initializer
        // runs; a reentrant load becomes visible to the next resolution.
        let units: Vec<Arc<Unit>> = self.units.read().clone();
        for unit in &units {
            for script in unit.scripts() {
                let global = script.global();
                let matched = match name.qualified_key() {
                    Some(key) => global.has(&key).then_some(key),
                    None => global.resolve_multiname(name),
                };
                if let Some(qualified) = matched {
                    let index = script.index();
                    if execute {
                        self.ensure_script_executed(unit, index)?;
                    }
                    return Ok(Some(ResolvedName {
                        unit: unit.clone(),
                        script: index,
                        qualified,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Resolve a name to its bound value.
    ///
    /// Unresolved names are a hard [`VmError::PropertyNotFound`] under
    /// `strict`, and the undefined sentinel otherwise.
    pub fn get_property(&self, name: &Multiname, strict: bool, execute: bool) -> VmResult<Value> {
        if let Some(resolved) = self.find_defining_script(name, execute)? {
            return Ok(resolved.global().get(&resolved.qualified));
        }
        if strict {
            Err(VmError::PropertyNotFound(name.to_string()))
        } else {
            Ok(Value::Undefined)
        }
    }

    /// Resolve a name to the namespace object that defines it (used to
    /// resolve assignment targets).
    ///
    /// Unresolved names are a hard [`VmError::PropertyNotFound`] under
    /// `strict`, and `Ok(None)` otherwise.
    pub fn find_property(
        &self,
        name: &Multiname,
        strict: bool,
        execute: bool,
    ) -> VmResult<Option<Arc<Global>>> {
        if self.env.trace.trace_domain {
            eprintln!("Domain.find_property: {}", name);
        }
        if let Some(resolved) = self.find_defining_script(name, execute)? {
            return Ok(Some(resolved.global().clone()));
        }
        if strict {
            Err(VmError::PropertyNotFound(name.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Resolve a class by simple name, executing its defining script if
    /// needed, and cache the result forever. A domain's notion of "the
    /// class named X" is fixed at first successful resolution.
    ///
    /// # Panics
    ///
    /// Panics if the resolved value is not a class: that means the
    /// surrounding VM broke the class model, not a runtime condition.
    pub fn get_class(&self, simple_name: &str) -> VmResult<ClassId> {
        if let Some(&id) = self.class_cache.read().get(simple_name) {
            return Ok(id);
        }
        let name = Multiname::from_simple_name(simple_name);
        let value = self.get_property(&name, true, true)?;
        let id = match value {
            Value::Class(id) => id,
            other => panic!(
                "class {:?} resolved to a non-class value of type {}",
                simple_name,
                other.type_name()
            ),
        };
        self.class_cache.write().insert(simple_name.to_string(), id);
        Ok(id)
    }

    /// Allocate a class in the hierarchy's arena. With no explicit
    /// protocol the class defaults to the passthrough protocol over its
    /// template's constructor.
    pub fn define_class(
        &self,
        debug_name: &str,
        template: Option<InstanceTemplate>,
        protocol: Option<Arc<dyn Callable>>,
    ) -> ClassId {
        self.classes.write().alloc(debug_name, template, protocol)
    }

    /// Instance-of test against the hierarchy's class model. Method
    /// closures are instances of the bootstrap `MethodClosure` class and
    /// class values of the bootstrap `Class` class; everything else walks
    /// the object's base chain.
    pub fn is_instance(&self, class: ClassId, value: &Value) -> bool {
        match value {
            Value::Closure(_) => class == self.bootstrap.method_closure,
            Value::Class(_) => class == self.bootstrap.class,
            _ => self.classes.read().is_instance(class, value),
        }
    }

    /// Execute a script's top-level initializer.
    ///
    /// The initializer is produced by the unit's execution context and
    /// invoked with the script's global as receiver. On failure the script
    /// is left in progress permanently: the failure propagates now and
    /// masks nothing later.
    ///
    /// # Panics
    ///
    /// Panics if the script is already executing or executed; use
    /// [`Domain::ensure_script_executed`] on resolution paths.
    pub fn execute_script(&self, unit: &Arc<Unit>, index: usize) -> VmResult<()> {
        let script = unit.script(index).clone();
        script.begin_execution();

        let context = unit
            .context()
            .expect("loaded unit has no execution context")
            .clone();
        let result = context
            .create_function(script.init_method())
            .and_then(|init| init.invoke(Value::Global(script.global().clone()), &[]));

        match result {
            Ok(_) => {
                script.finish_execution();
                Ok(())
            }
            Err(source) => Err(VmError::Initializer {
                script: format!("{}/{}", unit.name(), index),
                source: Box::new(source),
            }),
        }
    }

    /// Execute a script unless it already ran or is currently running.
    ///
    /// The in-progress case is the reentrant path: an initializer
    /// resolving one of its own names gets the partially-populated global
    /// back instead of a deadlock or a second run.
    pub fn ensure_script_executed(&self, unit: &Arc<Unit>, index: usize) -> VmResult<()> {
        match unit.script(index).state() {
            ScriptState::Done | ScriptState::InProgress => Ok(()),
            ScriptState::Pending => self.execute_script(unit, index),
        }
    }

    /// Dump every class in the hierarchy's arena, with base links and
    /// method keys. Debug output only.
    pub fn dump_loaded_classes(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let arena = self.classes.read();
        let mut w = IndentingWriter::new(out);
        w.enter("Loaded Classes")?;
        for class in arena.iter() {
            let description = match class.base.and_then(|id| arena.get(id)) {
                Some(base) => format!("{} extends {} {{", class.debug_name, base.debug_name),
                None => format!("{} {{", class.debug_name),
            };
            w.enter(&description)?;
            for key in class.method_keys() {
                w.write_ln(&key)?;
            }
            w.leave("}")?;
        }
        w.leave("")
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("id", &self.id)
            .field("base", &self.base.as_ref().map(|b| b.id))
            .field("units", &self.units.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{Callable, FnCallable};
    use crate::runtime::{ExecContext, Runtime};
    use vireo_bytecode::UnitDef;

    struct InertContext;

    impl ExecContext for InertContext {
        fn create_function(&self, _method: usize) -> VmResult<Arc<dyn Callable>> {
            Ok(Arc::new(FnCallable::new(|_, _| Ok(Value::Undefined))))
        }
    }

    struct InertRuntime;

    impl Runtime for InertRuntime {
        fn create_context(&self, _unit: &Arc<UnitDef>, _mode: ExecMode) -> Arc<dyn ExecContext> {
            Arc::new(InertContext)
        }
    }

    fn env() -> Arc<VmEnv> {
        Arc::new(VmEnv::new(Arc::new(InertRuntime)))
    }

    #[test]
    fn test_system_domain_bootstraps_class_model() {
        let domain = Domain::new(env(), None, ExecMode::AlwaysInterpret, false);
        let bootstrap = domain.bootstrap();
        assert_ne!(bootstrap.class, bootstrap.method_closure);

        let arena = domain.classes().read();
        assert_eq!(arena.get(bootstrap.class).unwrap().debug_name, "Class");
        assert_eq!(
            arena.get(bootstrap.method_closure).unwrap().debug_name,
            "MethodClosure"
        );
    }

    #[test]
    fn test_child_inherits_system_state() {
        let system = Domain::new(env(), None, ExecMode::AlwaysInterpret, false);
        let child = Domain::new(
            system.env.clone(),
            Some(system.clone()),
            ExecMode::AlwaysInterpret,
            false,
        );
        let grandchild = Domain::new(
            system.env.clone(),
            Some(child.clone()),
            ExecMode::HeuristicJit,
            false,
        );

        assert_eq!(grandchild.system().id(), system.id());
        assert_eq!(child.system().id(), system.id());
        assert_eq!(system.system().id(), system.id());
        assert!(Arc::ptr_eq(grandchild.classes(), system.classes()));
        assert_eq!(grandchild.bootstrap().class, system.bootstrap().class);
    }

    #[test]
    fn test_bootstrap_classes_are_not_constructible() {
        let domain = Domain::new(env(), None, ExecMode::AlwaysInterpret, false);
        let arena = domain.classes().read();
        let class = arena.get(domain.bootstrap().class).unwrap();
        let err = class
            .protocol()
            .invoke(Value::Undefined, &[])
            .unwrap_err();
        assert!(matches!(err, VmError::NotCallable(_)));
    }

    #[test]
    fn test_is_instance_special_cases() {
        let domain = Domain::new(env(), None, ExecMode::AlwaysInterpret, false);
        let bootstrap = domain.bootstrap();

        let closure = Value::Closure(crate::closure::MethodClosure::bind(
            Value::Null,
            Arc::new(FnCallable::new(|_, _| Ok(Value::Undefined))),
        ));
        assert!(domain.is_instance(bootstrap.method_closure, &closure));
        assert!(!domain.is_instance(bootstrap.class, &closure));

        let class_value = Value::Class(bootstrap.class);
        assert!(domain.is_instance(bootstrap.class, &class_value));
        assert!(!domain.is_instance(bootstrap.method_closure, &class_value));

        assert!(!domain.is_instance(bootstrap.class, &Value::Null));
    }
}
