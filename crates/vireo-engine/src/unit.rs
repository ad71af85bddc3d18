//! Runtime units and the script lifecycle
//!
//! A [`Unit`] wraps a compiled [`UnitDef`] with the state a domain attaches
//! at load time: the owning domain, the execution context, and one runtime
//! [`Script`] per script definition. Units are externally constructed and
//! shareable, but load into at most one domain.
//!
//! Script initialization is a one-way state machine:
//! `Pending -> InProgress -> Done`. No transition reverses. A failing
//! initializer leaves its script in `InProgress` forever; later resolutions
//! of that script's names neither re-run it nor see it as completed.

use crate::domain::DomainId;
use crate::error::{VmError, VmResult};
use crate::global::Global;
use crate::runtime::ExecContext;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use vireo_bytecode::{ScriptDef, UnitDef};

/// Lifecycle state of a script's top-level initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    /// Registered, initializer not yet scheduled.
    Pending,
    /// Initializer currently on the stack. Reentrant resolution observes
    /// this state and reads the partially-populated global instead of
    /// re-running.
    InProgress,
    /// Initializer ran to completion.
    Done,
}

/// Runtime state of one top-level script.
pub struct Script {
    index: usize,
    init: usize,
    global: Arc<Global>,
    state: Mutex<ScriptState>,
}

impl Script {
    pub(crate) fn new(index: usize, def: &ScriptDef, global: Arc<Global>) -> Arc<Self> {
        Arc::new(Self {
            index,
            init: def.init,
            global,
            state: Mutex::new(ScriptState::Pending),
        })
    }

    /// Position of this script within its unit.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Index of the initializer method in the unit's method table.
    pub fn init_method(&self) -> usize {
        self.init
    }

    /// The script's global namespace object.
    pub fn global(&self) -> &Arc<Global> {
        &self.global
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScriptState {
        *self.state.lock()
    }

    /// Guarded transition `Pending -> InProgress`.
    ///
    /// # Panics
    ///
    /// Double execution must never happen: panics if the script is already
    /// in progress or done.
    pub fn begin_execution(&self) {
        let mut state = self.state.lock();
        assert_eq!(
            *state,
            ScriptState::Pending,
            "script {} initializer invoked while {:?}",
            self.index,
            *state
        );
        *state = ScriptState::InProgress;
    }

    /// Guarded transition `InProgress -> Done`.
    ///
    /// # Panics
    ///
    /// Panics unless the script is in progress.
    pub fn finish_execution(&self) {
        let mut state = self.state.lock();
        assert_eq!(
            *state,
            ScriptState::InProgress,
            "script {} finished while {:?}",
            self.index,
            *state
        );
        *state = ScriptState::Done;
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("index", &self.index)
            .field("state", &self.state())
            .finish()
    }
}

/// A code unit as the engine sees it: the compiled definition plus the
/// state attached when a domain loads it.
pub struct Unit {
    def: Arc<UnitDef>,
    domain: OnceCell<DomainId>,
    context: OnceCell<Arc<dyn ExecContext>>,
    scripts: OnceCell<Vec<Arc<Script>>>,
}

impl Unit {
    /// Wrap a compiled unit definition.
    pub fn new(def: Arc<UnitDef>) -> Arc<Self> {
        Arc::new(Self {
            def,
            domain: OnceCell::new(),
            context: OnceCell::new(),
            scripts: OnceCell::new(),
        })
    }

    /// The compiled definition.
    pub fn def(&self) -> &Arc<UnitDef> {
        &self.def
    }

    /// Unit name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Whether the unit has been loaded into a domain.
    pub fn is_loaded(&self) -> bool {
        self.domain.get().is_some()
    }

    /// The domain this unit is loaded into, if any.
    pub fn loaded_into(&self) -> Option<DomainId> {
        self.domain.get().copied()
    }

    /// The unit's execution context; present once loaded.
    pub fn context(&self) -> Option<&Arc<dyn ExecContext>> {
        self.context.get()
    }

    /// The unit's runtime scripts; empty until loaded.
    pub fn scripts(&self) -> &[Arc<Script>] {
        self.scripts.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The runtime script at `index`.
    ///
    /// # Panics
    ///
    /// Panics if the unit is not loaded or the index is out of range.
    pub fn script(&self, index: usize) -> &Arc<Script> {
        &self.scripts.get().expect("unit is not loaded")[index]
    }

    /// The designated entry script (the last one), if the unit is loaded
    /// and non-empty.
    pub fn entry_script(&self) -> Option<&Arc<Script>> {
        self.scripts().last()
    }

    /// Attach load-time state. Called by the loading domain only.
    pub(crate) fn install(
        &self,
        domain: DomainId,
        context: Arc<dyn ExecContext>,
        scripts: Vec<Arc<Script>>,
    ) -> VmResult<()> {
        if self.domain.set(domain).is_err() {
            // Lost a bind race or rebind attempt; same-domain reloads are
            // handled by the caller before getting here.
            return Err(VmError::AlreadyLoaded {
                unit: self.name().to_string(),
            });
        }
        self.context
            .set(context)
            .map_err(|_| ())
            .expect("unit context installed twice");
        self.scripts
            .set(scripts)
            .expect("unit scripts installed twice");
        Ok(())
    }
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vireo_bytecode::QName;

    fn script(index: usize) -> Arc<Script> {
        let def = ScriptDef::new(0, vec![QName::public("Foo")]);
        Script::new(index, &def, Global::new(&def, None))
    }

    #[test]
    fn test_script_state_machine() {
        let s = script(0);
        assert_eq!(s.state(), ScriptState::Pending);
        s.begin_execution();
        assert_eq!(s.state(), ScriptState::InProgress);
        s.finish_execution();
        assert_eq!(s.state(), ScriptState::Done);
    }

    #[test]
    #[should_panic(expected = "initializer invoked while")]
    fn test_double_begin_panics() {
        let s = script(0);
        s.begin_execution();
        s.begin_execution();
    }

    #[test]
    #[should_panic(expected = "initializer invoked while")]
    fn test_begin_after_done_panics() {
        let s = script(0);
        s.begin_execution();
        s.finish_execution();
        s.begin_execution();
    }

    #[test]
    #[should_panic(expected = "finished while")]
    fn test_finish_without_begin_panics() {
        let s = script(0);
        s.finish_execution();
    }

    #[test]
    fn test_unloaded_unit_has_no_scripts() {
        let unit = Unit::new(Arc::new(UnitDef::new("u")));
        assert!(!unit.is_loaded());
        assert!(unit.scripts().is_empty());
        assert!(unit.entry_script().is_none());
        assert!(unit.context().is_none());
    }
}
