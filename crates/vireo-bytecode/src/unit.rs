//! Compiled unit descriptors
//!
//! A [`UnitDef`] describes one compiled code unit: its methods and its
//! ordered top-level scripts. The last script is the unit's designated
//! entry point. These are produced by the compiler toolchain and consumed
//! by the engine; this crate only validates structure.

use crate::name::QName;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Structural validation errors for a compiled unit.
#[derive(Debug, Error)]
pub enum UnitError {
    /// A unit must contain at least one script.
    #[error("Unit {0:?} has no scripts")]
    NoScripts(String),

    /// A script's initializer index does not refer to a method.
    #[error("Script {script} of unit {unit:?}: init method {init} out of range ({methods} methods)")]
    InitOutOfRange {
        /// The unit name.
        unit: String,
        /// The script index.
        script: usize,
        /// The offending initializer method index.
        init: usize,
        /// Number of methods in the unit.
        methods: usize,
    },

    /// A script declares the same qualified key more than once.
    #[error("Script {script} of unit {unit:?}: duplicate trait {key:?}")]
    DuplicateTrait {
        /// The unit name.
        unit: String,
        /// The script index.
        script: usize,
        /// The duplicated qualified key.
        key: String,
    },
}

/// A compiled method descriptor.
///
/// The engine never inspects method bodies; the runtime seam turns a
/// descriptor into an invocable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name, for diagnostics only.
    pub name: String,
    /// Number of declared parameters.
    pub param_count: usize,
}

impl MethodDef {
    /// Create a method descriptor.
    pub fn new(name: impl Into<String>, param_count: usize) -> Self {
        Self {
            name: name.into(),
            param_count,
        }
    }
}

/// A top-level script: an initializer method plus the qualified names the
/// script defines in its global namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDef {
    /// Index of the initializer method in the unit's method table.
    pub init: usize,
    /// Qualified names this script defines at the top level.
    pub traits: Vec<QName>,
}

impl ScriptDef {
    /// Create a script descriptor.
    pub fn new(init: usize, traits: Vec<QName>) -> Self {
        Self { init, traits }
    }
}

/// A compiled code unit: an ordered sequence of scripts over a shared
/// method table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDef {
    /// Unit name, for diagnostics and error reporting.
    pub name: String,
    /// Compiled method descriptors.
    pub methods: Vec<MethodDef>,
    /// Top-level scripts in definition order. The last script is the
    /// unit's entry point.
    pub scripts: Vec<ScriptDef>,
}

impl UnitDef {
    /// Create an empty unit with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            scripts: Vec::new(),
        }
    }

    /// Index of the designated entry script (the last script), if any.
    pub fn entry_script(&self) -> Option<usize> {
        self.scripts.len().checked_sub(1)
    }

    /// Validate unit structure.
    ///
    /// Checks that the unit has at least one script, every initializer
    /// index is in range, and no script declares a qualified key twice.
    pub fn validate(&self) -> Result<(), UnitError> {
        if self.scripts.is_empty() {
            return Err(UnitError::NoScripts(self.name.clone()));
        }
        for (i, script) in self.scripts.iter().enumerate() {
            if script.init >= self.methods.len() {
                return Err(UnitError::InitOutOfRange {
                    unit: self.name.clone(),
                    script: i,
                    init: script.init,
                    methods: self.methods.len(),
                });
            }
            let mut seen = HashSet::new();
            for qname in &script.traits {
                let key = qname.qualified_key();
                if !seen.insert(key.clone()) {
                    return Err(UnitError::DuplicateTrait {
                        unit: self.name.clone(),
                        script: i,
                        key,
                    });
                }
            }
        }
        Ok(())
    }
}
