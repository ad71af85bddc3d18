//! Script global namespace objects
//!
//! Each script owns one `Global` holding its top-level qualified names.
//! Declared names are predefined (to undefined) when the global is
//! constructed at load time, so resolution can see which script defines a
//! name before that script's initializer has run. Lazy execution and
//! reentrancy depend on this.

use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use vireo_bytecode::name::qualified_key;
use vireo_bytecode::{Multiname, ScriptDef};

/// Reserved key under which the native-function resolver is exposed when a
/// domain allows natives.
pub const NATIVE_HOOK: &str = "unsafeNative";

/// A script's global namespace object.
pub struct Global {
    names: RwLock<FxHashMap<String, Value>>,
}

impl Global {
    /// Construct the global for a script.
    ///
    /// The native hook, when present, is injected before any other name is
    /// added. All declared trait names are then predefined to undefined.
    pub fn new(def: &ScriptDef, native_hook: Option<Value>) -> Arc<Self> {
        let mut names = FxHashMap::default();
        if let Some(hook) = native_hook {
            names.insert(NATIVE_HOOK.to_string(), hook);
        }
        for qname in &def.traits {
            names.entry(qname.qualified_key()).or_insert(Value::Undefined);
        }
        Arc::new(Self {
            names: RwLock::new(names),
        })
    }

    /// Whether a qualified key is present (defined, possibly still
    /// undefined-valued).
    pub fn has(&self, key: &str) -> bool {
        self.names.read().contains_key(key)
    }

    /// Get the value bound to a qualified key; undefined if absent.
    pub fn get(&self, key: &str) -> Value {
        self.names.read().get(key).cloned().unwrap_or(Value::Undefined)
    }

    /// Bind a value to a qualified key. Initializers use this to populate
    /// the global as they run.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.names.write().insert(key.into(), value);
    }

    /// All defined keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.names.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Match a multiname against this namespace object.
    ///
    /// A fully qualified name tests direct presence of its key. An
    /// ambiguous name probes its namespace set in order; the first
    /// qualifying key wins.
    pub fn resolve_multiname(&self, multiname: &Multiname) -> Option<String> {
        match multiname {
            Multiname::QName(qname) => {
                let key = qname.qualified_key();
                self.has(&key).then_some(key)
            }
            Multiname::Multi { ns_set, name } => ns_set.iter().find_map(|ns| {
                let key = qualified_key(ns, name);
                self.has(&key).then_some(key)
            }),
        }
    }
}

impl std::fmt::Debug for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Global")
            .field("names", &self.names.read().len())
            .finish()
    }
}
