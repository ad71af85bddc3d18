//! Object model and class system
//!
//! Classes live in an arena owned by the system domain and shared down the
//! domain hierarchy. Base links are arena ids, not pointers; `is_instance`
//! and method lookup walk the explicit base chain by id.

use crate::callable::{passthrough, Callable, NotConstructible};
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Stable class identifier: an index into the hierarchy's [`ClassArena`].
/// Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Heap object instance.
#[derive(Debug, Clone)]
pub struct Object {
    /// The instance's class.
    pub class_id: ClassId,
    /// Named field values.
    pub fields: FxHashMap<String, Value>,
}

impl Object {
    /// Create an instance with no fields set.
    pub fn new(class_id: ClassId) -> Self {
        Self {
            class_id,
            fields: FxHashMap::default(),
        }
    }

    /// Get a field value; undefined if unset.
    pub fn get_field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Undefined)
    }

    /// Set a field value.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}

/// Shared per-class method table.
pub type MethodTable = Arc<RwLock<FxHashMap<String, Value>>>;

fn new_method_table() -> MethodTable {
    Arc::new(RwLock::new(FxHashMap::default()))
}

/// The instance-side template of a class: its constructor function and the
/// method table its instances see.
#[derive(Clone)]
pub struct InstanceTemplate {
    /// Constructor function, invoked with a fresh instance as receiver.
    pub construct: Arc<dyn Callable>,
    /// The template's own method table.
    pub proto: MethodTable,
}

impl InstanceTemplate {
    /// Create a template with an empty method table.
    pub fn new(construct: Arc<dyn Callable>) -> Self {
        Self {
            construct,
            proto: new_method_table(),
        }
    }
}

impl fmt::Debug for InstanceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceTemplate").finish_non_exhaustive()
    }
}

/// A VM-level class: identity, base link, instance template, and the
/// protocol used when the class itself is invoked as a function.
pub struct Class {
    /// Arena id.
    pub id: ClassId,
    /// Display identity; not used for resolution.
    pub debug_name: String,
    /// The class this one extends, if any.
    pub base: Option<ClassId>,
    /// Instance template, absent for the bootstrap classes.
    pub template: Option<InstanceTemplate>,
    methods: MethodTable,
    protocol: Arc<dyn Callable>,
}

impl Class {
    fn new(
        id: ClassId,
        debug_name: String,
        template: Option<InstanceTemplate>,
        protocol: Option<Arc<dyn Callable>>,
    ) -> Self {
        let protocol = protocol.unwrap_or_else(|| match &template {
            Some(t) => passthrough(t.construct.clone()),
            None => Arc::new(NotConstructible("class")),
        });
        Self {
            id,
            debug_name,
            base: None,
            template,
            methods: new_method_table(),
            protocol,
        }
    }

    /// Record `base` as this class's base and start a fresh method table.
    ///
    /// Inherited methods are reached by chain lookup; the fresh table is
    /// never shared with the base. The back-link from the instance side to
    /// the class is recorded under `"constructor"`.
    pub fn extend(&mut self, base: ClassId) {
        self.base = Some(base);
        self.methods = new_method_table();
        self.methods
            .write()
            .insert("constructor".to_string(), Value::Class(self.id));
    }

    /// Builtin variant of [`Class::extend`]: the instance template manages
    /// its own method table, so adopt it as the class table instead of
    /// creating a fresh one.
    ///
    /// Not fully semantics-preserving versus `extend`: method placement
    /// differs, since the adopted table stays shared with the template.
    pub fn extend_builtin(&mut self, base: ClassId) {
        self.base = Some(base);
        if let Some(template) = &self.template {
            self.methods = template.proto.clone();
        }
        self.methods
            .write()
            .insert("constructor".to_string(), Value::Class(self.id));
    }

    /// The protocol invoked when the class itself is called as a function.
    pub fn protocol(&self) -> &Arc<dyn Callable> {
        &self.protocol
    }

    /// Define a method on this class's own table.
    pub fn define_method(&self, name: impl Into<String>, value: Value) {
        self.methods.write().insert(name.into(), value);
    }

    /// Look up a method on this class's own table only.
    pub fn own_method(&self, name: &str) -> Option<Value> {
        self.methods.read().get(name).cloned()
    }

    /// This class's own method keys, sorted.
    pub fn method_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.methods.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[class {}]", self.debug_name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("debug_name", &self.debug_name)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// Arena of class records for one domain hierarchy, indexed by stable id.
#[derive(Default)]
pub struct ClassArena {
    classes: Vec<Class>,
}

impl ClassArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a class record and return its id.
    ///
    /// With no explicit protocol the class gets the passthrough protocol
    /// over its template's constructor; template-less classes are not
    /// invocable.
    pub fn alloc(
        &mut self,
        debug_name: impl Into<String>,
        template: Option<InstanceTemplate>,
        protocol: Option<Arc<dyn Callable>>,
    ) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes
            .push(Class::new(id, debug_name.into(), template, protocol));
        id
    }

    /// Get a class by id.
    pub fn get(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(id.0 as usize)
    }

    /// Get a class by id, mutably.
    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut Class> {
        self.classes.get_mut(id.0 as usize)
    }

    /// Number of classes in the arena.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over all classes.
    pub fn iter(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    /// Instance-of test: false for non-objects and null; true iff the
    /// value's class chain (derived to base) contains `class`.
    pub fn is_instance(&self, class: ClassId, value: &Value) -> bool {
        let obj = match value {
            Value::Object(obj) => obj,
            _ => return false,
        };
        let mut current = Some(obj.read().class_id);
        while let Some(id) = current {
            if id == class {
                return true;
            }
            current = self.get(id).and_then(|c| c.base);
        }
        false
    }

    /// Look up a method by walking the base chain from `class` upward.
    pub fn lookup_method(&self, class: ClassId, name: &str) -> Option<Value> {
        let mut current = Some(class);
        while let Some(id) = current {
            let c = self.get(id)?;
            if let Some(value) = c.own_method(name) {
                return Some(value);
            }
            current = c.base;
        }
        None
    }
}
