//! Callable protocol
//!
//! Every invocable value in the VM goes through one entry point: a receiver
//! plus an ordered argument list. The historical call/apply pair collapses
//! into [`Callable::invoke`]; `apply` was `call` with the arguments already
//! collected, so a single shape covers both.

use crate::error::{VmError, VmResult};
use crate::object::ClassId;
use crate::value::Value;
use std::sync::Arc;

/// An invocable value.
pub trait Callable: Send + Sync {
    /// Invoke with a receiver and an ordered argument list.
    fn invoke(&self, receiver: Value, args: &[Value]) -> VmResult<Value>;
}

/// Adapter wrapping a Rust closure as a [`Callable`].
pub struct FnCallable {
    f: Box<dyn Fn(Value, &[Value]) -> VmResult<Value> + Send + Sync>,
}

impl FnCallable {
    /// Wrap a Rust closure.
    pub fn new(f: impl Fn(Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }
}

impl Callable for FnCallable {
    fn invoke(&self, receiver: Value, args: &[Value]) -> VmResult<Value> {
        (self.f)(receiver, args)
    }
}

/// Passthrough protocol: forward the invocation to the instance template's
/// constructor function, receiver and arguments unchanged.
///
/// Under the single-entry-point protocol this is the identity composition;
/// it is kept as a named builder because it is the default call protocol of
/// a class.
pub fn passthrough(f: Arc<dyn Callable>) -> Arc<dyn Callable> {
    f
}

/// Constructing protocol: invocation allocates a fresh instance.
struct Constructing {
    class_id: ClassId,
    ctor: Arc<dyn Callable>,
}

impl Callable for Constructing {
    fn invoke(&self, _receiver: Value, args: &[Value]) -> VmResult<Value> {
        let instance = Value::new_object(self.class_id);
        self.ctor.invoke(instance.clone(), args)?;
        Ok(instance)
    }
}

/// Build a constructing protocol: invocation is `new`-construction of the
/// instance template. A fresh object of `class_id` is allocated, the
/// constructor runs with it as receiver, and the object is the result
/// (whatever the constructor returns is discarded).
pub fn constructing(class_id: ClassId, ctor: Arc<dyn Callable>) -> Arc<dyn Callable> {
    Arc::new(Constructing { class_id, ctor })
}

/// Protocol for classes that cannot be invoked at runtime (the bootstrap
/// `Class` and `MethodClosure` definitions).
pub struct NotConstructible(pub &'static str);

impl Callable for NotConstructible {
    fn invoke(&self, _receiver: Value, _args: &[Value]) -> VmResult<Value> {
        Err(VmError::NotCallable(self.0))
    }
}
