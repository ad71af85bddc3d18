//! Method closures
//!
//! A method closure permanently binds a function to a receiver. It speaks
//! the same callable protocol as a class, but the receiver passed at call
//! time is always ignored: the bound receiver wins.

use crate::callable::Callable;
use crate::error::VmResult;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// A function value bound to a receiver, immutable after construction.
pub struct MethodClosure {
    receiver: Value,
    function: Arc<dyn Callable>,
}

impl MethodClosure {
    /// Bind `function` to `receiver` once.
    pub fn bind(receiver: Value, function: Arc<dyn Callable>) -> Arc<Self> {
        Arc::new(Self { receiver, function })
    }

    /// The bound receiver.
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }
}

impl Callable for MethodClosure {
    fn invoke(&self, _receiver: Value, args: &[Value]) -> VmResult<Value> {
        self.function.invoke(self.receiver.clone(), args)
    }
}

impl fmt::Display for MethodClosure {
    /// The display form is a fixed placeholder, never the wrapped
    /// function's identity.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function () {{}}")
    }
}

impl fmt::Debug for MethodClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodClosure")
            .field("receiver", &self.receiver)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::FnCallable;

    #[test]
    fn test_bound_receiver_wins() {
        let f: Arc<dyn Callable> = Arc::new(FnCallable::new(|receiver, _| Ok(receiver)));
        let closure = MethodClosure::bind(Value::Int(1), f);

        // The receiver passed at call time is ignored
        let result = closure.invoke(Value::Int(99), &[]).unwrap();
        assert_eq!(result, Value::Int(1));
    }

    #[test]
    fn test_arguments_pass_through() {
        let f: Arc<dyn Callable> =
            Arc::new(FnCallable::new(|_, args| Ok(args[0].clone())));
        let closure = MethodClosure::bind(Value::Null, f);
        let result = closure.invoke(Value::Null, &[Value::string("a")]).unwrap();
        assert_eq!(result, Value::string("a"));
    }

    #[test]
    fn test_display_is_placeholder() {
        let f: Arc<dyn Callable> = Arc::new(FnCallable::new(|_, _| Ok(Value::Undefined)));
        let closure = MethodClosure::bind(Value::Null, f);
        assert_eq!(closure.to_string(), "function () {}");
    }
}
