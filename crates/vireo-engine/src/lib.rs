//! Vireo VM Runtime Core
//!
//! This crate provides the namespace-resolution and module-initialization
//! core of the Vireo virtual machine:
//! - Domains: name isolation with parent-first delegation
//! - Lazy, reentrancy-tolerant script initialization
//! - The class object model (arena of class records) and method closures
//! - The callable protocol and the runtime/interpreter seam
//!
//! # Example
//!
//! ```rust,ignore
//! use vireo_engine::{Domain, ExecMode, Unit, VmEnv};
//!
//! let env = Arc::new(VmEnv::new(runtime));
//! let system = Domain::new(env.clone(), None, ExecMode::AlwaysInterpret, false);
//! let app = Domain::new(env, Some(system), ExecMode::AlwaysInterpret, false);
//!
//! let unit = Unit::new(unit_def);
//! app.execute_unit(&unit)?;
//! let value = app.get_property(&Multiname::from_simple_name("Q::Foo"), true, true)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod callable;
pub mod closure;
pub mod domain;
pub mod error;
pub mod global;
pub mod object;
pub mod runtime;
pub mod trace;
pub mod unit;
pub mod value;

pub use callable::{constructing, passthrough, Callable, FnCallable, NotConstructible};
pub use closure::MethodClosure;
pub use domain::{BootstrapClasses, Domain, DomainId, ResolvedName};
pub use error::{VmError, VmResult};
pub use global::{Global, NATIVE_HOOK};
pub use object::{Class, ClassArena, ClassId, InstanceTemplate, MethodTable, Object};
pub use runtime::{
    native_hook, ExecContext, ExecMode, NativeRegistry, Runtime, TraceOptions, VmEnv,
};
pub use trace::IndentingWriter;
pub use unit::{Script, ScriptState, Unit};
pub use value::Value;

// Re-export the unit format types (canonical definitions live in
// vireo-bytecode)
pub use vireo_bytecode::{MethodDef, Multiname, Namespace, QName, ScriptDef, UnitDef, UnitError};
