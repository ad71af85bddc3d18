//! Vireo VM Compiled Unit Definitions
//!
//! This crate provides the descriptor types for compiled code units: the
//! scripts a unit contains, the methods they reference, and the qualified
//! names scripts define. Bytecode encoding and disassembly live outside
//! this workspace; the engine consumes these descriptors through the
//! runtime seam.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod name;
pub mod unit;

pub use name::{Multiname, Namespace, QName};
pub use unit::{MethodDef, ScriptDef, UnitDef, UnitError};
