//! Unit compilation.
//!
//! The [`Writer`] turns a type-checked [`ir::Node`] tree into a tree of
//! boxed steps. Dynamic operations get a call site in the unit's arena,
//! concatenations a plan, lambdas a closure factory; all of it is decided
//! once, so executing a [`CompiledUnit`] only evaluates.

pub mod ir;

mod frame;
mod scope;
mod unit;
mod writer;

pub use ir::{DynamicOp, LambdaNode, Node, RefTarget, UnitSource};
pub use unit::CompiledUnit;
pub use writer::{LIST_CLASS, LIST_CONSTRUCTOR, Writer};
