pub mod catalog;
pub mod coerce;
pub mod codegen;
pub mod concat;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lambda;
pub mod trace;
pub mod typ;
pub mod util;
pub mod val;
pub mod whitelist;

pub use codegen::{CompiledUnit, Writer};
pub use error::{ErrorKind, ScriptError};
