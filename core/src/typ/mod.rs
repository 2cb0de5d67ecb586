mod numeric;
mod script_type;
mod tag;

pub use numeric::NumericHierarchy;
pub use script_type::{ScriptType, join_types};
pub use tag::TypeTag;
