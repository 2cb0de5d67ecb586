use std::sync::Arc;

use crate::typ::TypeTag;

mod convert;
mod host;
mod text;

pub use convert::FromVal;
pub use host::HostRef;

/// The dynamic value flowing through `def`-typed slots.
///
/// Exactly one payload is active; conversions produce a new value rather than
/// reinterpreting the existing payload.
#[derive(Debug, Default, Clone)]
pub enum Val {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Text, wrapped in Arc<str> so copies between slots never reallocate
    Str(Arc<str>),
    /// Host object, including synthesized closures
    Object(HostRef),
    #[default]
    Null,
}

impl Val {
    #[inline]
    pub fn tag(&self) -> TypeTag {
        match self {
            Val::Bool(_) => TypeTag::Bool,
            Val::Byte(_) => TypeTag::Byte,
            Val::Short(_) => TypeTag::Short,
            Val::Char(_) => TypeTag::Char,
            Val::Int(_) => TypeTag::Int,
            Val::Long(_) => TypeTag::Long,
            Val::Float(_) => TypeTag::Float,
            Val::Double(_) => TypeTag::Double,
            Val::Str(_) => TypeTag::Text,
            Val::Object(_) => TypeTag::Object,
            Val::Null => TypeTag::Null,
        }
    }

    /// Whitelist class name of the runtime value.
    #[inline]
    pub fn type_name(&self) -> &str {
        match self {
            Val::Object(obj) => obj.class(),
            other => other.tag().class_name(),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&HostRef> {
        match self {
            Val::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn object<T: std::any::Any + Send + Sync>(class: impl Into<Arc<str>>, value: T) -> Val {
        Val::Object(HostRef::new(class, value))
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Byte(a), Val::Byte(b)) => a == b,
            (Val::Short(a), Val::Short(b)) => a == b,
            (Val::Char(a), Val::Char(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Long(a), Val::Long(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::Double(a), Val::Double(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Object(a), Val::Object(b)) => a.ptr_eq(b),
            (Val::Null, Val::Null) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod val_test;
