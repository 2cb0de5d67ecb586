use std::sync::Arc;

use crate::typ::TypeTag;

use super::{HostRef, Val};

macro_rules! impl_primitive {
    ($ty:ty, $variant:ident, $tag:ident) => {
        impl From<$ty> for Val {
            #[inline]
            fn from(v: $ty) -> Self {
                Val::$variant(v)
            }
        }

        impl FromVal for $ty {
            const TAG: TypeTag = TypeTag::$tag;

            #[inline]
            fn from_val(val: &Val) -> Option<Self> {
                match val {
                    Val::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

/// Rust types with a one-to-one dynamic tag.
///
/// `from_val` only unwraps a value already carrying [`FromVal::TAG`]; the
/// coercion table is responsible for converting other tags first.
pub trait FromVal: Sized {
    const TAG: TypeTag;

    fn from_val(val: &Val) -> Option<Self>;
}

impl_primitive!(bool, Bool, Bool);
impl_primitive!(i8, Byte, Byte);
impl_primitive!(i16, Short, Short);
impl_primitive!(char, Char, Char);
impl_primitive!(i32, Int, Int);
impl_primitive!(i64, Long, Long);
impl_primitive!(f32, Float, Float);
impl_primitive!(f64, Double, Double);

impl FromVal for Arc<str> {
    const TAG: TypeTag = TypeTag::Text;

    #[inline]
    fn from_val(val: &Val) -> Option<Self> {
        match val {
            Val::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromVal for String {
    const TAG: TypeTag = TypeTag::Text;

    #[inline]
    fn from_val(val: &Val) -> Option<Self> {
        val.as_str().map(str::to_string)
    }
}

impl From<String> for Val {
    #[inline]
    fn from(s: String) -> Self {
        Val::Str(Arc::<str>::from(s))
    }
}

impl From<&str> for Val {
    #[inline]
    fn from(s: &str) -> Self {
        Val::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Val {
    #[inline]
    fn from(s: Arc<str>) -> Self {
        Val::Str(s)
    }
}

impl From<HostRef> for Val {
    #[inline]
    fn from(obj: HostRef) -> Self {
        Val::Object(obj)
    }
}

impl<T> From<Option<T>> for Val
where
    T: Into<Val>,
{
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => v.into(),
            None => Val::Null,
        }
    }
}

impl From<()> for Val {
    fn from(_: ()) -> Self {
        Val::Null
    }
}
