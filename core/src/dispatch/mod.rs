//! Call-site dispatch.
//!
//! Every dynamically typed operation in a compiled unit owns a [`CallSite`]
//! holding a bounded polymorphic inline cache from observed argument shapes
//! to resolved [`Target`](crate::whitelist::Target)s. Sites live in a
//! [`CallSiteTable`] arena and compiled steps refer to them by
//! [`CallSiteId`].

use std::fmt;
use std::sync::Arc;

use crate::typ::{ScriptType, TypeTag, join_types};
use crate::val::Val;

pub mod bootstrap;
mod cache;
pub mod operators;
mod resolver;
mod site;

pub use cache::{CacheState, CacheStats, InlineCache, Insertion};
pub use resolver::{LookupResolver, Resolver};
pub use site::{CallSite, CallSiteId, CallSiteTable};
pub(crate) use site::adapt_args;

/// Default number of argument shapes a site caches before going megamorphic.
pub const DEFAULT_PIC_DEPTH: usize = 4;

/// What a dynamic operation does with its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// `receiver.name(args..)`
    MethodCall,
    /// `receiver.name`
    Load,
    /// `receiver.name = value`
    Store,
    /// `receiver::name`, producing a closure of the site's return shape
    Reference,
    UnaryOperator,
    BinaryOperator,
    /// Shift operators; typed by the left operand only.
    ShiftOperator,
}

impl DispatchKind {
    /// Whether `args[0]` is a receiver.
    #[inline]
    pub fn has_receiver(self) -> bool {
        matches!(
            self,
            DispatchKind::MethodCall | DispatchKind::Load | DispatchKind::Store | DispatchKind::Reference
        )
    }
}

/// Small flag set handed to the resolution callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DispatchFlags(u8);

impl DispatchFlags {
    pub const NONE: DispatchFlags = DispatchFlags(0);
    /// A null receiver short-circuits to null instead of failing.
    pub const ALLOWS_NULL: DispatchFlags = DispatchFlags(1);
    /// The operation is the read half of a compound assignment.
    pub const COMPOUND_ASSIGNMENT: DispatchFlags = DispatchFlags(1 << 1);
    /// The result is converted to the site's return type with an explicit cast.
    pub const EXPLICIT_CAST: DispatchFlags = DispatchFlags(1 << 2);

    const ALL: u8 = 0b111;

    /// Rejects unknown bits.
    pub fn from_bits(bits: u8) -> Option<DispatchFlags> {
        (bits & !Self::ALL == 0).then_some(DispatchFlags(bits))
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: DispatchFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DispatchFlags {
    type Output = DispatchFlags;

    fn bitor(self, rhs: DispatchFlags) -> DispatchFlags {
        DispatchFlags(self.0 | rhs.0)
    }
}

/// Static shape of a dynamic operation as the type checker saw it: declared
/// argument types (mostly `def`) and the slot type the result flows into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Box<[ScriptType]>,
    ret: ScriptType,
}

impl Signature {
    pub fn new(params: impl Into<Box<[ScriptType]>>, ret: ScriptType) -> Self {
        Self {
            params: params.into(),
            ret,
        }
    }

    /// `arity` dynamic arguments producing a dynamic result.
    pub fn dynamic(arity: usize) -> Self {
        Self::new(vec![ScriptType::Def; arity], ScriptType::Def)
    }

    #[inline]
    pub fn params(&self) -> &[ScriptType] {
        &self.params
    }

    #[inline]
    pub fn ret(&self) -> &ScriptType {
        &self.ret
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", join_types(self.params()), self.ret)
    }
}

/// One element of an argument shape: the tag of a primitive/text/null value,
/// or the class of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Tag(TypeTag),
    Class(Arc<str>),
}

impl TypeKey {
    pub fn of(val: &Val) -> TypeKey {
        match val {
            Val::Object(obj) => TypeKey::Class(obj.class().clone()),
            other => TypeKey::Tag(other.tag()),
        }
    }

    /// Compares against a value without building its key.
    #[inline]
    pub fn matches(&self, val: &Val) -> bool {
        match (self, val) {
            (TypeKey::Class(class), Val::Object(obj)) => {
                Arc::ptr_eq(class, obj.class()) || class.as_ref() == obj.class().as_ref()
            }
            (TypeKey::Tag(tag), other) => other.tag() == *tag && !matches!(other, Val::Object(_)),
            _ => false,
        }
    }

    /// Class name the whitelist knows values of this key by.
    pub fn class_name(&self) -> &str {
        match self {
            TypeKey::Tag(tag) => tag.class_name(),
            TypeKey::Class(class) => class,
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Renders a runtime argument list as `Integer,String` for diagnostics.
pub(crate) fn describe_args(args: &[Val]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(arg.type_name());
    }
    out
}

#[cfg(test)]
mod dispatch_test;
