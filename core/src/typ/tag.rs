use std::fmt;

/// Runtime type tag of a dynamic value.
///
/// Declaration order doubles as the numeric rank used for promotion
/// (`Int < Long < Float < Double`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Text,
    Object,
    Null,
}

impl TypeTag {
    /// Every tag that participates in the coercion matrix, in matrix order.
    pub const CONVERTIBLE: [TypeTag; 10] = [
        TypeTag::Bool,
        TypeTag::Byte,
        TypeTag::Short,
        TypeTag::Char,
        TypeTag::Int,
        TypeTag::Long,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::Text,
        TypeTag::Object,
    ];

    /// Tags with an unboxed representation.
    pub const PRIMITIVES: [TypeTag; 8] = [
        TypeTag::Bool,
        TypeTag::Byte,
        TypeTag::Short,
        TypeTag::Char,
        TypeTag::Int,
        TypeTag::Long,
        TypeTag::Float,
        TypeTag::Double,
    ];

    /// Row/column of this tag in the coercion matrix. `Null` has none.
    #[inline]
    pub fn matrix_index(self) -> Option<usize> {
        match self {
            TypeTag::Null => None,
            other => Some(other as usize),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Bool => "boolean",
            TypeTag::Byte => "byte",
            TypeTag::Short => "short",
            TypeTag::Char => "char",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::Text => "String",
            TypeTag::Object => "Object",
            TypeTag::Null => "null",
        }
    }

    /// Whitelist class name for values carrying this tag.
    pub fn class_name(self) -> &'static str {
        match self {
            TypeTag::Bool => "Boolean",
            TypeTag::Byte => "Byte",
            TypeTag::Short => "Short",
            TypeTag::Char => "Character",
            TypeTag::Int => "Integer",
            TypeTag::Long => "Long",
            TypeTag::Float => "Float",
            TypeTag::Double => "Double",
            TypeTag::Text => "String",
            TypeTag::Object => "Object",
            TypeTag::Null => "null",
        }
    }

    #[inline]
    pub fn is_primitive(self) -> bool {
        (self as usize) <= (TypeTag::Double as usize)
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeTag::Byte
                | TypeTag::Short
                | TypeTag::Char
                | TypeTag::Int
                | TypeTag::Long
                | TypeTag::Float
                | TypeTag::Double
        )
    }

    #[inline]
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            TypeTag::Byte | TypeTag::Short | TypeTag::Char | TypeTag::Int | TypeTag::Long
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
