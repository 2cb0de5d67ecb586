use std::fmt;
use std::sync::Arc;

use super::TypeTag;

/// Declared type of a slot, parameter or descriptor position as handed over
/// by the type checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptType {
    Void,
    /// The dynamic escape-hatch type.
    Def,
    /// Unboxed primitive; only tags `Bool..=Double`.
    Primitive(TypeTag),
    /// Nullable boxed primitive; only tags `Bool..=Double`.
    Boxed(TypeTag),
    Text,
    /// Whitelisted class by name.
    Object(Arc<str>),
}

impl ScriptType {
    pub const BOOL: ScriptType = ScriptType::Primitive(TypeTag::Bool);
    pub const BYTE: ScriptType = ScriptType::Primitive(TypeTag::Byte);
    pub const SHORT: ScriptType = ScriptType::Primitive(TypeTag::Short);
    pub const CHAR: ScriptType = ScriptType::Primitive(TypeTag::Char);
    pub const INT: ScriptType = ScriptType::Primitive(TypeTag::Int);
    pub const LONG: ScriptType = ScriptType::Primitive(TypeTag::Long);
    pub const FLOAT: ScriptType = ScriptType::Primitive(TypeTag::Float);
    pub const DOUBLE: ScriptType = ScriptType::Primitive(TypeTag::Double);

    pub fn object(name: impl Into<Arc<str>>) -> Self {
        ScriptType::Object(name.into())
    }

    pub fn parse(s: &str) -> Option<ScriptType> {
        let s = s.trim();
        let ty = match s {
            "void" => ScriptType::Void,
            "def" => ScriptType::Def,
            "String" => ScriptType::Text,
            "boolean" => ScriptType::BOOL,
            "byte" => ScriptType::BYTE,
            "short" => ScriptType::SHORT,
            "char" => ScriptType::CHAR,
            "int" => ScriptType::INT,
            "long" => ScriptType::LONG,
            "float" => ScriptType::FLOAT,
            "double" => ScriptType::DOUBLE,
            "Boolean" => ScriptType::Boxed(TypeTag::Bool),
            "Byte" => ScriptType::Boxed(TypeTag::Byte),
            "Short" => ScriptType::Boxed(TypeTag::Short),
            "Character" => ScriptType::Boxed(TypeTag::Char),
            "Integer" => ScriptType::Boxed(TypeTag::Int),
            "Long" => ScriptType::Boxed(TypeTag::Long),
            "Float" => ScriptType::Boxed(TypeTag::Float),
            "Double" => ScriptType::Boxed(TypeTag::Double),
            _ => {
                let mut chars = s.chars();
                let first = chars.next()?;
                if !first.is_ascii_uppercase() || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return None;
                }
                ScriptType::Object(Arc::from(s))
            }
        };
        Some(ty)
    }

    /// Tag a value must carry (after conversion) to live in this slot.
    /// `None` for `def` and `void`.
    pub fn tag(&self) -> Option<TypeTag> {
        match self {
            ScriptType::Primitive(tag) | ScriptType::Boxed(tag) => Some(*tag),
            ScriptType::Text => Some(TypeTag::Text),
            ScriptType::Object(_) => Some(TypeTag::Object),
            ScriptType::Def | ScriptType::Void => None,
        }
    }

    pub fn accepts_null(&self) -> bool {
        !matches!(self, ScriptType::Primitive(_))
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptType::Void => f.write_str("void"),
            ScriptType::Def => f.write_str("def"),
            ScriptType::Primitive(tag) => f.write_str(tag.name()),
            ScriptType::Boxed(tag) => f.write_str(tag.class_name()),
            ScriptType::Text => f.write_str("String"),
            ScriptType::Object(name) => f.write_str(name),
        }
    }
}

/// Renders a parameter list as `a,b,c` for diagnostics and descriptor text.
pub fn join_types<'a>(types: impl IntoIterator<Item = &'a ScriptType>) -> String {
    let mut out = String::new();
    for (idx, ty) in types.into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&ty.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        for src in ["void", "def", "int", "Integer", "Character", "String", "Doc"] {
            let ty = ScriptType::parse(src).unwrap();
            assert_eq!(ty.to_string(), src);
        }
    }

    #[test]
    fn parse_rejects_lowercase_unknowns() {
        assert_eq!(ScriptType::parse("integer"), None);
        assert_eq!(ScriptType::parse("Map<K>"), None);
    }
}
