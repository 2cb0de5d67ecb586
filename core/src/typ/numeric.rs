use super::TypeTag;

/// Numeric promotion used when resolving dynamic operators.
pub struct NumericHierarchy;

impl NumericHierarchy {
    /// Unary promotion: sub-int integrals widen to `int`.
    pub fn promote(tag: TypeTag) -> Option<TypeTag> {
        match tag {
            TypeTag::Byte | TypeTag::Short | TypeTag::Char | TypeTag::Int => Some(TypeTag::Int),
            TypeTag::Long | TypeTag::Float | TypeTag::Double => Some(tag),
            _ => None,
        }
    }

    /// Binary promotion: both sides promoted, then the wider one wins.
    pub fn result(lhs: TypeTag, rhs: TypeTag) -> Option<TypeTag> {
        Some(NumericHierarchy::promote(lhs)?.max(NumericHierarchy::promote(rhs)?))
    }

    /// Promotion for bitwise operators; floating operands are rejected.
    pub fn integral_result(lhs: TypeTag, rhs: TypeTag) -> Option<TypeTag> {
        let promoted = NumericHierarchy::result(lhs, rhs)?;
        matches!(promoted, TypeTag::Int | TypeTag::Long).then_some(promoted)
    }

    /// Shift result type follows the left operand only.
    pub fn shift_result(lhs: TypeTag, rhs: TypeTag) -> Option<TypeTag> {
        if !rhs.is_integral() {
            return None;
        }
        let promoted = NumericHierarchy::promote(lhs)?;
        matches!(promoted, TypeTag::Int | TypeTag::Long).then_some(promoted)
    }
}
