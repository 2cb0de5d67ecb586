use super::Conversion;
use crate::typ::TypeTag;

const I: Conversion = Conversion::Implicit;
const E: Conversion = Conversion::Explicit;
const U: Conversion = Conversion::Unsupported;

/// Pairwise conversion rules, rows = source tag, columns = target tag, both
/// in [`TypeTag::CONVERTIBLE`] order:
/// bool, byte, short, char, int, long, float, double, String, Object.
///
/// Every pair is listed directly; nothing is derived by composing widenings.
#[rustfmt::skip]
const MATRIX: [[Conversion; 10]; 10] = [
    //            bool byte short char int long float double String Object
    /* bool   */ [I,   U,   U,    U,   U,  U,   U,    U,     E,     U],
    /* byte   */ [U,   I,   I,    E,   I,  I,   I,    I,     E,     U],
    /* short  */ [U,   E,   I,    E,   I,  I,   I,    I,     E,     U],
    /* char   */ [U,   E,   E,    I,   I,  I,   I,    I,     E,     U],
    /* int    */ [U,   E,   E,    E,   I,  I,   I,    I,     E,     U],
    /* long   */ [U,   E,   E,    E,   E,  I,   I,    I,     E,     U],
    /* float  */ [U,   E,   E,    E,   E,  E,   I,    I,     E,     U],
    /* double */ [U,   E,   E,    E,   E,  E,   E,    I,     E,     U],
    /* String */ [E,   E,   E,    E,   E,  E,   E,    E,     I,     U],
    /* Object */ [U,   U,   U,    U,   U,  U,   U,    U,     E,     I],
];

/// Rule for converting a value tagged `from` into a slot tagged `to`.
///
/// `null` is not a row: it converts to every nullable slot and to no
/// primitive one, which the table handles before consulting the matrix.
pub fn conversion(from: TypeTag, to: TypeTag) -> Conversion {
    let (Some(row), Some(col)) = (from.matrix_index(), to.matrix_index()) else {
        return Conversion::Unsupported;
    };
    MATRIX[row][col]
}
