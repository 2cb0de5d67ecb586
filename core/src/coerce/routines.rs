use std::sync::Arc;

use super::{CastMode, Conversion, matrix::conversion};
use crate::error::{Result, ScriptError};
use crate::typ::TypeTag;
use crate::val::Val;

/// Numeric payload widened to a common representation.
#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

#[inline]
fn numeric(val: &Val) -> Option<Num> {
    Some(match val {
        Val::Byte(v) => Num::I(i64::from(*v)),
        Val::Short(v) => Num::I(i64::from(*v)),
        Val::Char(c) => Num::I(i64::from(u32::from(*c))),
        Val::Int(v) => Num::I(i64::from(*v)),
        Val::Long(v) => Num::I(*v),
        Val::Float(v) => Num::F(f64::from(*v)),
        Val::Double(v) => Num::F(*v),
        _ => return None,
    })
}

/// Converts `val` to the slot tag `to` under `mode`.
///
/// Legality comes from the matrix; range handling:
/// - integral → narrower integral truncates (two's complement wrap);
/// - floating → integral truncates toward zero, NaN and out-of-range raise;
/// - double → float raises when a finite value exceeds the float range;
/// - integral → char raises unless the value is a Unicode scalar;
/// - text → anything parses and raises on malformed or out-of-range text.
pub(crate) fn convert(val: &Val, to: TypeTag, mode: CastMode) -> Result<Val> {
    let from = val.tag();
    if from == TypeTag::Null {
        return match to {
            TypeTag::Text | TypeTag::Object | TypeTag::Null => Ok(Val::Null),
            _ => Err(ScriptError::coercion(from, to, "null cannot be converted to a primitive")),
        };
    }
    match conversion(from, to) {
        Conversion::Unsupported => {
            return Err(ScriptError::coercion(from, to, "conversion is not defined"));
        }
        Conversion::Explicit if mode == CastMode::Implicit => {
            return Err(ScriptError::coercion(from, to, "requires an explicit cast"));
        }
        Conversion::Implicit | Conversion::Explicit => {}
    }
    if from == to {
        return Ok(val.clone());
    }
    match to {
        TypeTag::Text => Ok(Val::Str(val.to_text())),
        TypeTag::Bool => match val {
            Val::Str(s) => parse_bool(s),
            _ => Err(ScriptError::coercion(from, to, "conversion is not defined")),
        },
        TypeTag::Byte | TypeTag::Short | TypeTag::Int | TypeTag::Long | TypeTag::Char => match val {
            Val::Str(s) => parse_integral(s, to),
            _ => match numeric(val) {
                Some(Num::I(i)) => integral_from_i64(i, from, to),
                Some(Num::F(f)) => integral_from_f64(f, from, to),
                None => Err(ScriptError::coercion(from, to, "conversion is not defined")),
            },
        },
        TypeTag::Float | TypeTag::Double => match val {
            Val::Str(s) => parse_floating(s, to),
            _ => match numeric(val) {
                Some(Num::I(i)) => Ok(floating_from_i64(i, to)),
                Some(Num::F(f)) => floating_from_f64(f, from, to),
                None => Err(ScriptError::coercion(from, to, "conversion is not defined")),
            },
        },
        TypeTag::Object | TypeTag::Null => Err(ScriptError::coercion(from, to, "conversion is not defined")),
    }
}

fn integral_from_i64(i: i64, from: TypeTag, to: TypeTag) -> Result<Val> {
    Ok(match to {
        TypeTag::Byte => Val::Byte(i as i8),
        TypeTag::Short => Val::Short(i as i16),
        TypeTag::Int => Val::Int(i as i32),
        TypeTag::Long => Val::Long(i),
        TypeTag::Char => Val::Char(char_from_i64(i).ok_or_else(|| {
            ScriptError::coercion(from, to, format!("{i} is not a valid character"))
        })?),
        _ => return Err(ScriptError::coercion(from, to, "conversion is not defined")),
    })
}

fn integral_from_f64(f: f64, from: TypeTag, to: TypeTag) -> Result<Val> {
    if f.is_nan() {
        return Err(ScriptError::coercion(from, to, "NaN has no integral value"));
    }
    let t = f.trunc();
    let (min, max_exclusive) = match to {
        TypeTag::Byte => (f64::from(i8::MIN), f64::from(i8::MAX) + 1.0),
        TypeTag::Short => (f64::from(i16::MIN), f64::from(i16::MAX) + 1.0),
        TypeTag::Int => (f64::from(i32::MIN), f64::from(i32::MAX) + 1.0),
        // 2^63 is exactly representable; i64::MAX is not.
        TypeTag::Long => (-9_223_372_036_854_775_808.0, 9_223_372_036_854_775_808.0),
        TypeTag::Char => (0.0, f64::from(u32::from(char::MAX)) + 1.0),
        _ => return Err(ScriptError::coercion(from, to, "conversion is not defined")),
    };
    if t < min || t >= max_exclusive {
        return Err(ScriptError::coercion(from, to, format!("{f} is out of range")));
    }
    integral_from_i64(t as i64, from, to)
}

fn floating_from_i64(i: i64, to: TypeTag) -> Val {
    match to {
        TypeTag::Float => Val::Float(i as f32),
        _ => Val::Double(i as f64),
    }
}

fn floating_from_f64(f: f64, from: TypeTag, to: TypeTag) -> Result<Val> {
    match to {
        TypeTag::Float => {
            if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                return Err(ScriptError::coercion(from, to, format!("{f} is out of range")));
            }
            Ok(Val::Float(f as f32))
        }
        _ => Ok(Val::Double(f)),
    }
}

#[inline]
fn char_from_i64(i: i64) -> Option<char> {
    u32::try_from(i).ok().and_then(char::from_u32)
}

fn parse_bool(s: &str) -> Result<Val> {
    match s {
        "true" => Ok(Val::Bool(true)),
        "false" => Ok(Val::Bool(false)),
        _ => Err(ScriptError::coercion(TypeTag::Text, TypeTag::Bool, format!("`{s}` is not a boolean"))),
    }
}

fn parse_integral(s: &str, to: TypeTag) -> Result<Val> {
    let bad = || ScriptError::coercion(TypeTag::Text, to, format!("`{s}` is not a valid {to}"));
    Ok(match to {
        TypeTag::Byte => Val::Byte(s.parse().map_err(|_| bad())?),
        TypeTag::Short => Val::Short(s.parse().map_err(|_| bad())?),
        TypeTag::Int => Val::Int(s.parse().map_err(|_| bad())?),
        TypeTag::Long => Val::Long(s.parse().map_err(|_| bad())?),
        TypeTag::Char => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Val::Char(c),
                _ => return Err(bad()),
            }
        }
        _ => return Err(bad()),
    })
}

fn parse_floating(s: &str, to: TypeTag) -> Result<Val> {
    let bad = || ScriptError::coercion(TypeTag::Text, to, format!("`{s}` is not a valid {to}"));
    match to {
        TypeTag::Float => {
            let f: f32 = s.parse().map_err(|_| bad())?;
            if f.is_infinite() && !s.to_ascii_lowercase().contains("inf") {
                return Err(bad());
            }
            Ok(Val::Float(f))
        }
        _ => {
            let f: f64 = s.parse().map_err(|_| bad())?;
            if f.is_infinite() && !s.to_ascii_lowercase().contains("inf") {
                return Err(bad());
            }
            Ok(Val::Double(f))
        }
    }
}

/// Text used wherever a value is rendered into a string operand.
#[inline]
pub(crate) fn render_text(val: &Val) -> Arc<str> {
    match val {
        Val::Null => Arc::from("null"),
        other => other.to_text(),
    }
}
