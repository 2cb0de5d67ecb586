//! Operators on dynamic operands.
//!
//! Each operator resolves per operand-tag tuple to a target whose descriptor
//! names the promoted operand types, e.g. `+(int,int)int` or `<(long,long)boolean`.
//! Call sites convert the operands into those types before invoking, so the
//! implementations below only ever see promoted values.

use anyhow::{anyhow, bail};

use super::{DispatchFlags, DispatchKind};
use crate::catalog::DescriptorCatalog;
use crate::coerce::{CastMode, CoercionTable, render_text};
use crate::error::Result;
use crate::typ::{NumericHierarchy, ScriptType, TypeTag};
use crate::val::Val;
use crate::whitelist::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    BitNot,
    Not,
}

impl UnaryOp {
    pub fn from_name(name: &str) -> Option<UnaryOp> {
        Some(match name {
            "neg" => UnaryOp::Neg,
            "plus" => UnaryOp::Plus,
            "bwnot" => UnaryOp::BitNot,
            "not" => UnaryOp::Not,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
    Lsh,
    Rsh,
    Ush,
}

impl BinaryOp {
    pub fn from_name(name: &str) -> Option<BinaryOp> {
        Some(match name {
            "add" => BinaryOp::Add,
            "sub" => BinaryOp::Sub,
            "mul" => BinaryOp::Mul,
            "div" => BinaryOp::Div,
            "rem" => BinaryOp::Rem,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            "xor" => BinaryOp::Xor,
            "lt" => BinaryOp::Lt,
            "lte" => BinaryOp::Lte,
            "gt" => BinaryOp::Gt,
            "gte" => BinaryOp::Gte,
            "eq" => BinaryOp::Eq,
            "ne" => BinaryOp::Ne,
            "lsh" => BinaryOp::Lsh,
            "rsh" => BinaryOp::Rsh,
            "ush" => BinaryOp::Ush,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lsh => "<<",
            BinaryOp::Rsh => ">>",
            BinaryOp::Ush => ">>>",
        }
    }

    #[inline]
    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Lsh | BinaryOp::Rsh | BinaryOp::Ush)
    }

    #[inline]
    fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte)
    }
}

/// Resolves operator `name` for the tags of `args`. `None` when the
/// operator is not defined for them.
pub fn resolve(kind: DispatchKind, name: &str, flags: DispatchFlags, args: &[Val]) -> Result<Option<Target>> {
    match (kind, args) {
        (DispatchKind::UnaryOperator, [operand]) => match UnaryOp::from_name(name) {
            Some(op) => unary(op, operand.tag()),
            None => Ok(None),
        },
        (DispatchKind::BinaryOperator | DispatchKind::ShiftOperator, [lhs, rhs]) => {
            let Some(op) = BinaryOp::from_name(name) else {
                return Ok(None);
            };
            if op.is_shift() != (kind == DispatchKind::ShiftOperator) {
                return Ok(None);
            }
            let Some(target) = binary(op, lhs.tag(), rhs.tag())? else {
                return Ok(None);
            };
            if flags.contains(DispatchFlags::COMPOUND_ASSIGNMENT) {
                return compound(op, target, lhs.tag()).map(Some);
            }
            Ok(Some(target))
        }
        _ => Ok(None),
    }
}

fn intern(symbol: &str, params: &[ScriptType], ret: ScriptType) -> Result<crate::catalog::Descriptor> {
    DescriptorCatalog::global().intern(symbol, params, ret)
}

fn unary(op: UnaryOp, tag: TypeTag) -> Result<Option<Target>> {
    let ty = match op {
        UnaryOp::Neg | UnaryOp::Plus => NumericHierarchy::promote(tag),
        UnaryOp::BitNot => NumericHierarchy::promote(tag).filter(|t| matches!(t, TypeTag::Int | TypeTag::Long)),
        UnaryOp::Not => (tag == TypeTag::Bool).then_some(TypeTag::Bool),
    };
    let Some(ty) = ty else {
        return Ok(None);
    };
    let slot = ScriptType::Primitive(ty);
    let descriptor = intern(op.symbol(), std::slice::from_ref(&slot), slot.clone())?;
    Ok(Some(Target::new(descriptor, move |args| eval_unary(op, &args[0]))))
}

fn binary(op: BinaryOp, lhs: TypeTag, rhs: TypeTag) -> Result<Option<Target>> {
    if op == BinaryOp::Add && (lhs == TypeTag::Text || rhs == TypeTag::Text) {
        let descriptor = intern(op.symbol(), &[ScriptType::Def, ScriptType::Def], ScriptType::Text)?;
        return Ok(Some(Target::new(descriptor, |args| {
            let (l, r) = (render_text(&args[0]), render_text(&args[1]));
            let mut out = String::with_capacity(l.len() + r.len());
            out.push_str(&l);
            out.push_str(&r);
            Ok(Val::from(out))
        })));
    }

    let (params, ret) = match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let Some(t) = NumericHierarchy::result(lhs, rhs) else {
                return Ok(None);
            };
            ([ScriptType::Primitive(t), ScriptType::Primitive(t)], ScriptType::Primitive(t))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            let t = if lhs == TypeTag::Bool && rhs == TypeTag::Bool {
                TypeTag::Bool
            } else {
                let Some(t) = NumericHierarchy::integral_result(lhs, rhs) else {
                    return Ok(None);
                };
                t
            };
            ([ScriptType::Primitive(t), ScriptType::Primitive(t)], ScriptType::Primitive(t))
        }
        _ if op.is_comparison() => {
            let Some(t) = NumericHierarchy::result(lhs, rhs) else {
                return Ok(None);
            };
            ([ScriptType::Primitive(t), ScriptType::Primitive(t)], ScriptType::BOOL)
        }
        BinaryOp::Eq | BinaryOp::Ne => match NumericHierarchy::result(lhs, rhs) {
            Some(t) => ([ScriptType::Primitive(t), ScriptType::Primitive(t)], ScriptType::BOOL),
            None => ([ScriptType::Def, ScriptType::Def], ScriptType::BOOL),
        },
        _ => {
            let Some(t) = NumericHierarchy::shift_result(lhs, rhs) else {
                return Ok(None);
            };
            ([ScriptType::Primitive(t), ScriptType::Def], ScriptType::Primitive(t))
        }
    };
    let descriptor = intern(op.symbol(), &params, ret)?;
    Ok(Some(Target::new(descriptor, move |args| {
        if op.is_shift() {
            eval_shift(op, &args[0], &args[1])
        } else {
            eval_binary(op, &args[0], &args[1])
        }
    })))
}

/// `lhs op= rhs`: the result narrows back to the left operand's type.
fn compound(op: BinaryOp, inner: Target, lhs: TypeTag) -> Result<Target> {
    let narrowed = match lhs {
        tag if tag.is_numeric() => ScriptType::Primitive(tag),
        _ => return Ok(inner),
    };
    if inner.descriptor().ret() == &narrowed {
        return Ok(inner);
    }
    let descriptor = intern(&format!("{}=", op.symbol()), &[narrowed.clone(), ScriptType::Def], narrowed)?;
    Ok(Target::new(descriptor, move |args| {
        let adapted = super::site::adapt_args(inner.descriptor().params(), args, None)?;
        let out = inner.invoke(&adapted)?;
        Ok(CoercionTable::global()?.convert(&out, lhs, CastMode::Explicit)?)
    }))
}

macro_rules! integral_binary {
    ($op:expr, $x:expr, $y:expr, $variant:ident) => {{
        let (x, y) = ($x, $y);
        Ok(match $op {
            BinaryOp::Add => Val::$variant(x.wrapping_add(y)),
            BinaryOp::Sub => Val::$variant(x.wrapping_sub(y)),
            BinaryOp::Mul => Val::$variant(x.wrapping_mul(y)),
            BinaryOp::Div if y == 0 => bail!("/ by zero"),
            BinaryOp::Div => Val::$variant(x.wrapping_div(y)),
            BinaryOp::Rem if y == 0 => bail!("/ by zero"),
            BinaryOp::Rem => Val::$variant(x.wrapping_rem(y)),
            BinaryOp::And => Val::$variant(x & y),
            BinaryOp::Or => Val::$variant(x | y),
            BinaryOp::Xor => Val::$variant(x ^ y),
            BinaryOp::Lt => Val::Bool(x < y),
            BinaryOp::Lte => Val::Bool(x <= y),
            BinaryOp::Gt => Val::Bool(x > y),
            BinaryOp::Gte => Val::Bool(x >= y),
            BinaryOp::Eq => Val::Bool(x == y),
            BinaryOp::Ne => Val::Bool(x != y),
            BinaryOp::Lsh | BinaryOp::Rsh | BinaryOp::Ush => bail!("shift resolved as a binary operator"),
        })
    }};
}

macro_rules! floating_binary {
    ($op:expr, $x:expr, $y:expr, $variant:ident) => {{
        let (x, y) = ($x, $y);
        Ok(match $op {
            BinaryOp::Add => Val::$variant(x + y),
            BinaryOp::Sub => Val::$variant(x - y),
            BinaryOp::Mul => Val::$variant(x * y),
            BinaryOp::Div => Val::$variant(x / y),
            BinaryOp::Rem => Val::$variant(x % y),
            BinaryOp::Lt => Val::Bool(x < y),
            BinaryOp::Lte => Val::Bool(x <= y),
            BinaryOp::Gt => Val::Bool(x > y),
            BinaryOp::Gte => Val::Bool(x >= y),
            BinaryOp::Eq => Val::Bool(x == y),
            BinaryOp::Ne => Val::Bool(x != y),
            other => bail!("operator {} is not defined for {}", other.symbol(), stringify!($variant)),
        })
    }};
}

fn eval_binary(op: BinaryOp, lhs: &Val, rhs: &Val) -> anyhow::Result<Val> {
    match (lhs, rhs) {
        (Val::Int(x), Val::Int(y)) => integral_binary!(op, *x, *y, Int),
        (Val::Long(x), Val::Long(y)) => integral_binary!(op, *x, *y, Long),
        (Val::Float(x), Val::Float(y)) => floating_binary!(op, *x, *y, Float),
        (Val::Double(x), Val::Double(y)) => floating_binary!(op, *x, *y, Double),
        (Val::Bool(x), Val::Bool(y)) => Ok(Val::Bool(match op {
            BinaryOp::And => x & y,
            BinaryOp::Or => x | y,
            BinaryOp::Xor | BinaryOp::Ne => x ^ y,
            BinaryOp::Eq => x == y,
            other => bail!("operator {} is not defined for boolean", other.symbol()),
        })),
        (l, r) => match op {
            BinaryOp::Eq => Ok(Val::Bool(l == r)),
            BinaryOp::Ne => Ok(Val::Bool(l != r)),
            other => Err(anyhow!(
                "operator {} is not defined for {} and {}",
                other.symbol(),
                l.type_name(),
                r.type_name()
            )),
        },
    }
}

fn eval_shift(op: BinaryOp, lhs: &Val, rhs: &Val) -> anyhow::Result<Val> {
    let distance = match rhs {
        Val::Byte(v) => i64::from(*v),
        Val::Short(v) => i64::from(*v),
        Val::Char(c) => i64::from(u32::from(*c)),
        Val::Int(v) => i64::from(*v),
        Val::Long(v) => *v,
        other => bail!("shift distance must be integral, found {}", other.type_name()),
    };
    Ok(match *lhs {
        Val::Int(x) => {
            let d = (distance & 0x1f) as u32;
            Val::Int(match op {
                BinaryOp::Lsh => x.wrapping_shl(d),
                BinaryOp::Rsh => x.wrapping_shr(d),
                _ => ((x as u32) >> d) as i32,
            })
        }
        Val::Long(x) => {
            let d = (distance & 0x3f) as u32;
            Val::Long(match op {
                BinaryOp::Lsh => x.wrapping_shl(d),
                BinaryOp::Rsh => x.wrapping_shr(d),
                _ => ((x as u64) >> d) as i64,
            })
        }
        ref other => bail!("cannot shift {}", other.type_name()),
    })
}

fn eval_unary(op: UnaryOp, operand: &Val) -> anyhow::Result<Val> {
    Ok(match (op, operand) {
        (UnaryOp::Plus, v) => v.clone(),
        (UnaryOp::Neg, Val::Int(x)) => Val::Int(x.wrapping_neg()),
        (UnaryOp::Neg, Val::Long(x)) => Val::Long(x.wrapping_neg()),
        (UnaryOp::Neg, Val::Float(x)) => Val::Float(-x),
        (UnaryOp::Neg, Val::Double(x)) => Val::Double(-x),
        (UnaryOp::BitNot, Val::Int(x)) => Val::Int(!x),
        (UnaryOp::BitNot, Val::Long(x)) => Val::Long(!x),
        (UnaryOp::Not, Val::Bool(b)) => Val::Bool(!b),
        (op, v) => bail!("operator {} is not defined for {}", op.symbol(), v.type_name()),
    })
}
