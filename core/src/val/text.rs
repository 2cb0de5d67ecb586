use std::fmt;
use std::sync::Arc;

use super::Val;

impl Val {
    /// Appends the canonical text form of this value.
    ///
    /// Integers go through `itoa` and floats through `ryu`, so appending a
    /// number never allocates an intermediate string. Floats print as plain
    /// decimals for magnitudes in `[1e-3, 1e7)` and as `1.0E20` otherwise,
    /// always with a fractional digit; non-finite values print as `NaN`,
    /// `Infinity` and `-Infinity`.
    pub fn write_text(&self, out: &mut String) {
        match self {
            Val::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Val::Byte(v) => out.push_str(itoa::Buffer::new().format(*v)),
            Val::Short(v) => out.push_str(itoa::Buffer::new().format(*v)),
            Val::Char(c) => out.push(*c),
            Val::Int(v) => out.push_str(itoa::Buffer::new().format(*v)),
            Val::Long(v) => out.push_str(itoa::Buffer::new().format(*v)),
            Val::Float(v) if v.is_finite() => write_decimal(out, ryu::Buffer::new().format_finite(*v)),
            Val::Double(v) if v.is_finite() => write_decimal(out, ryu::Buffer::new().format_finite(*v)),
            Val::Float(v) => write_non_finite(out, f64::from(*v)),
            Val::Double(v) => write_non_finite(out, *v),
            Val::Str(s) => out.push_str(s),
            Val::Object(obj) => {
                use fmt::Write as _;
                let _ = write!(out, "{obj}");
            }
            Val::Null => out.push_str("null"),
        }
    }

    /// Canonical text form; text values are returned without copying.
    pub fn to_text(&self) -> Arc<str> {
        match self {
            Val::Str(s) => s.clone(),
            other => {
                let mut out = String::new();
                other.write_text(&mut out);
                Arc::from(out)
            }
        }
    }
}

/// Lays out the shortest digits `ryu` found. `shortest` is finite.
fn write_decimal(out: &mut String, shortest: &str) {
    let (negative, unsigned) = match shortest.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, shortest),
    };
    let (mantissa, exp) = match unsigned.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (unsigned, 0),
    };
    let (whole, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all = format!("{whole}{frac}");
    let leading = all.bytes().take_while(|&b| b == b'0').count();
    let digits = all[leading..].trim_end_matches('0');
    if negative {
        out.push('-');
    }
    if digits.is_empty() {
        out.push_str("0.0");
        return;
    }
    // decimal exponent of the first significant digit
    let exp = whole.len() as i32 - 1 - leading as i32 + exp;
    match exp {
        0..7 => {
            let int_len = exp as usize + 1;
            let (int_digits, frac_digits) = digits.split_at(int_len.min(digits.len()));
            out.push_str(int_digits);
            out.extend(std::iter::repeat_n('0', int_len - int_digits.len()));
            out.push('.');
            out.push_str(if frac_digits.is_empty() { "0" } else { frac_digits });
        }
        -3..0 => {
            out.push_str("0.");
            out.extend(std::iter::repeat_n('0', (-exp - 1) as usize));
            out.push_str(digits);
        }
        _ => {
            let (first, rest) = digits.split_at(1);
            out.push_str(first);
            out.push('.');
            out.push_str(if rest.is_empty() { "0" } else { rest });
            out.push('E');
            out.push_str(itoa::Buffer::new().format(exp));
        }
    }
}

fn write_non_finite(out: &mut String, v: f64) {
    out.push_str(if v.is_nan() {
        "NaN"
    } else if v > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    });
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Str(s) => f.write_str(s),
            other => {
                let mut out = String::new();
                other.write_text(&mut out);
                f.write_str(&out)
            }
        }
    }
}
