//! Wire text printer, the inverse of the [reader](super::Reader).

use super::reader::{is_delimiter, number_shape};
use super::WireValue;
use crate::error::{LichatError, Result};
use crate::symbol::{Symbol, DEFAULT_NAMESPACE};

/// Print a value as wire text.
///
/// Fails for non-finite decimals and for strings or symbols containing NUL,
/// which is reserved as the frame terminator.
pub fn encode(value: &WireValue) -> Result<String> {
    let mut out = String::new();
    encode_into(value, &mut out)?;
    Ok(out)
}

/// Print a value, appending to `out`.
pub fn encode_into(value: &WireValue, out: &mut String) -> Result<()> {
    match value {
        WireValue::Integer(i) => out.push_str(&i.to_string()),
        WireValue::Decimal(d) => out.push_str(&format_decimal(*d)?),
        WireValue::String(s) => write_string(s, out)?,
        WireValue::Bool(true) => out.push('T'),
        WireValue::Bool(false) => out.push_str("NIL"),
        WireValue::Symbol(symbol) => write_symbol(symbol, out)?,
        WireValue::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                encode_into(item, out)?;
            }
            out.push(')');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) -> Result<()> {
    out.push('"');
    for c in s.chars() {
        match c {
            '\0' => return Err(LichatError::Encode("string contains NUL".into())),
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    Ok(())
}

fn write_symbol(symbol: &Symbol, out: &mut String) -> Result<()> {
    if symbol.is_keyword() {
        out.push(':');
    } else if symbol.namespace() != DEFAULT_NAMESPACE {
        write_token(symbol.namespace(), out)?;
        out.push(':');
    } else if number_shape(symbol.name()).is_some() || matches!(symbol.key(), "t" | "nil") {
        // Would read back as a number or boolean.
        out.push('\\');
    }
    write_token(symbol.name(), out)
}

fn write_token(token: &str, out: &mut String) -> Result<()> {
    if token.is_empty() {
        return Err(LichatError::Encode("empty symbol name".into()));
    }
    for c in token.chars() {
        if c == '\0' {
            return Err(LichatError::Encode("symbol contains NUL".into()));
        }
        if c == '\\' || is_delimiter(c) {
            out.push('\\');
        }
        out.push(c);
    }
    Ok(())
}

/// Print a decimal in fixed-point notation.
///
/// Starts from the shortest round-tripping scientific form and moves the
/// decimal point through the digit string until the exponent is gone. The
/// result always contains a `.` so it reads back as a decimal.
pub fn format_decimal(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(LichatError::Encode(format!(
            "{} has no fixed-point form",
            value
        )));
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .ok_or_else(|| LichatError::Encode(format!("unexpected float form {}", scientific)))?;
    let exponent: i64 = exponent
        .parse()
        .map_err(|_| LichatError::Encode(format!("unexpected exponent in {}", scientific)))?;
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    // Position of the decimal point within `digits`.
    let point = 1 + exponent;
    let len = digits.len() as i64;
    let mut out = String::with_capacity(digits.len() + 8);
    if negative {
        out.push('-');
    }
    if point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-point) as usize));
        out.push_str(&digits);
    } else if point >= len {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((point - len) as usize));
        out.push_str(".0");
    } else {
        let (int, frac) = digits.split_at(point as usize);
        out.push_str(int);
        out.push('.');
        out.push_str(frac);
    }
    Ok(out)
}
