use rusqlite::types::ValueRef;
use sqlcase::engine::ScalarValue;

/// Text rendering of a column value, as SQLite's `get_table` API produces it.
///
/// Integers print in decimal, reals like `printf("%!.15g")`, text and blobs as
/// their bytes up to the first NUL. NULL stays `None`.
pub(crate) fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(format_real(v)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(c_string(bytes)),
    }
}

pub(crate) fn scalar_value(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Integer(v) => ScalarValue::Integer(v),
        ValueRef::Real(v) => ScalarValue::Real(v),
        ValueRef::Text(bytes) => ScalarValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => ScalarValue::Blob(bytes.to_vec()),
    }
}

fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

const SIGNIFICANT_DIGITS: i32 = 15;

/// `%!.15g`: 15 significant digits, trailing zeros dropped but at least one
/// digit after the decimal point, exponent form outside `1e-4..1e15`.
pub(crate) fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        // negative zero prints unsigned
        return "0.0".to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let formatted = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value.abs());
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (formatted.as_str(), 0),
    };
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let fraction = trim_fraction(&digits[1..]);
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!(
            "{}{}.{}e{}{:02}",
            sign,
            &digits[..1],
            fraction,
            exp_sign,
            exponent.abs()
        );
    }

    if exponent >= 0 {
        let split = (exponent + 1) as usize;
        format!(
            "{}{}.{}",
            sign,
            &digits[..split],
            trim_fraction(&digits[split..])
        )
    } else {
        let zeros = "0".repeat((-exponent - 1) as usize);
        format!("{}0.{}", sign, trim_fraction(&format!("{}{}", zeros, digits)))
    }
}

fn trim_fraction(fraction: &str) -> String {
    let trimmed = fraction.trim_end_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
