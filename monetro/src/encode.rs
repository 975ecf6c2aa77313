//! Host to wire value encoding.
use time::{
    format_description::BorrowedFormatItem as I,
    macros::format_description,
};

use crate::value::{ConversionError, Value};

const DATE: &[I<'_>] = format_description!("[year]-[month]-[day]");

const TIME: &[I<'_>] = format_description!("[hour]:[minute]:[second]");

const TIME_FRACTION: &[I<'_>] = format_description!("[hour]:[minute]:[second].[subsecond]");

const TIMESTAMP: &[I<'_>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

const TIMESTAMP_FRACTION: &[I<'_>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
);

impl Value {
    /// Render value as a protocol literal.
    ///
    /// ```
    /// use monetro::Value;
    ///
    /// assert_eq!(Value::from("it's").encode().unwrap(), r"'it\'s'");
    /// assert_eq!(Value::Null.encode().unwrap(), "NULL");
    /// ```
    pub fn encode(&self) -> Result<String, ConversionError> {
        let mut buf = String::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Same as [`encode`][Value::encode], append into existing buffer.
    pub fn encode_into(&self, buf: &mut String) -> Result<(), ConversionError> {
        let mut int = itoa::Buffer::new();
        match self {
            Value::Null => buf.push_str("NULL"),
            Value::Bool(true) => buf.push_str("true"),
            Value::Bool(false) => buf.push_str("false"),
            Value::Int8(v) => buf.push_str(int.format(*v)),
            Value::Int16(v) => buf.push_str(int.format(*v)),
            Value::Int32(v) => buf.push_str(int.format(*v)),
            Value::Int64(v) => buf.push_str(int.format(*v)),
            Value::Float32(v) => {
                if !v.is_finite() {
                    return Err(non_finite("float32"));
                }
                buf.push_str(&v.to_string());
            },
            Value::Float64(v) => {
                if !v.is_finite() {
                    return Err(non_finite("float64"));
                }
                buf.push_str(&v.to_string());
            },
            Value::Text(v) => {
                buf.push('\'');
                escape_into(v, buf);
                buf.push('\'');
            },
            Value::Bytes(v) => {
                buf.push('\'');
                escape_into(&String::from_utf8_lossy(v), buf);
                buf.push('\'');
            },
            Value::Date(v) => quoted(buf, v.format(DATE), "date")?,
            Value::Time(v) => {
                // fraction only when present, with as many digits as needed
                let format = if v.nanosecond() == 0 { TIME } else { TIME_FRACTION };
                quoted(buf, v.format(format), "time")?
            },
            Value::Timestamp(v) => {
                let format = if v.nanosecond() == 0 { TIMESTAMP } else { TIMESTAMP_FRACTION };
                quoted(buf, v.format(format), "timestamp")?
            },
        }
        Ok(())
    }
}

fn non_finite(kind: &'static str) -> ConversionError {
    ConversionError::UnsupportedValue { kind, reason: "not a finite number" }
}

fn quoted(
    buf: &mut String,
    formatted: Result<String, time::error::Format>,
    kind: &'static str,
) -> Result<(), ConversionError> {
    let formatted = formatted
        .map_err(|_| ConversionError::UnsupportedValue { kind, reason: "cannot be formatted" })?;
    buf.push('\'');
    buf.push_str(&formatted);
    buf.push('\'');
    Ok(())
}

/// Escape `\` and `'` with a backslash.
pub(crate) fn escape_into(text: &str, buf: &mut String) {
    for ch in text.chars() {
        if matches!(ch, '\\' | '\'') {
            buf.push('\\');
        }
        buf.push(ch);
    }
}
