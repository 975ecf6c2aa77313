//! Wire to host value decoding.
use bytes::Bytes;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time,
    format_description::BorrowedFormatItem as I,
    macros::format_description,
};

use crate::{
    ext::StrExt,
    mapi::{MonetType, ScanType},
    value::{ConversionError, Value},
};

#[derive(Clone, Copy)]
enum Layout {
    Date,
    DateTime,
    DateTimeOffset,
    Time,
}

/// Temporal layouts, first match wins.
const LAYOUTS: &[(Layout, &[I<'_>])] = &[
    (Layout::Date, format_description!("[year]-[month]-[day]")),
    (Layout::DateTime, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")),
    (
        Layout::DateTime,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    ),
    (
        Layout::DateTimeOffset,
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
        ),
    ),
    (
        Layout::DateTimeOffset,
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ),
    (
        Layout::DateTimeOffset,
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ),
    (Layout::Time, format_description!("[hour]:[minute]:[second]")),
    (Layout::Time, format_description!("[hour]:[minute]:[second].[subsecond]")),
    // timetz, offset is dropped
    (
        Layout::Time,
        format_description!("[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"),
    ),
    (
        Layout::Time,
        format_description!(
            "[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ),
];

enum Temporal {
    Date(Date),
    DateTime(OffsetDateTime),
    Time(Time),
}

/// Decode one tuple field by the column type name.
///
/// Unknown type names fail with [`ConversionError::UnsupportedType`].
pub fn decode_named(raw: &str, type_name: &str) -> Result<Value, ConversionError> {
    match MonetType::from_name(type_name) {
        Some(ty) => decode(raw, ty),
        None => Err(ConversionError::UnsupportedType(type_name.to_owned())),
    }
}

/// Decode one tuple field.
///
/// The literal `NULL` decodes to [`Value::Null`] for every type.
pub fn decode(raw: &str, ty: MonetType) -> Result<Value, ConversionError> {
    let raw = raw.trim();

    if raw == "NULL" {
        return Ok(Value::Null);
    }

    let invalid = || ConversionError::InvalidText { type_name: ty.name(), text: raw.to_owned() };

    let value = match ty.scan_type() {
        ScanType::Null => Value::Null,
        ScanType::Text => match raw.strip_quotes() {
            Some(inner) => Value::Text(unescape(inner).ok_or_else(invalid)?),
            None => Value::Text(raw.to_owned()),
        },
        ScanType::Bytes => Value::Bytes(Bytes::copy_from_slice(raw.unquoted().as_bytes())),
        ScanType::Bool => Value::Bool(parse_bool(raw).ok_or_else(invalid)?),
        ScanType::Int8 => Value::Int8(raw.parse().map_err(|_| invalid())?),
        ScanType::Int16 => Value::Int16(raw.parse().map_err(|_| invalid())?),
        ScanType::Int32 => Value::Int32(raw.parse().map_err(|_| invalid())?),
        ScanType::Int64 => Value::Int64(raw.parse().map_err(|_| invalid())?),
        ScanType::Float32 => Value::Float32(raw.parse().map_err(|_| invalid())?),
        ScanType::Float64 => Value::Float64(raw.parse().map_err(|_| invalid())?),
        ScanType::Temporal => {
            let temporal = parse_temporal(raw.unquoted()).ok_or_else(invalid)?;
            match (ty, temporal) {
                (MonetType::Date, Temporal::Date(d)) => Value::Date(d),
                (MonetType::Date, Temporal::DateTime(dt)) => Value::Date(dt.date()),
                (MonetType::Time | MonetType::Timetz, Temporal::Time(t)) => Value::Time(t),
                (MonetType::Time | MonetType::Timetz, Temporal::DateTime(dt)) => Value::Time(dt.time()),
                (MonetType::Time | MonetType::Timetz, Temporal::Date(_)) => Value::Time(Time::MIDNIGHT),
                (_, Temporal::DateTime(dt)) => Value::Timestamp(dt),
                (_, Temporal::Date(d)) => Value::Timestamp(d.midnight().assume_utc()),
                (_, Temporal::Time(_)) => return Err(invalid()),
            }
        },
    };

    Ok(value)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_temporal(raw: &str) -> Option<Temporal> {
    LAYOUTS.iter().find_map(|&(layout, format)| match layout {
        Layout::Date => Date::parse(raw, format).ok().map(Temporal::Date),
        Layout::DateTime => PrimitiveDateTime::parse(raw, format)
            .ok()
            .map(|dt| Temporal::DateTime(dt.assume_utc())),
        Layout::DateTimeOffset => OffsetDateTime::parse(raw, format).ok().map(Temporal::DateTime),
        Layout::Time => Time::parse(raw, format).ok().map(Temporal::Time),
    })
}

/// Resolve backslash escapes.
///
/// Returns [`None`] on an unknown or truncated escape, or when the
/// escaped bytes are not valid utf8.
pub(crate) fn unescape(text: &str) -> Option<String> {
    if !text.contains('\\') {
        return Some(text.to_owned());
    }

    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.as_bytes().iter().copied();

    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }

        match bytes.next()? {
            b'\\' => out.push(b'\\'),
            b'\'' => out.push(b'\''),
            b'"' => out.push(b'"'),
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            d @ b'0'..=b'7' => {
                let mut n = u32::from(d - b'0');
                for _ in 0..2 {
                    let d = bytes.next().filter(|d| matches!(*d, b'0'..=b'7'))?;
                    n = n * 8 + u32::from(d - b'0');
                }
                out.push(u8::try_from(n).ok()?);
            },
            b'x' => {
                let n = hex(&mut bytes, 2)?;
                out.push(u8::try_from(n).ok()?);
            },
            b'u' => {
                let ch = char::from_u32(hex(&mut bytes, 4)?)?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            },
            _ => return None,
        }
    }

    String::from_utf8(out).ok()
}

fn hex(bytes: &mut impl Iterator<Item = u8>, digits: usize) -> Option<u32> {
    let mut n = 0;
    for _ in 0..digits {
        let d = char::from(bytes.next()?).to_digit(16)?;
        n = n * 16 + d;
    }
    Some(n)
}
