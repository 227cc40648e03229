use crate::{Error, ErrorContext, Format, Result, Value, oid, truncate_long};
use atoi::FromRadix10SignedChecked;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use std::{any, str};
use time::{Date, PrimitiveDateTime, Time, macros::format_description};
use uuid::Uuid;

/// Decoding of a wire [`Value`] into a Rust value, used to read result fields.
///
/// Text values must be consumed entirely, `"12abc"` is not an integer. Binary numbers are
/// big-endian, integers may have any width among 1, 2, 4 and 8 bytes and are range checked
/// against the destination type. Decoding `NULL` fails unless the destination is an
/// `Option`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn data<T>(value: &Value) -> Result<&[u8]> {
    value.bytes().ok_or_else(|| {
        Error::msg(format!(
            "Unexpected NULL while decoding a {}",
            any::type_name::<T>()
        ))
    })
}

fn text<T>(value: &Value) -> Result<&str> {
    str::from_utf8(data::<T>(value)?).with_context(|| {
        format!(
            "Value is not valid UTF-8 while decoding a {}",
            any::type_name::<T>()
        )
    })
}

fn invalid<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot decode {} (type {}) as {}",
        truncate_long!(value.to_string()),
        value.type_id,
        any::type_name::<T>()
    ))
}

fn binary_integer<T>(value: &Value, data: &[u8]) -> Result<i64> {
    if oid::is_float(value.type_id) {
        return Err(invalid::<T>(value));
    }
    Ok(match data.len() {
        1 => data[0] as i8 as i64,
        2 => i16::from_be_bytes([data[0], data[1]]) as i64,
        4 => i32::from_be_bytes([data[0], data[1], data[2], data[3]]) as i64,
        8 => i64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]),
        _ => return Err(invalid::<T>(value)),
    })
}

fn binary_float<T>(value: &Value, data: &[u8]) -> Result<f64> {
    match (value.type_id, data.len()) {
        (oid::FLOAT4, 4) => Ok(f32::from_be_bytes([data[0], data[1], data[2], data[3]]) as f64),
        (oid::FLOAT8, 8) => Ok(f64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ])),
        _ if oid::is_integer(value.type_id) => Ok(binary_integer::<T>(value, data)? as f64),
        _ => Err(invalid::<T>(value)),
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

macro_rules! impl_from_value_integer {
    ($($target:ty),+ $(,)?) => {
        $(
            impl FromValue for $target {
                fn from_value(value: &Value) -> Result<Self> {
                    let data = data::<Self>(value)?;
                    match value.format {
                        Format::Text => {
                            let (result, used) = <$target>::from_radix_10_signed_checked(data);
                            if used == 0 || used != data.len() {
                                return Err(invalid::<Self>(value));
                            }
                            result.ok_or_else(|| {
                                Error::msg(format!(
                                    "Value {} is out of range for {}",
                                    value,
                                    any::type_name::<Self>()
                                ))
                            })
                        }
                        Format::Binary => {
                            let v = binary_integer::<Self>(value, data)?;
                            <$target>::try_from(v).map_err(|_| {
                                Error::msg(format!(
                                    "Value {} is out of range for {}",
                                    v,
                                    any::type_name::<Self>()
                                ))
                            })
                        }
                    }
                }
            }
        )+
    };
}
impl_from_value_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_from_value_float {
    ($($target:ty),+ $(,)?) => {
        $(
            impl FromValue for $target {
                fn from_value(value: &Value) -> Result<Self> {
                    let data = data::<Self>(value)?;
                    match value.format {
                        Format::Text => fast_float::parse::<$target, _>(data)
                            .map_err(|_| invalid::<Self>(value)),
                        Format::Binary => Ok(binary_float::<Self>(value, data)? as $target),
                    }
                }
            }
        )+
    };
}
impl_from_value_float!(f32, f64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        let data = data::<Self>(value)?;
        match value.format {
            Format::Text => match text::<Self>(value)?.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "y" | "yes" | "on" => Ok(true),
                "f" | "false" | "0" | "n" | "no" | "off" => Ok(false),
                _ => Err(invalid::<Self>(value)),
            },
            Format::Binary => Ok(binary_integer::<Self>(value, data)? != 0),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        let data = data::<Self>(value)?;
        match value.format {
            Format::Binary if oid::is_integer(value.type_id) => {
                let mut buffer = itoa::Buffer::new();
                Ok(buffer
                    .format(binary_integer::<Self>(value, data)?)
                    .to_owned())
            }
            Format::Binary if oid::is_float(value.type_id) => {
                let mut buffer = ryu::Buffer::new();
                Ok(buffer.format(binary_float::<Self>(value, data)?).to_owned())
            }
            Format::Binary if value.type_id == oid::BYTEA => Err(invalid::<Self>(value)),
            _ => Ok(text::<Self>(value)?.to_owned()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        let data = data::<Self>(value)?;
        match value.format {
            Format::Binary => Ok(data.to_vec()),
            Format::Text => match data.strip_prefix(b"\\x") {
                Some(encoded) => hex::decode(encoded)
                    .with_context(|| format!("Cannot decode {} as hex bytes", value)),
                None => Ok(data.to_vec()),
            },
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self> {
        let data = data::<Self>(value)?;
        match value.format {
            Format::Text => {
                let text = text::<Self>(value)?;
                text.parse::<Decimal>()
                    .or_else(|_| Decimal::from_scientific(text))
                    .map_err(|_| invalid::<Self>(value))
            }
            Format::Binary if oid::is_integer(value.type_id) => {
                Ok(Decimal::from(binary_integer::<Self>(value, data)?))
            }
            Format::Binary => Decimal::from_f64(binary_float::<Self>(value, data)?)
                .ok_or_else(|| invalid::<Self>(value)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self> {
        let data = data::<Self>(value)?;
        match value.format {
            Format::Text => {
                Uuid::parse_str(text::<Self>(value)?).map_err(|_| invalid::<Self>(value))
            }
            Format::Binary => Uuid::from_slice(data).map_err(|_| invalid::<Self>(value)),
        }
    }
}

impl FromValue for Date {
    fn from_value(value: &Value) -> Result<Self> {
        Date::parse(
            text::<Self>(value)?,
            format_description!("[year]-[month]-[day]"),
        )
        .map_err(|_| invalid::<Self>(value))
    }
}

impl FromValue for Time {
    fn from_value(value: &Value) -> Result<Self> {
        let text = text::<Self>(value)?;
        Time::parse(
            text,
            format_description!("[hour]:[minute]:[second].[subsecond]"),
        )
        .or_else(|_| Time::parse(text, format_description!("[hour]:[minute]:[second]")))
        .map_err(|_| invalid::<Self>(value))
    }
}

impl FromValue for PrimitiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        let text = text::<Self>(value)?;
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
        .or_else(|_| {
            PrimitiveDateTime::parse(
                text,
                format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
            )
        })
        .map_err(|_| invalid::<Self>(value))
    }
}
