use crate::{Format, Oid, Value, oid};
use rust_decimal::Decimal;
use std::borrow::Cow;
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Conversion of a Rust value into its wire representation, used to bind query parameters.
///
/// Numbers and temporal types are encoded in text format, byte buffers in binary format.
/// The trait is dyn compatible so that heterogeneous parameters can be passed as a slice:
///
/// ```rust,ignore
/// transaction.execute("INSERT INTO t VALUES ($1, $2)", &[&1, &"one"])?;
/// ```
pub trait AsValue {
    /// Encode `self`.
    fn as_value(&self) -> Value;
    /// Type identifier of the values produced by this type, used for `NULL`s of `Option<Self>`.
    fn type_oid() -> Oid
    where
        Self: Sized,
    {
        oid::UNKNOWN
    }
}

impl<T: AsValue + ?Sized> AsValue for &T {
    fn as_value(&self) -> Value {
        (**self).as_value()
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_value(&self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => Value::null(T::type_oid()),
        }
    }
    fn type_oid() -> Oid {
        T::type_oid()
    }
}

macro_rules! impl_as_value_integer {
    ($($source:ty => $oid:path),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_value(&self) -> Value {
                    let mut buffer = itoa::Buffer::new();
                    Value::text($oid, buffer.format(*self).as_bytes())
                }
                fn type_oid() -> Oid {
                    $oid
                }
            }
        )+
    };
}
impl_as_value_integer!(
    i8 => oid::INT2,
    i16 => oid::INT2,
    i32 => oid::INT4,
    i64 => oid::INT8,
    u8 => oid::INT2,
    u16 => oid::INT4,
    u32 => oid::INT8,
);

macro_rules! impl_as_value_float {
    ($($source:ty => $oid:path),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_value(&self) -> Value {
                    let v = *self;
                    if v.is_nan() {
                        Value::text($oid, "NaN")
                    } else if v.is_infinite() {
                        Value::text($oid, if v < 0.0 { "-Infinity" } else { "Infinity" })
                    } else {
                        let mut buffer = ryu::Buffer::new();
                        Value::text($oid, buffer.format_finite(v).as_bytes())
                    }
                }
                fn type_oid() -> Oid {
                    $oid
                }
            }
        )+
    };
}
impl_as_value_float!(f32 => oid::FLOAT4, f64 => oid::FLOAT8);

impl AsValue for bool {
    fn as_value(&self) -> Value {
        Value::text(oid::BOOL, if *self { "t" } else { "f" })
    }
    fn type_oid() -> Oid {
        oid::BOOL
    }
}

impl AsValue for str {
    fn as_value(&self) -> Value {
        Value::text(oid::TEXT, self.as_bytes())
    }
}

impl AsValue for String {
    fn as_value(&self) -> Value {
        self.as_str().as_value()
    }
    fn type_oid() -> Oid {
        oid::TEXT
    }
}

impl AsValue for Cow<'_, str> {
    fn as_value(&self) -> Value {
        self.as_ref().as_value()
    }
    fn type_oid() -> Oid {
        oid::TEXT
    }
}

impl AsValue for [u8] {
    fn as_value(&self) -> Value {
        Value::new(oid::BYTEA, Format::Binary, Some(self.to_vec()))
    }
}

impl AsValue for Vec<u8> {
    fn as_value(&self) -> Value {
        self.as_slice().as_value()
    }
    fn type_oid() -> Oid {
        oid::BYTEA
    }
}

impl AsValue for Decimal {
    fn as_value(&self) -> Value {
        Value::text(oid::NUMERIC, self.to_string())
    }
    fn type_oid() -> Oid {
        oid::NUMERIC
    }
}

impl AsValue for Uuid {
    fn as_value(&self) -> Value {
        Value::text(oid::UUID, self.hyphenated().to_string())
    }
    fn type_oid() -> Oid {
        oid::UUID
    }
}

fn write_date(out: &mut String, date: &Date) {
    out.push_str(&format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    ));
}

fn write_time(out: &mut String, time: &Time) {
    out.push_str(&format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    ));
    if time.microsecond() != 0 {
        out.push_str(&format!(".{:06}", time.microsecond()));
    }
}

impl AsValue for Date {
    fn as_value(&self) -> Value {
        let mut out = String::with_capacity(10);
        write_date(&mut out, self);
        Value::text(oid::DATE, out)
    }
    fn type_oid() -> Oid {
        oid::DATE
    }
}

impl AsValue for Time {
    fn as_value(&self) -> Value {
        let mut out = String::with_capacity(15);
        write_time(&mut out, self);
        Value::text(oid::TIME, out)
    }
    fn type_oid() -> Oid {
        oid::TIME
    }
}

impl AsValue for PrimitiveDateTime {
    fn as_value(&self) -> Value {
        let mut out = String::with_capacity(26);
        write_date(&mut out, &self.date());
        out.push(' ');
        write_time(&mut out, &self.time());
        Value::text(oid::TIMESTAMP, out)
    }
    fn type_oid() -> Oid {
        oid::TIMESTAMP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    fn text(value: &dyn AsValue) -> String {
        String::from_utf8(value.as_value().data.expect("Expected a non null value"))
            .expect("Expected UTF-8")
    }

    #[test]
    fn numbers() {
        assert_eq!(text(&42i32), "42");
        assert_eq!(text(&-7i64), "-7");
        assert_eq!(42i32.as_value().type_id, oid::INT4);
        assert_eq!(text(&1.5f64), "1.5");
        assert_eq!(text(&f64::NAN), "NaN");
        assert_eq!(text(&f32::NEG_INFINITY), "-Infinity");
        assert_eq!(text(&true), "t");
    }

    #[test]
    fn nulls_keep_the_type() {
        let value = None::<i64>.as_value();
        assert!(value.is_null());
        assert_eq!(value.type_id, oid::INT8);
        assert_eq!(value.len(), 0);
        assert_eq!(Some(3i16).as_value(), 3i16.as_value());
    }

    #[test]
    fn bytes_are_binary() {
        let value = vec![0u8, 255].as_value();
        assert_eq!(value.format, Format::Binary);
        assert_eq!(value.type_id, oid::BYTEA);
        assert_eq!(value.len(), 2);
    }

    #[test]
    fn temporal() {
        assert_eq!(text(&date!(2024 - 02 - 29)), "2024-02-29");
        assert_eq!(text(&time!(7:05:09)), "07:05:09");
        assert_eq!(text(&time!(7:05:09.25)), "07:05:09.250000");
        assert_eq!(
            text(&datetime!(1999-12-31 23:59:59)),
            "1999-12-31 23:59:59"
        );
    }

    #[test]
    fn heterogeneous_slice() {
        let params: &[&dyn AsValue] = &[&1, &"two", &Some(3.0f32), &None::<String>];
        let values = params.iter().map(|v| v.as_value()).collect::<Vec<_>>();
        assert_eq!(values[1].type_id, oid::TEXT);
        assert_eq!(values[3].type_id, oid::TEXT);
        assert!(values[3].is_null());
    }
}
