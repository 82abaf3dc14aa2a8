//! Trait for converting decoded values into Rust types.

use uuid::Uuid;

use crate::error::TypeError;
use crate::value::{Date, DateTime, Time, Value};

/// Types that can be extracted from a decoded [`Value`].
pub trait FromValue: Sized {
    /// Convert from a value, failing with a conversion error (never a
    /// protocol error) on mismatch.
    fn from_value(value: &Value) -> Result<Self, TypeError>;
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, TypeError> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(*v)
                            .map_err(|_| TypeError::OutOfRange { target: stringify!($ty) }),
                        Value::UInt(v) => <$ty>::try_from(*v)
                            .map_err(|_| TypeError::OutOfRange { target: stringify!($ty) }),
                        Value::Null => Err(TypeError::UnexpectedNull),
                        other => Err(TypeError::TypeMismatch {
                            expected: stringify!($ty),
                            actual: other.type_name(),
                        }),
                    }
                }
            }
        )*
    };
}

int_from_value!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Int(v) => Ok(*v != 0),
            Value::UInt(v) => Ok(*v != 0),
            Value::Bit(bits) => Ok(bits.iter().any(|b| *b != 0)),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "bool",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "f32",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Double(v) => Ok(*v),
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "f64",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| TypeError::TypeMismatch {
                expected: "utf-8 string",
                actual: "BYTES",
            }),
            Value::Json(s) | Value::Decimal(s) => Ok(s.clone()),
            Value::Uuid(u) => Ok(u.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "String",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Bytes(b) | Value::Bit(b) => Ok(b.clone()),
            Value::Json(s) | Value::Decimal(s) => Ok(s.clone().into_bytes()),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "Vec<u8>",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Bytes(b) => {
                if let Ok(text) = std::str::from_utf8(b) {
                    if let Ok(parsed) = Uuid::parse_str(text) {
                        return Ok(parsed);
                    }
                }
                let bytes: [u8; 16] = b
                    .as_slice()
                    .try_into()
                    .map_err(|_| TypeError::InvalidGuid("neither text nor 16 bytes".into()))?;
                Ok(Uuid::from_bytes(bytes))
            }
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "Uuid",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Date {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "Date",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for DateTime {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => Ok(DateTime {
                date: *d,
                ..DateTime::default()
            }),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "DateTime",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Time {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "Time",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for chrono::NaiveDate {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        let date = Date::from_value(value)?;
        chrono::NaiveDate::from_ymd_opt(
            i32::from(date.year),
            u32::from(date.month),
            u32::from(date.day),
        )
        .ok_or(TypeError::OutOfRange {
            target: "chrono::NaiveDate",
        })
    }
}

impl FromValue for chrono::NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        let dt = DateTime::from_value(value)?;
        let date = chrono::NaiveDate::from_ymd_opt(
            i32::from(dt.date.year),
            u32::from(dt.date.month),
            u32::from(dt.date.day),
        )
        .ok_or(TypeError::OutOfRange {
            target: "chrono::NaiveDateTime",
        })?;
        date.and_hms_micro_opt(
            u32::from(dt.hour),
            u32::from(dt.minute),
            u32::from(dt.second),
            dt.micros,
        )
        .ok_or(TypeError::OutOfRange {
            target: "chrono::NaiveDateTime",
        })
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_int_conversions() {
        assert_eq!(i32::from_value(&Value::Int(42)).unwrap(), 42);
        assert_eq!(u8::from_value(&Value::UInt(255)).unwrap(), 255);
        assert!(matches!(
            u8::from_value(&Value::Int(256)),
            Err(TypeError::OutOfRange { .. })
        ));
        assert!(matches!(
            i64::from_value(&Value::Null),
            Err(TypeError::UnexpectedNull)
        ));
    }

    #[test]
    fn test_option_absorbs_null() {
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::from_value(&Value::Int(1)).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(
            String::from_value(&Value::from("abc")).unwrap(),
            "abc".to_string()
        );
        assert!(String::from_value(&Value::Bytes(vec![0xFF])).is_err());
    }

    #[test]
    fn test_chrono_conversion() {
        let value = Value::DateTime(DateTime {
            date: Date {
                year: 2024,
                month: 2,
                day: 29,
            },
            hour: 6,
            minute: 30,
            second: 0,
            micros: 0,
        });
        let dt = chrono::NaiveDateTime::from_value(&value).unwrap();
        assert_eq!(dt.to_string(), "2024-02-29 06:30:00");
    }

    #[test]
    fn test_chrono_rejects_zero_date() {
        let value = Value::Date(Date::default());
        assert!(chrono::NaiveDate::from_value(&value).is_err());
    }

    #[test]
    fn test_uuid_from_bytes() {
        let canonical = "00112233-4455-6677-8899-aabbccddeeff";
        let value = Value::Bytes(canonical.as_bytes().to_vec());
        assert_eq!(Uuid::from_value(&value).unwrap().to_string(), canonical);
    }

    #[test]
    fn test_conversion_mismatch_reports_types() {
        let err = i32::from_value(&Value::from("text")).unwrap_err();
        assert!(matches!(err, TypeError::TypeMismatch { expected: "i32", .. }));
    }
}
