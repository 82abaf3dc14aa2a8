//! Binary-protocol parameter encoding for `COM_STMT_EXECUTE`.

use mysql_wire::column::ColumnType;
use mysql_wire::io::PayloadWriter;

use crate::value::{DateTime, Time, Value};

/// Flag bit marking a parameter type as unsigned.
pub const UNSIGNED_FLAG: u8 = 0x80;

/// The two type bytes (type code, flags) for a bound parameter.
#[must_use]
pub fn param_type_bytes(value: &Value) -> [u8; 2] {
    match value {
        Value::Null => [ColumnType::Null as u8, 0],
        Value::Int(_) => [ColumnType::LongLong as u8, 0],
        Value::UInt(_) => [ColumnType::LongLong as u8, UNSIGNED_FLAG],
        Value::Float(_) => [ColumnType::Float as u8, 0],
        Value::Double(_) => [ColumnType::Double as u8, 0],
        Value::Decimal(_) => [ColumnType::NewDecimal as u8, 0],
        Value::Date(_) => [ColumnType::Date as u8, 0],
        Value::DateTime(_) => [ColumnType::DateTime as u8, 0],
        Value::Time(_) => [ColumnType::Time as u8, 0],
        Value::Json(_) | Value::Bytes(_) | Value::Bit(_) | Value::Uuid(_) => {
            [ColumnType::VarString as u8, 0]
        }
    }
}

fn encode_datetime(w: &mut PayloadWriter, dt: &DateTime) {
    let length = if dt.micros > 0 {
        11
    } else if dt.hour > 0 || dt.minute > 0 || dt.second > 0 {
        7
    } else if !dt.date.is_zero() {
        4
    } else {
        0
    };

    w.write_u8(length);
    if length >= 4 {
        w.write_u16_le(dt.date.year);
        w.write_u8(dt.date.month);
        w.write_u8(dt.date.day);
    }
    if length >= 7 {
        w.write_u8(dt.hour);
        w.write_u8(dt.minute);
        w.write_u8(dt.second);
    }
    if length >= 11 {
        w.write_u32_le(dt.micros);
    }
}

fn encode_time(w: &mut PayloadWriter, time: &Time) {
    let is_zero = !time.negative
        && time.days == 0
        && time.hours == 0
        && time.minutes == 0
        && time.seconds == 0
        && time.micros == 0;

    let length = if time.micros > 0 {
        12
    } else if !is_zero {
        8
    } else {
        0
    };

    w.write_u8(length);
    if length >= 8 {
        w.write_u8(u8::from(time.negative));
        w.write_u32_le(time.days);
        w.write_u8(time.hours);
        w.write_u8(time.minutes);
        w.write_u8(time.seconds);
    }
    if length >= 12 {
        w.write_u32_le(time.micros);
    }
}

/// Append the binary form of a parameter value.
///
/// NULL parameters contribute nothing here; they are carried entirely by
/// the null bitmap.
pub fn encode_param_value(w: &mut PayloadWriter, value: &Value) {
    match value {
        Value::Null => {}
        Value::Int(v) => w.write_u64_le(*v as u64),
        Value::UInt(v) => w.write_u64_le(*v),
        Value::Float(v) => w.write_u32_le(v.to_bits()),
        Value::Double(v) => w.write_u64_le(v.to_bits()),
        Value::Bytes(b) | Value::Bit(b) => w.write_lenenc_bytes(b),
        Value::Decimal(s) | Value::Json(s) => w.write_lenenc_str(s),
        Value::Date(d) => encode_datetime(
            w,
            &DateTime {
                date: *d,
                ..DateTime::default()
            },
        ),
        Value::DateTime(dt) => encode_datetime(w, dt),
        Value::Time(t) => encode_time(w, t),
        Value::Uuid(u) => {
            let mut buf = uuid::Uuid::encode_buffer();
            let text = u.hyphenated().encode_lower(&mut buf);
            w.write_lenenc_str(text);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::value::Date;

    fn encoded(value: &Value) -> Vec<u8> {
        let mut w = PayloadWriter::new();
        encode_param_value(&mut w, value);
        w.freeze().to_vec()
    }

    #[test]
    fn test_type_bytes() {
        assert_eq!(param_type_bytes(&Value::Int(1)), [0x08, 0x00]);
        assert_eq!(param_type_bytes(&Value::UInt(1)), [0x08, 0x80]);
        assert_eq!(param_type_bytes(&Value::Null), [0x06, 0x00]);
        assert_eq!(param_type_bytes(&Value::from("x")), [0xFD, 0x00]);
    }

    #[test]
    fn test_null_encodes_nothing() {
        assert!(encoded(&Value::Null).is_empty());
    }

    #[test]
    fn test_int_encoding() {
        assert_eq!(encoded(&Value::Int(-2)), (-2i64).to_le_bytes().to_vec());
    }

    #[test]
    fn test_string_encoding() {
        assert_eq!(encoded(&Value::from("hi")), vec![0x02, b'h', b'i']);
    }

    #[test]
    fn test_datetime_minimal_lengths() {
        let zero = Value::DateTime(DateTime::default());
        assert_eq!(encoded(&zero), vec![0]);

        let date_only = Value::DateTime(DateTime {
            date: Date {
                year: 2024,
                month: 5,
                day: 6,
            },
            ..DateTime::default()
        });
        let bytes = encoded(&date_only);
        assert_eq!(bytes[0], 4);
        assert_eq!(bytes.len(), 5);

        let with_micros = Value::DateTime(DateTime {
            date: Date {
                year: 2024,
                month: 5,
                day: 6,
            },
            hour: 1,
            minute: 2,
            second: 3,
            micros: 7,
        });
        let bytes = encoded(&with_micros);
        assert_eq!(bytes[0], 11);
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn test_time_encoding() {
        let time = Value::Time(Time {
            negative: true,
            days: 1,
            hours: 2,
            minutes: 3,
            seconds: 4,
            micros: 0,
        });
        let bytes = encoded(&time);
        assert_eq!(bytes[0], 8);
        assert_eq!(bytes[1], 1); // negative
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn test_uuid_encodes_as_text() {
        let uuid = uuid::Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let bytes = encoded(&Value::Uuid(uuid));
        assert_eq!(bytes[0], 36);
        assert_eq!(&bytes[1..], b"00112233-4455-6677-8899-aabbccddeeff");
    }
}
