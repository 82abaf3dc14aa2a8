//! Row decoding: text protocol and binary protocol, typed by column
//! metadata.

use mysql_wire::column::{ColumnDefinition, ColumnType};
use mysql_wire::io::PayloadReader;

use crate::error::{Result, TypeError};
use crate::guid::{GuidFormat, decode_guid};
use crate::value::{Date, DateTime, Time, Value};

/// Options that influence how raw column bytes become [`Value`]s.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Return zero dates (`0000-00-00`) as values instead of erroring.
    pub allow_zero_datetime: bool,
    /// Convert zero dates to the minimum valid date instead of erroring.
    pub convert_zero_datetime: bool,
    /// How GUID-shaped columns are interpreted.
    pub guid_format: GuidFormat,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            allow_zero_datetime: false,
            convert_zero_datetime: false,
            guid_format: GuidFormat::Char36,
        }
    }
}

impl DecodeOptions {
    fn settle_datetime(&self, dt: DateTime) -> Result<Value> {
        if dt.date.is_zero() {
            if self.convert_zero_datetime {
                return Ok(Value::DateTime(DateTime {
                    date: Date {
                        year: 1,
                        month: 1,
                        day: 1,
                    },
                    ..DateTime::default()
                }));
            }
            if !self.allow_zero_datetime {
                return Err(TypeError::ZeroDateTime);
            }
        }
        Ok(Value::DateTime(dt))
    }

    fn settle_date(&self, date: Date) -> Result<Value> {
        if date.is_zero() {
            if self.convert_zero_datetime {
                return Ok(Value::Date(Date {
                    year: 1,
                    month: 1,
                    day: 1,
                }));
            }
            if !self.allow_zero_datetime {
                return Err(TypeError::ZeroDateTime);
            }
        }
        Ok(Value::Date(date))
    }
}

fn parse_int(text: &str, unsigned: bool) -> Result<Value> {
    if unsigned {
        text.parse::<u64>()
            .map(Value::UInt)
            .map_err(|_| TypeError::InvalidText {
                text: text.to_owned(),
                ty: "unsigned integer",
            })
    } else {
        text.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| TypeError::InvalidText {
                text: text.to_owned(),
                ty: "integer",
            })
    }
}

fn parse_date(text: &str) -> Result<Date> {
    let mut parts = text.splitn(3, '-');
    let invalid = || TypeError::InvalidText {
        text: text.to_owned(),
        ty: "DATE",
    };
    let year = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let month = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let day = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    Ok(Date { year, month, day })
}

fn parse_micros(frac: &str) -> u32 {
    // ".42" means 420000 microseconds: right-pad to 6 digits.
    let digits: String = frac.chars().take(6).collect();
    let padded = format!("{digits:0<6}");
    padded.parse().unwrap_or(0)
}

fn parse_datetime(text: &str) -> Result<DateTime> {
    let invalid = || TypeError::InvalidText {
        text: text.to_owned(),
        ty: "DATETIME",
    };
    let (date_part, time_part) = text.split_once(' ').ok_or_else(invalid)?;
    let date = parse_date(date_part)?;

    let (hms, frac) = match time_part.split_once('.') {
        Some((hms, frac)) => (hms, Some(frac)),
        None => (time_part, None),
    };
    let mut parts = hms.splitn(3, ':');
    let hour = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let minute = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let second = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

    Ok(DateTime {
        date,
        hour,
        minute,
        second,
        micros: frac.map(parse_micros).unwrap_or(0),
    })
}

fn parse_time(text: &str) -> Result<Time> {
    let invalid = || TypeError::InvalidText {
        text: text.to_owned(),
        ty: "TIME",
    };

    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (hms, frac) = match rest.split_once('.') {
        Some((hms, frac)) => (hms, Some(frac)),
        None => (rest, None),
    };
    let mut parts = hms.splitn(3, ':');
    let total_hours: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let minutes = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let seconds = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

    Ok(Time {
        negative,
        days: total_hours / 24,
        hours: (total_hours % 24) as u8,
        minutes,
        seconds,
        micros: frac.map(parse_micros).unwrap_or(0),
    })
}

/// Decode one text-protocol cell.
///
/// `raw` is `None` for the NULL marker.
pub fn decode_text_value(
    raw: Option<&[u8]>,
    column: &ColumnDefinition,
    opts: &DecodeOptions,
) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };

    if let Some(guid) = decode_guid(raw, column, opts.guid_format)? {
        return Ok(Value::Uuid(guid));
    }

    match column.column_type {
        ColumnType::Tiny
        | ColumnType::Short
        | ColumnType::Int24
        | ColumnType::Long
        | ColumnType::LongLong
        | ColumnType::Year => {
            let text = std::str::from_utf8(raw).map_err(|_| TypeError::InvalidText {
                text: String::from_utf8_lossy(raw).into_owned(),
                ty: "integer",
            })?;
            parse_int(text, column.is_unsigned())
        }
        ColumnType::Float | ColumnType::Double => {
            let text = std::str::from_utf8(raw).map_err(|_| TypeError::InvalidText {
                text: String::from_utf8_lossy(raw).into_owned(),
                ty: "float",
            })?;
            let parsed: f64 = text.parse().map_err(|_| TypeError::InvalidText {
                text: text.to_owned(),
                ty: "float",
            })?;
            if column.column_type == ColumnType::Float {
                Ok(Value::Float(parsed as f32))
            } else {
                Ok(Value::Double(parsed))
            }
        }
        ColumnType::Decimal | ColumnType::NewDecimal => {
            Ok(Value::Decimal(String::from_utf8_lossy(raw).into_owned()))
        }
        ColumnType::Date | ColumnType::NewDate => {
            let text = String::from_utf8_lossy(raw);
            opts.settle_date(parse_date(&text)?)
        }
        ColumnType::DateTime | ColumnType::Timestamp => {
            let text = String::from_utf8_lossy(raw);
            opts.settle_datetime(parse_datetime(&text)?)
        }
        ColumnType::Time => {
            let text = String::from_utf8_lossy(raw);
            Ok(Value::Time(parse_time(&text)?))
        }
        ColumnType::Json => Ok(Value::Json(String::from_utf8_lossy(raw).into_owned())),
        ColumnType::Bit => Ok(Value::Bit(raw.to_vec())),
        ColumnType::Null => Ok(Value::Null),
        _ => Ok(Value::Bytes(raw.to_vec())),
    }
}

/// Decode a full text-protocol row: one length-encoded string per column.
pub fn decode_text_row(
    payload: &[u8],
    columns: &[ColumnDefinition],
    opts: &DecodeOptions,
) -> Result<Vec<Value>> {
    let mut reader = PayloadReader::new(payload);
    let mut values = Vec::with_capacity(columns.len());

    for column in columns {
        let raw = match reader
            .read_lenenc_or_null("text row cell")
            .map_err(|_| TypeError::InvalidBinary {
                ty: "text row",
                detail: "truncated cell",
            })? {
            None => None,
            Some(len) => Some(
                reader
                    .read_bytes(len as usize, "text row cell bytes")
                    .map_err(|_| TypeError::InvalidBinary {
                        ty: "text row",
                        detail: "truncated cell bytes",
                    })?,
            ),
        };
        values.push(decode_text_value(raw, column, opts)?);
    }

    Ok(values)
}

fn binary_temporal_datetime(reader: &mut PayloadReader<'_>) -> Result<DateTime> {
    let truncated = || TypeError::InvalidBinary {
        ty: "DATETIME",
        detail: "truncated temporal value",
    };
    let len = reader.read_u8("datetime length").map_err(|_| truncated())?;
    let mut dt = DateTime::default();

    if len >= 4 {
        dt.date.year = reader.read_u16_le("datetime year").map_err(|_| truncated())?;
        dt.date.month = reader.read_u8("datetime month").map_err(|_| truncated())?;
        dt.date.day = reader.read_u8("datetime day").map_err(|_| truncated())?;
    }
    if len >= 7 {
        dt.hour = reader.read_u8("datetime hour").map_err(|_| truncated())?;
        dt.minute = reader.read_u8("datetime minute").map_err(|_| truncated())?;
        dt.second = reader.read_u8("datetime second").map_err(|_| truncated())?;
    }
    if len >= 11 {
        dt.micros = reader
            .read_u32_le("datetime micros")
            .map_err(|_| truncated())?;
    }
    if !matches!(len, 0 | 4 | 7 | 11) {
        return Err(TypeError::InvalidBinary {
            ty: "DATETIME",
            detail: "length byte must be 0, 4, 7 or 11",
        });
    }
    Ok(dt)
}

fn binary_temporal_time(reader: &mut PayloadReader<'_>) -> Result<Time> {
    let truncated = || TypeError::InvalidBinary {
        ty: "TIME",
        detail: "truncated temporal value",
    };
    let len = reader.read_u8("time length").map_err(|_| truncated())?;
    let mut time = Time::default();

    if len >= 8 {
        time.negative = reader.read_u8("time sign").map_err(|_| truncated())? != 0;
        time.days = reader.read_u32_le("time days").map_err(|_| truncated())?;
        time.hours = reader.read_u8("time hours").map_err(|_| truncated())?;
        time.minutes = reader.read_u8("time minutes").map_err(|_| truncated())?;
        time.seconds = reader.read_u8("time seconds").map_err(|_| truncated())?;
    }
    if len >= 12 {
        time.micros = reader.read_u32_le("time micros").map_err(|_| truncated())?;
    }
    if !matches!(len, 0 | 8 | 12) {
        return Err(TypeError::InvalidBinary {
            ty: "TIME",
            detail: "length byte must be 0, 8 or 12",
        });
    }
    Ok(time)
}

/// Decode a binary-protocol row.
///
/// Layout: `0x00` header, null bitmap with a 2-bit offset, then values
/// for every non-null column in definition order.
pub fn decode_binary_row(
    payload: &[u8],
    columns: &[ColumnDefinition],
    opts: &DecodeOptions,
) -> Result<Vec<Value>> {
    let malformed = |detail: &'static str| TypeError::InvalidBinary {
        ty: "binary row",
        detail,
    };

    let mut reader = PayloadReader::new(payload);
    if reader.read_u8("binary row header").map_err(|_| malformed("empty payload"))? != 0x00 {
        return Err(malformed("header byte is not 0x00"));
    }

    let bitmap_len = (columns.len() + 7 + 2) / 8;
    let bitmap = reader
        .read_bytes(bitmap_len, "binary row null bitmap")
        .map_err(|_| malformed("truncated null bitmap"))?
        .to_vec();

    let is_null = |index: usize| {
        let bit = index + 2;
        bitmap[bit / 8] & (1 << (bit % 8)) != 0
    };

    let mut values = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        if is_null(i) {
            values.push(Value::Null);
            continue;
        }
        values.push(decode_binary_value(&mut reader, column, opts)?);
    }

    Ok(values)
}

/// Decode one binary-protocol value at the reader's position.
pub fn decode_binary_value(
    reader: &mut PayloadReader<'_>,
    column: &ColumnDefinition,
    opts: &DecodeOptions,
) -> Result<Value> {
    let truncated = || TypeError::InvalidBinary {
        ty: "binary row",
        detail: "truncated value",
    };
    let unsigned = column.is_unsigned();

    match column.column_type {
        ColumnType::Tiny => {
            let v = reader.read_u8("tiny value").map_err(|_| truncated())?;
            Ok(if unsigned {
                Value::UInt(u64::from(v))
            } else {
                Value::Int(i64::from(v as i8))
            })
        }
        ColumnType::Short | ColumnType::Year => {
            let v = reader.read_u16_le("short value").map_err(|_| truncated())?;
            Ok(if unsigned {
                Value::UInt(u64::from(v))
            } else {
                Value::Int(i64::from(v as i16))
            })
        }
        ColumnType::Long | ColumnType::Int24 => {
            let v = reader.read_u32_le("long value").map_err(|_| truncated())?;
            Ok(if unsigned {
                Value::UInt(u64::from(v))
            } else {
                Value::Int(i64::from(v as i32))
            })
        }
        ColumnType::LongLong => {
            let v = reader.read_u64_le("longlong value").map_err(|_| truncated())?;
            Ok(if unsigned {
                Value::UInt(v)
            } else {
                Value::Int(v as i64)
            })
        }
        ColumnType::Float => {
            let bits = reader.read_u32_le("float value").map_err(|_| truncated())?;
            Ok(Value::Float(f32::from_bits(bits)))
        }
        ColumnType::Double => {
            let bits = reader.read_u64_le("double value").map_err(|_| truncated())?;
            Ok(Value::Double(f64::from_bits(bits)))
        }
        ColumnType::Date | ColumnType::NewDate => {
            let dt = binary_temporal_datetime(reader)?;
            opts.settle_date(dt.date)
        }
        ColumnType::DateTime | ColumnType::Timestamp => {
            let dt = binary_temporal_datetime(reader)?;
            opts.settle_datetime(dt)
        }
        ColumnType::Time => Ok(Value::Time(binary_temporal_time(reader)?)),
        ColumnType::Null => Ok(Value::Null),
        // The whole length-encoded family: decimals, strings, blobs,
        // JSON, BIT, ENUM, SET, GEOMETRY.
        _ => {
            let raw = reader
                .read_lenenc_bytes("binary row bytes value")
                .map_err(|_| truncated())?;

            if let Some(guid) = decode_guid(raw, column, opts.guid_format)? {
                return Ok(Value::Uuid(guid));
            }

            Ok(match column.column_type {
                ColumnType::Decimal | ColumnType::NewDecimal => {
                    Value::Decimal(String::from_utf8_lossy(raw).into_owned())
                }
                ColumnType::Json => Value::Json(String::from_utf8_lossy(raw).into_owned()),
                ColumnType::Bit => Value::Bit(raw.to_vec()),
                _ => Value::Bytes(raw.to_vec()),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mysql_wire::column::ColumnFlags;
    use mysql_wire::io::PayloadWriter;

    fn column(ty: ColumnType, flags: ColumnFlags, length: u32) -> ColumnDefinition {
        ColumnDefinition {
            catalog: "def".into(),
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: "c".into(),
            org_name: "c".into(),
            charset: 63,
            length,
            column_type: ty,
            flags,
            decimals: 0,
        }
    }

    fn opts() -> DecodeOptions {
        DecodeOptions {
            guid_format: GuidFormat::None,
            ..DecodeOptions::default()
        }
    }

    #[test]
    fn test_text_signed_and_unsigned() {
        let signed = column(ColumnType::Long, ColumnFlags::empty(), 11);
        assert_eq!(
            decode_text_value(Some(b"-42"), &signed, &opts()).unwrap(),
            Value::Int(-42)
        );

        let unsigned = column(ColumnType::LongLong, ColumnFlags::UNSIGNED, 20);
        assert_eq!(
            decode_text_value(Some(b"18446744073709551615"), &unsigned, &opts()).unwrap(),
            Value::UInt(u64::MAX)
        );
    }

    #[test]
    fn test_text_null() {
        let col = column(ColumnType::Long, ColumnFlags::empty(), 11);
        assert_eq!(decode_text_value(None, &col, &opts()).unwrap(), Value::Null);
    }

    #[test]
    fn test_text_temporal() {
        let col = column(ColumnType::DateTime, ColumnFlags::empty(), 26);
        let value =
            decode_text_value(Some(b"2024-03-01 12:34:56.250000"), &col, &opts()).unwrap();
        assert_eq!(
            value,
            Value::DateTime(DateTime {
                date: Date {
                    year: 2024,
                    month: 3,
                    day: 1
                },
                hour: 12,
                minute: 34,
                second: 56,
                micros: 250_000,
            })
        );
    }

    #[test]
    fn test_text_negative_time() {
        let col = column(ColumnType::Time, ColumnFlags::empty(), 10);
        let value = decode_text_value(Some(b"-34:05:06"), &col, &opts()).unwrap();
        assert_eq!(
            value,
            Value::Time(Time {
                negative: true,
                days: 1,
                hours: 10,
                minutes: 5,
                seconds: 6,
                micros: 0,
            })
        );
    }

    #[test]
    fn test_zero_datetime_policy() {
        let col = column(ColumnType::Date, ColumnFlags::empty(), 10);

        assert!(matches!(
            decode_text_value(Some(b"0000-00-00"), &col, &opts()),
            Err(TypeError::ZeroDateTime)
        ));

        let allow = DecodeOptions {
            allow_zero_datetime: true,
            ..opts()
        };
        assert_eq!(
            decode_text_value(Some(b"0000-00-00"), &col, &allow).unwrap(),
            Value::Date(Date::default())
        );

        let convert = DecodeOptions {
            convert_zero_datetime: true,
            ..opts()
        };
        assert_eq!(
            decode_text_value(Some(b"0000-00-00"), &col, &convert).unwrap(),
            Value::Date(Date {
                year: 1,
                month: 1,
                day: 1
            })
        );
    }

    fn binary_row_payload(build: impl FnOnce(&mut PayloadWriter)) -> Vec<u8> {
        let mut w = PayloadWriter::new();
        build(&mut w);
        w.freeze().to_vec()
    }

    #[test]
    fn test_binary_row_roundtrip() {
        let columns = vec![
            column(ColumnType::Long, ColumnFlags::empty(), 11),
            column(ColumnType::VarString, ColumnFlags::empty(), 255),
            column(ColumnType::Double, ColumnFlags::empty(), 22),
        ];

        let payload = binary_row_payload(|w| {
            w.write_u8(0x00);
            w.write_u8(0x00); // null bitmap, one byte for 3 columns
            w.write_u32_le(7);
            w.write_lenenc_bytes(b"hello");
            w.write_u64_le(2.5f64.to_bits());
        });

        let row = decode_binary_row(&payload, &columns, &opts()).unwrap();
        assert_eq!(
            row,
            vec![
                Value::Int(7),
                Value::Bytes(b"hello".to_vec()),
                Value::Double(2.5)
            ]
        );
    }

    #[test]
    fn test_binary_row_null_bitmap() {
        let columns = vec![
            column(ColumnType::Long, ColumnFlags::empty(), 11),
            column(ColumnType::Long, ColumnFlags::empty(), 11),
        ];

        // Second column NULL: bit index 3 in the bitmap byte.
        let payload = binary_row_payload(|w| {
            w.write_u8(0x00);
            w.write_u8(1 << 3);
            w.write_u32_le(1);
        });

        let row = decode_binary_row(&payload, &columns, &opts()).unwrap();
        assert_eq!(row, vec![Value::Int(1), Value::Null]);
    }

    #[test]
    fn test_binary_temporal_lengths() {
        let col = column(ColumnType::DateTime, ColumnFlags::empty(), 19);

        // Length 7: date + time, no micros.
        let payload = binary_row_payload(|w| {
            w.write_u8(0x00);
            w.write_u8(0x00);
            w.write_u8(7);
            w.write_u16_le(2024);
            w.write_u8(12);
            w.write_u8(31);
            w.write_u8(23);
            w.write_u8(59);
            w.write_u8(58);
        });
        let row = decode_binary_row(&payload, std::slice::from_ref(&col), &opts()).unwrap();
        match &row[0] {
            Value::DateTime(dt) => {
                assert_eq!(dt.date.year, 2024);
                assert_eq!(dt.second, 58);
                assert_eq!(dt.micros, 0);
            }
            other => panic!("expected datetime, got {other:?}"),
        }

        // Length 0: zero datetime.
        let payload = binary_row_payload(|w| {
            w.write_u8(0x00);
            w.write_u8(0x00);
            w.write_u8(0);
        });
        assert!(matches!(
            decode_binary_row(&payload, std::slice::from_ref(&col), &opts()),
            Err(TypeError::ZeroDateTime)
        ));
    }

    #[test]
    fn test_binary_time_with_micros() {
        let col = column(ColumnType::Time, ColumnFlags::empty(), 10);
        let payload = binary_row_payload(|w| {
            w.write_u8(0x00);
            w.write_u8(0x00);
            w.write_u8(12);
            w.write_u8(1); // negative
            w.write_u32_le(2); // days
            w.write_u8(3);
            w.write_u8(4);
            w.write_u8(5);
            w.write_u32_le(600_000);
        });
        let row = decode_binary_row(&payload, std::slice::from_ref(&col), &opts()).unwrap();
        assert_eq!(
            row[0],
            Value::Time(Time {
                negative: true,
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5,
                micros: 600_000,
            })
        );
    }

    #[test]
    fn test_text_and_binary_agree() {
        // The same server value decoded through both protocols must match.
        let int_col = column(ColumnType::Long, ColumnFlags::empty(), 11);
        let text = decode_text_value(Some(b"-12345"), &int_col, &opts()).unwrap();

        let payload = binary_row_payload(|w| {
            w.write_u8(0x00);
            w.write_u8(0x00);
            w.write_u32_le((-12345i32) as u32);
        });
        let binary = decode_binary_row(&payload, std::slice::from_ref(&int_col), &opts()).unwrap();
        assert_eq!(text, binary[0]);
    }
}
