//! GUID column interpretation.
//!
//! MySQL has no native GUID type; drivers conventionally map CHAR(36)
//! or BINARY(16) columns. The mapping is configurable because BINARY(16)
//! storage has three byte orders in the wild.

use mysql_wire::column::{ColumnDefinition, ColumnFlags, ColumnType};
use uuid::Uuid;

use crate::error::{Result, TypeError};

/// How GUID-shaped columns are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GuidFormat {
    /// No GUID interpretation; columns decode as strings or bytes.
    None,
    /// CHAR(36) columns hold the canonical textual form.
    #[default]
    Char36,
    /// BINARY(16) columns hold big-endian (RFC 4122) bytes.
    Binary16,
    /// BINARY(16) columns hold the little-endian (COM GUID) layout.
    LittleEndianBinary16,
    /// BINARY(16) columns hold the time-swapped layout
    /// (time-high, time-mid, time-low first) used for index locality.
    TimeSwapBinary16,
}

fn is_char36(column: &ColumnDefinition) -> bool {
    matches!(
        column.column_type,
        ColumnType::String | ColumnType::VarString | ColumnType::VarChar
    ) && !column.flags.contains(ColumnFlags::BINARY)
        && is_char36_length(column.length)
}

/// The definition reports length in bytes: CHAR(36) arrives as 36
/// (latin1/binary), 108 (utf8mb3), or 144 (utf8mb4).
fn is_char36_length(length: u32) -> bool {
    matches!(length, 36 | 108 | 144)
}

fn is_binary16(column: &ColumnDefinition) -> bool {
    matches!(
        column.column_type,
        ColumnType::String | ColumnType::VarString | ColumnType::VarChar
    ) && column.flags.contains(ColumnFlags::BINARY)
        && column.length == 16
}

/// Undo the time-swap permutation: stored bytes are
/// `[6,7,4,5,0,1,2,3,8..]` of the RFC form.
fn unswap_time_ordered(raw: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0] = raw[4];
    out[1] = raw[5];
    out[2] = raw[6];
    out[3] = raw[7];
    out[4] = raw[2];
    out[5] = raw[3];
    out[6] = raw[0];
    out[7] = raw[1];
    out[8..].copy_from_slice(&raw[8..]);
    out
}

/// Try to decode a GUID from raw column bytes.
///
/// Returns `Ok(None)` when the column does not match the configured
/// format's shape; an error when it matches but the bytes are invalid.
pub fn decode_guid(
    raw: &[u8],
    column: &ColumnDefinition,
    format: GuidFormat,
) -> Result<Option<Uuid>> {
    match format {
        GuidFormat::None => Ok(None),
        GuidFormat::Char36 => {
            if !is_char36(column) {
                return Ok(None);
            }
            let text = std::str::from_utf8(raw)
                .map_err(|_| TypeError::InvalidGuid("not valid UTF-8".into()))?;
            Uuid::parse_str(text)
                .map(Some)
                .map_err(|e| TypeError::InvalidGuid(e.to_string()))
        }
        GuidFormat::Binary16 | GuidFormat::LittleEndianBinary16 | GuidFormat::TimeSwapBinary16 => {
            if !is_binary16(column) {
                return Ok(None);
            }
            let bytes: [u8; 16] = raw.try_into().map_err(|_| {
                TypeError::InvalidGuid(format!("expected 16 bytes, got {}", raw.len()))
            })?;
            Ok(Some(match format {
                GuidFormat::Binary16 => Uuid::from_bytes(bytes),
                GuidFormat::LittleEndianBinary16 => Uuid::from_bytes_le(bytes),
                GuidFormat::TimeSwapBinary16 => Uuid::from_bytes(unswap_time_ordered(&bytes)),
                _ => unreachable!(),
            }))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn char36_column() -> ColumnDefinition {
        ColumnDefinition {
            catalog: "def".into(),
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: "id".into(),
            org_name: "id".into(),
            charset: 45,
            length: 144, // utf8mb4 CHAR(36)
            column_type: ColumnType::String,
            flags: ColumnFlags::empty(),
            decimals: 0,
        }
    }

    fn binary16_column() -> ColumnDefinition {
        ColumnDefinition {
            charset: 63,
            length: 16,
            column_type: ColumnType::String,
            flags: ColumnFlags::BINARY,
            ..char36_column()
        }
    }

    const CANONICAL: &str = "00112233-4455-6677-8899-aabbccddeeff";

    #[test]
    fn test_char36_decode() {
        let guid = decode_guid(CANONICAL.as_bytes(), &char36_column(), GuidFormat::Char36)
            .unwrap()
            .unwrap();
        assert_eq!(guid.to_string(), CANONICAL);
    }

    #[test]
    fn test_char36_invalid_text() {
        let result = decode_guid(b"not-a-guid-at-all-but-36-chars-long!", &char36_column(), GuidFormat::Char36);
        assert!(matches!(result, Err(TypeError::InvalidGuid(_))));
    }

    #[test]
    fn test_char36_skips_other_columns() {
        let mut short = char36_column();
        short.length = 40;
        assert!(decode_guid(b"x", &short, GuidFormat::Char36).unwrap().is_none());
    }

    #[test]
    fn test_binary16_big_endian() {
        let bytes: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        let guid = decode_guid(&bytes, &binary16_column(), GuidFormat::Binary16)
            .unwrap()
            .unwrap();
        assert_eq!(guid.to_string(), CANONICAL);
    }

    #[test]
    fn test_binary16_time_swap_roundtrip() {
        // Stored layout: time-high, time-mid, time-low, then the rest.
        let stored: [u8; 16] = [
            0x66, 0x77, 0x44, 0x55, 0x00, 0x11, 0x22, 0x33, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        let guid = decode_guid(&stored, &binary16_column(), GuidFormat::TimeSwapBinary16)
            .unwrap()
            .unwrap();
        assert_eq!(guid.to_string(), CANONICAL);
    }

    #[test]
    fn test_binary16_wrong_length() {
        let result = decode_guid(&[0u8; 15], &binary16_column(), GuidFormat::Binary16);
        assert!(matches!(result, Err(TypeError::InvalidGuid(_))));
    }

    #[test]
    fn test_none_format_disables() {
        assert!(
            decode_guid(CANONICAL.as_bytes(), &char36_column(), GuidFormat::None)
                .unwrap()
                .is_none()
        );
    }
}
