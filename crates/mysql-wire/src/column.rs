//! Result-set column metadata.

use crate::prelude::*;

use bitflags::bitflags;

use crate::error::{ProtocolError, Result};
use crate::io::PayloadReader;

/// Column type code carried in a column definition packet.
///
/// The code selects the binary-row value layout; together with the
/// `UNSIGNED` column flag it fully determines decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    /// Old decimal, sent as text.
    Decimal = 0x00,
    /// 1-byte integer.
    Tiny = 0x01,
    /// 2-byte integer.
    Short = 0x02,
    /// 4-byte integer.
    Long = 0x03,
    /// 4-byte IEEE float.
    Float = 0x04,
    /// 8-byte IEEE double.
    Double = 0x05,
    /// Explicit NULL column.
    Null = 0x06,
    /// Timestamp, temporal wire layout.
    Timestamp = 0x07,
    /// 8-byte integer.
    LongLong = 0x08,
    /// 3-byte integer transmitted in 4 bytes.
    Int24 = 0x09,
    /// Date, temporal wire layout.
    Date = 0x0A,
    /// Time / duration wire layout.
    Time = 0x0B,
    /// Datetime, temporal wire layout.
    DateTime = 0x0C,
    /// Year, 2-byte integer.
    Year = 0x0D,
    /// Internal new-date code, never sent to clients in practice.
    NewDate = 0x0E,
    /// Varchar, length-encoded bytes.
    VarChar = 0x0F,
    /// Bit field, length-encoded bytes (big-endian bits).
    Bit = 0x10,
    /// JSON document, length-encoded bytes.
    Json = 0xF5,
    /// New decimal, sent as text.
    NewDecimal = 0xF6,
    /// Enum value, sent as its string form.
    Enum = 0xF7,
    /// Set value, sent as its comma-joined string form.
    Set = 0xF8,
    /// Tiny blob, length-encoded bytes.
    TinyBlob = 0xF9,
    /// Medium blob, length-encoded bytes.
    MediumBlob = 0xFA,
    /// Long blob, length-encoded bytes.
    LongBlob = 0xFB,
    /// Blob, length-encoded bytes.
    Blob = 0xFC,
    /// Var-string, length-encoded bytes.
    VarString = 0xFD,
    /// Fixed string, length-encoded bytes.
    String = 0xFE,
    /// Geometry, length-encoded bytes.
    Geometry = 0xFF,
}

impl ColumnType {
    /// Create a column type from its wire code.
    pub fn from_u8(code: u8) -> Result<Self> {
        Ok(match code {
            0x00 => Self::Decimal,
            0x01 => Self::Tiny,
            0x02 => Self::Short,
            0x03 => Self::Long,
            0x04 => Self::Float,
            0x05 => Self::Double,
            0x06 => Self::Null,
            0x07 => Self::Timestamp,
            0x08 => Self::LongLong,
            0x09 => Self::Int24,
            0x0A => Self::Date,
            0x0B => Self::Time,
            0x0C => Self::DateTime,
            0x0D => Self::Year,
            0x0E => Self::NewDate,
            0x0F => Self::VarChar,
            0x10 => Self::Bit,
            0xF5 => Self::Json,
            0xF6 => Self::NewDecimal,
            0xF7 => Self::Enum,
            0xF8 => Self::Set,
            0xF9 => Self::TinyBlob,
            0xFA => Self::MediumBlob,
            0xFB => Self::LongBlob,
            0xFC => Self::Blob,
            0xFD => Self::VarString,
            0xFE => Self::String,
            0xFF => Self::Geometry,
            other => return Err(ProtocolError::UnknownColumnType(other)),
        })
    }

    /// Whether binary-row values of this type are length-encoded rather
    /// than fixed-width.
    #[must_use]
    pub fn is_length_encoded(self) -> bool {
        matches!(
            self,
            Self::Decimal
                | Self::NewDecimal
                | Self::VarChar
                | Self::Bit
                | Self::Json
                | Self::Enum
                | Self::Set
                | Self::TinyBlob
                | Self::MediumBlob
                | Self::LongBlob
                | Self::Blob
                | Self::VarString
                | Self::String
                | Self::Geometry
        )
    }
}

bitflags! {
    /// Column definition flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColumnFlags: u16 {
        /// Column cannot be NULL.
        const NOT_NULL = 1;
        /// Part of a primary key.
        const PRIMARY_KEY = 1 << 1;
        /// Part of a unique key.
        const UNIQUE_KEY = 1 << 2;
        /// Part of a non-unique key.
        const MULTIPLE_KEY = 1 << 3;
        /// Blob or text column.
        const BLOB = 1 << 4;
        /// Integer values are unsigned.
        const UNSIGNED = 1 << 5;
        /// Zero-filled display.
        const ZEROFILL = 1 << 6;
        /// Binary collation.
        const BINARY = 1 << 7;
        /// Enum column.
        const ENUM = 1 << 8;
        /// Auto-increment column.
        const AUTO_INCREMENT = 1 << 9;
        /// Timestamp column.
        const TIMESTAMP = 1 << 10;
        /// Set column.
        const SET = 1 << 11;
        /// No default value.
        const NO_DEFAULT_VALUE = 1 << 12;
        /// Set to NOW on update.
        const ON_UPDATE_NOW = 1 << 13;
        /// Numeric column.
        const NUM = 1 << 15;
    }
}

/// Parsed Column Definition (protocol 4.1 layout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Virtual schema name, always `def` from real servers.
    pub catalog: String,
    /// Database the column belongs to.
    pub schema: String,
    /// Table alias.
    pub table: String,
    /// Physical table name.
    pub org_table: String,
    /// Column alias.
    pub name: String,
    /// Physical column name.
    pub org_name: String,
    /// Collation id of the column.
    pub charset: u16,
    /// Maximum display length.
    pub length: u32,
    /// Value type code.
    pub column_type: ColumnType,
    /// Definition flags.
    pub flags: ColumnFlags,
    /// Decimal digits for numeric types, fractional seconds for temporal.
    pub decimals: u8,
}

impl ColumnDefinition {
    /// Parse a column definition payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);

        let catalog = reader.read_lenenc_str("column catalog")?;
        let schema = reader.read_lenenc_str("column schema")?;
        let table = reader.read_lenenc_str("column table")?;
        let org_table = reader.read_lenenc_str("column org_table")?;
        let name = reader.read_lenenc_str("column name")?;
        let org_name = reader.read_lenenc_str("column org_name")?;

        // Length of the fixed-size tail, always 0x0C.
        let fixed_len = reader.read_lenenc_int("column fixed-length marker")?;
        if fixed_len != 0x0C {
            return Err(ProtocolError::Malformed(
                "column definition fixed-length field is not 12",
            ));
        }

        let charset = reader.read_u16_le("column charset")?;
        let length = reader.read_u32_le("column length")?;
        let column_type = ColumnType::from_u8(reader.read_u8("column type")?)?;
        let flags = ColumnFlags::from_bits_retain(reader.read_u16_le("column flags")?);
        let decimals = reader.read_u8("column decimals")?;

        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            charset,
            length,
            column_type,
            flags,
            decimals,
        })
    }

    /// Whether integer values in this column are unsigned.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::PayloadWriter;

    fn encode_column(name: &str, ty: ColumnType, flags: ColumnFlags) -> Vec<u8> {
        let mut w = PayloadWriter::new();
        w.write_lenenc_str("def");
        w.write_lenenc_str("db");
        w.write_lenenc_str("t");
        w.write_lenenc_str("t");
        w.write_lenenc_str(name);
        w.write_lenenc_str(name);
        w.write_lenenc_int(0x0C);
        w.write_u16_le(63);
        w.write_u32_le(11);
        w.write_u8(ty as u8);
        w.write_u16_le(flags.bits());
        w.write_u8(0);
        w.write_u16_le(0); // trailing filler
        w.freeze().to_vec()
    }

    #[test]
    fn test_decode_column_definition() {
        let payload = encode_column("id", ColumnType::Long, ColumnFlags::NOT_NULL);
        let col = ColumnDefinition::decode(&payload).unwrap();
        assert_eq!(col.catalog, "def");
        assert_eq!(col.name, "id");
        assert_eq!(col.column_type, ColumnType::Long);
        assert!(col.flags.contains(ColumnFlags::NOT_NULL));
        assert!(!col.is_unsigned());
    }

    #[test]
    fn test_unsigned_flag() {
        let payload = encode_column("n", ColumnType::LongLong, ColumnFlags::UNSIGNED);
        let col = ColumnDefinition::decode(&payload).unwrap();
        assert!(col.is_unsigned());
    }

    #[test]
    fn test_unknown_type_code() {
        assert!(matches!(
            ColumnType::from_u8(0x42),
            Err(ProtocolError::UnknownColumnType(0x42))
        ));
    }

    #[test]
    fn test_length_encoded_family() {
        assert!(ColumnType::Blob.is_length_encoded());
        assert!(ColumnType::NewDecimal.is_length_encoded());
        assert!(!ColumnType::Long.is_length_encoded());
        assert!(!ColumnType::DateTime.is_length_encoded());
    }
}
