//! Generic server response packets: OK, ERR, EOF, LOCAL INFILE.

use crate::prelude::*;

use crate::capability::{Capabilities, StatusFlags};
use crate::error::{ProtocolError, Result};
use crate::io::PayloadReader;

/// First-byte classification of a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// OK packet (0x00, or 0xFE under DEPRECATE_EOF).
    Ok,
    /// ERR packet (0xFF).
    Err,
    /// EOF packet (0xFE with a short payload, pre-DEPRECATE_EOF).
    Eof,
    /// LOCAL INFILE request (0xFB).
    LocalInfile,
    /// Anything else: result-set header or row data.
    Data,
}

impl ResponseKind {
    /// Classify a payload by its first byte and length.
    ///
    /// An 0xFE header is an EOF packet only when the payload is shorter
    /// than 9 bytes; under DEPRECATE_EOF the server instead sends an OK
    /// packet with an 0xFE header, which is longer.
    #[must_use]
    pub fn classify(payload: &[u8], capabilities: Capabilities) -> Self {
        match payload.first().copied() {
            Some(0x00) => Self::Ok,
            Some(0xFF) => Self::Err,
            Some(0xFE) if payload.len() < 9 => {
                if capabilities.contains(Capabilities::DEPRECATE_EOF) {
                    Self::Ok
                } else {
                    Self::Eof
                }
            }
            Some(0xFE) => Self::Ok,
            Some(0xFB) => Self::LocalInfile,
            _ => Self::Data,
        }
    }
}

/// Whether a row-stream packet terminates the current result set.
///
/// Inside a row stream the terminator is an EOF packet (legacy) or an OK
/// packet with an 0xFE header (DEPRECATE_EOF). A data row can only begin
/// with 0xFE if its first column length uses the 8-byte encoding, which
/// forces the frame to the maximum packet size; any shorter 0xFE frame is
/// the terminator.
#[must_use]
pub fn is_row_terminator(payload: &[u8], capabilities: Capabilities) -> bool {
    match payload.first().copied() {
        Some(0xFE) if capabilities.contains(Capabilities::DEPRECATE_EOF) => {
            payload.len() < crate::packet::MAX_PAYLOAD_SIZE
        }
        Some(0xFE) => payload.len() < 9,
        _ => false,
    }
}

/// Parsed OK packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OkPacket {
    /// Rows changed, deleted, or inserted by the statement.
    pub affected_rows: u64,
    /// Auto-increment value of the last inserted row.
    pub last_insert_id: u64,
    /// Server status after the statement.
    pub status: StatusFlags,
    /// Warning count.
    pub warnings: u16,
    /// Human-readable info string.
    pub info: String,
    /// Raw session-state-change payload, present when the server tracks
    /// session state and something changed.
    pub session_state: Option<Vec<u8>>,
}

impl OkPacket {
    /// Parse an OK packet payload, including the 0x00/0xFE header byte.
    pub fn decode(payload: &[u8], capabilities: Capabilities) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let header = reader.read_u8("ok header")?;
        if header != 0x00 && header != 0xFE {
            return Err(ProtocolError::Malformed("OK packet header byte"));
        }

        let affected_rows = reader.read_lenenc_int("ok affected rows")?;
        let last_insert_id = reader.read_lenenc_int("ok last insert id")?;
        let status = StatusFlags::from_bits_retain(reader.read_u16_le("ok status")?);
        let warnings = reader.read_u16_le("ok warnings")?;

        let (info, session_state) = if capabilities.contains(Capabilities::SESSION_TRACK) {
            let info = if reader.is_empty() {
                String::new()
            } else {
                reader.read_lenenc_str("ok info")?
            };
            let state = if status.contains(StatusFlags::SESSION_STATE_CHANGED) {
                Some(reader.read_lenenc_bytes("ok session state")?.to_vec())
            } else {
                None
            };
            (info, state)
        } else {
            (reader.read_rest_str(), None)
        };

        Ok(Self {
            affected_rows,
            last_insert_id,
            status,
            warnings,
            info,
            session_state,
        })
    }
}

/// Parsed ERR packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    /// Server error code, e.g. 1045 for access denied.
    pub code: u16,
    /// Five-character SQLSTATE, empty if the server omitted it.
    pub sqlstate: String,
    /// Error message text.
    pub message: String,
}

/// `ER_QUERY_INTERRUPTED`: the statement was killed mid-execution.
pub const ER_QUERY_INTERRUPTED: u16 = 1317;

impl ErrPacket {
    /// Parse an ERR packet payload, including the 0xFF header byte.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        if reader.read_u8("err header")? != 0xFF {
            return Err(ProtocolError::Malformed("ERR packet header byte"));
        }

        let code = reader.read_u16_le("err code")?;
        let sqlstate = if reader.peek() == Some(b'#') {
            reader.skip(1, "err sqlstate marker")?;
            reader.read_fixed_str(5, "err sqlstate")?
        } else {
            String::new()
        };
        let message = reader.read_rest_str();

        Ok(Self {
            code,
            sqlstate,
            message,
        })
    }

    /// Whether this error means the statement was interrupted by KILL.
    #[must_use]
    pub fn is_query_interrupted(&self) -> bool {
        self.code == ER_QUERY_INTERRUPTED
    }
}

/// Parsed EOF packet (pre-DEPRECATE_EOF servers only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EofPacket {
    /// Warning count.
    pub warnings: u16,
    /// Server status after the packet.
    pub status: StatusFlags,
}

impl EofPacket {
    /// Parse an EOF packet payload, including the 0xFE header byte.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        if reader.read_u8("eof header")? != 0xFE {
            return Err(ProtocolError::Malformed("EOF packet header byte"));
        }
        let warnings = reader.read_u16_le("eof warnings")?;
        let status = StatusFlags::from_bits_retain(reader.read_u16_le("eof status")?);
        Ok(Self { warnings, status })
    }
}

/// Parsed LOCAL INFILE request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInfilePacket {
    /// Path of the file the server asks the client to stream.
    pub filename: String,
}

impl LocalInfilePacket {
    /// Parse a LOCAL INFILE request payload, including the 0xFB header.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        if reader.read_u8("infile header")? != 0xFB {
            return Err(ProtocolError::Malformed("LOCAL INFILE header byte"));
        }
        Ok(Self {
            filename: reader.read_rest_str(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::PayloadWriter;

    #[test]
    fn test_ok_packet_roundtrip() {
        let mut w = PayloadWriter::new();
        w.write_u8(0x00);
        w.write_lenenc_int(3); // affected rows
        w.write_lenenc_int(42); // last insert id
        w.write_u16_le(StatusFlags::AUTOCOMMIT.bits());
        w.write_u16_le(1); // warnings
        w.write_bytes(b"Rows matched: 3");
        let payload = w.freeze();

        let ok = OkPacket::decode(&payload, Capabilities::client_default()).unwrap();
        assert_eq!(ok.affected_rows, 3);
        assert_eq!(ok.last_insert_id, 42);
        assert_eq!(ok.warnings, 1);
        assert!(ok.status.contains(StatusFlags::AUTOCOMMIT));
        assert_eq!(ok.info, "Rows matched: 3");
    }

    #[test]
    fn test_err_packet_with_sqlstate() {
        let mut w = PayloadWriter::new();
        w.write_u8(0xFF);
        w.write_u16_le(1045);
        w.write_u8(b'#');
        w.write_bytes(b"28000");
        w.write_bytes(b"Access denied for user");
        let payload = w.freeze();

        let err = ErrPacket::decode(&payload).unwrap();
        assert_eq!(err.code, 1045);
        assert_eq!(err.sqlstate, "28000");
        assert_eq!(err.message, "Access denied for user");
        assert!(!err.is_query_interrupted());
    }

    #[test]
    fn test_query_interrupted_detection() {
        let mut w = PayloadWriter::new();
        w.write_u8(0xFF);
        w.write_u16_le(ER_QUERY_INTERRUPTED);
        w.write_u8(b'#');
        w.write_bytes(b"70100");
        w.write_bytes(b"Query execution was interrupted");
        let err = ErrPacket::decode(&w.freeze()).unwrap();
        assert!(err.is_query_interrupted());
    }

    #[test]
    fn test_eof_packet() {
        let mut w = PayloadWriter::new();
        w.write_u8(0xFE);
        w.write_u16_le(0);
        w.write_u16_le(StatusFlags::MORE_RESULTS_EXISTS.bits());
        let eof = EofPacket::decode(&w.freeze()).unwrap();
        assert!(eof.status.has_more_results());
    }

    #[test]
    fn test_classify_eof_vs_deprecated_ok() {
        let short_fe = [0xFEu8, 0x00, 0x00, 0x02, 0x00];
        let legacy = Capabilities::client_default() - Capabilities::DEPRECATE_EOF;
        assert_eq!(
            ResponseKind::classify(&short_fe, legacy),
            ResponseKind::Eof
        );
        assert_eq!(
            ResponseKind::classify(&short_fe, Capabilities::client_default()),
            ResponseKind::Ok
        );
        // A 9-byte-or-longer 0xFE payload in the response position is an
        // OK packet with session info, never an EOF.
        let long_fe = [0xFEu8; 12];
        assert_eq!(
            ResponseKind::classify(&long_fe, legacy),
            ResponseKind::Ok
        );
    }

    #[test]
    fn test_row_terminator() {
        let caps = Capabilities::client_default();
        let legacy = caps - Capabilities::DEPRECATE_EOF;

        let eof = [0xFEu8, 0x00, 0x00, 0x02, 0x00];
        assert!(is_row_terminator(&eof, legacy));
        assert!(is_row_terminator(&eof, caps));

        // An OK terminator with an info string is longer than an EOF but
        // still ends the set under DEPRECATE_EOF.
        let ok_with_info = [0xFEu8; 24];
        assert!(is_row_terminator(&ok_with_info, caps));
        assert!(!is_row_terminator(&ok_with_info, legacy));

        let row = [0x03u8, b'a', b'b', b'c'];
        assert!(!is_row_terminator(&row, caps));
    }

    #[test]
    fn test_classify_others() {
        let caps = Capabilities::client_default();
        assert_eq!(ResponseKind::classify(&[0x00, 0, 0], caps), ResponseKind::Ok);
        assert_eq!(ResponseKind::classify(&[0xFF, 0, 0], caps), ResponseKind::Err);
        assert_eq!(
            ResponseKind::classify(&[0xFB], caps),
            ResponseKind::LocalInfile
        );
        assert_eq!(ResponseKind::classify(&[0x05], caps), ResponseKind::Data);
    }

    #[test]
    fn test_local_infile_filename() {
        let mut w = PayloadWriter::new();
        w.write_u8(0xFB);
        w.write_bytes(b"/tmp/data.csv");
        let infile = LocalInfilePacket::decode(&w.freeze()).unwrap();
        assert_eq!(infile.filename, "/tmp/data.csv");
    }
}
