//! Capability and status flag sets negotiated with the server.

use bitflags::bitflags;

bitflags! {
    /// Client/server capability flags.
    ///
    /// The low 16 bits arrive first in the initial handshake, the high 16
    /// bits follow after the character-set and status fields. The set
    /// granted to a session is the intersection of what the client asked
    /// for and what the server offered, fixed for the session's lifetime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Old password plugin uses longer scrambles.
        const LONG_PASSWORD = 1;
        /// Report found rows instead of affected rows.
        const FOUND_ROWS = 1 << 1;
        /// Column flags are sent as 2 bytes.
        const LONG_FLAG = 1 << 2;
        /// Handshake response may name an initial database.
        const CONNECT_WITH_DB = 1 << 3;
        /// Do not allow `database.table.column` syntax.
        const NO_SCHEMA = 1 << 4;
        /// Compressed protocol envelope after handshake.
        const COMPRESS = 1 << 5;
        /// ODBC client quirks (unused by servers today).
        const ODBC = 1 << 6;
        /// LOAD DATA LOCAL INFILE is allowed.
        const LOCAL_FILES = 1 << 7;
        /// Parser ignores spaces before `(`.
        const IGNORE_SPACE = 1 << 8;
        /// 4.1 protocol: required by this driver.
        const PROTOCOL_41 = 1 << 9;
        /// Interactive timeout semantics.
        const INTERACTIVE = 1 << 10;
        /// TLS upgrade supported.
        const SSL = 1 << 11;
        /// Do not raise SIGPIPE (client-side only).
        const IGNORE_SIGPIPE = 1 << 12;
        /// Server reports transaction status.
        const TRANSACTIONS = 1 << 13;
        /// Reserved 4.1 flag.
        const RESERVED = 1 << 14;
        /// 4.1 authentication: required by this driver.
        const SECURE_CONNECTION = 1 << 15;
        /// Multiple statements per COM_QUERY.
        const MULTI_STATEMENTS = 1 << 16;
        /// Multiple result sets per command.
        const MULTI_RESULTS = 1 << 17;
        /// Multiple result sets from prepared statements.
        const PS_MULTI_RESULTS = 1 << 18;
        /// Pluggable authentication.
        const PLUGIN_AUTH = 1 << 19;
        /// Connection attributes in the handshake response.
        const CONNECT_ATTRS = 1 << 20;
        /// Auth response is length-encoded rather than length-prefixed.
        const PLUGIN_AUTH_LENENC_DATA = 1 << 21;
        /// Client survives expired-password sandbox mode.
        const CAN_HANDLE_EXPIRED_PASSWORDS = 1 << 22;
        /// Session state change information in OK packets.
        const SESSION_TRACK = 1 << 23;
        /// EOF packets replaced by OK packets with an 0xFE header.
        const DEPRECATE_EOF = 1 << 24;
        /// Result-set metadata may be omitted.
        const OPTIONAL_RESULTSET_METADATA = 1 << 25;
        /// zstd compression envelope.
        const ZSTD_COMPRESSION = 1 << 26;
        /// Query attributes on COM_QUERY / COM_STMT_EXECUTE.
        const QUERY_ATTRIBUTES = 1 << 27;
    }
}

impl Capabilities {
    /// The baseline capability set this driver always requests.
    ///
    /// `PROTOCOL_41` and `SECURE_CONNECTION` are hard requirements: the
    /// handshake fails if the server does not offer both.
    #[must_use]
    pub fn client_default() -> Self {
        Self::PROTOCOL_41
            | Self::SECURE_CONNECTION
            | Self::LONG_PASSWORD
            | Self::LONG_FLAG
            | Self::TRANSACTIONS
            | Self::MULTI_STATEMENTS
            | Self::MULTI_RESULTS
            | Self::PS_MULTI_RESULTS
            | Self::PLUGIN_AUTH
            | Self::PLUGIN_AUTH_LENENC_DATA
            | Self::CONNECT_ATTRS
            | Self::DEPRECATE_EOF
    }

    /// Low 16 bits as transmitted in the first capability field.
    #[must_use]
    pub fn low_bits(self) -> u16 {
        (self.bits() & 0xFFFF) as u16
    }

    /// High 16 bits as transmitted in the extended capability field.
    #[must_use]
    pub fn high_bits(self) -> u16 {
        (self.bits() >> 16) as u16
    }

    /// Reassemble a capability set from the two 16-bit handshake halves.
    #[must_use]
    pub fn from_halves(low: u16, high: u16) -> Self {
        Self::from_bits_retain(u32::from(low) | (u32::from(high) << 16))
    }
}

bitflags! {
    /// Server status flags carried by OK and EOF packets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u16 {
        /// A transaction is open.
        const IN_TRANS = 0x0001;
        /// Autocommit is enabled.
        const AUTOCOMMIT = 0x0002;
        /// More result sets follow this one.
        const MORE_RESULTS_EXISTS = 0x0008;
        /// No good index was used.
        const NO_GOOD_INDEX_USED = 0x0010;
        /// No index was used.
        const NO_INDEX_USED = 0x0020;
        /// A read-only cursor is open.
        const CURSOR_EXISTS = 0x0040;
        /// The last row of a cursor fetch was sent.
        const LAST_ROW_SENT = 0x0080;
        /// The current database was dropped.
        const DB_DROPPED = 0x0100;
        /// Backslash is not an escape character.
        const NO_BACKSLASH_ESCAPES = 0x0200;
        /// Prepared-statement metadata changed since PREPARE.
        const METADATA_CHANGED = 0x0400;
        /// The query was logged as slow.
        const QUERY_WAS_SLOW = 0x0800;
        /// The result set contains OUT parameters.
        const PS_OUT_PARAMS = 0x1000;
        /// The open transaction is read-only.
        const IN_TRANS_READONLY = 0x2000;
        /// Session state information follows in the OK packet.
        const SESSION_STATE_CHANGED = 0x4000;
    }
}

impl StatusFlags {
    /// Whether the session is inside an explicit transaction.
    #[must_use]
    pub fn in_transaction(self) -> bool {
        self.intersects(Self::IN_TRANS | Self::IN_TRANS_READONLY)
    }

    /// Whether another result set follows the current one.
    #[must_use]
    pub fn has_more_results(self) -> bool {
        self.contains(Self::MORE_RESULTS_EXISTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_halves_roundtrip() {
        let caps = Capabilities::client_default() | Capabilities::SSL;
        let rebuilt = Capabilities::from_halves(caps.low_bits(), caps.high_bits());
        assert_eq!(caps, rebuilt);
    }

    #[test]
    fn test_client_default_requirements() {
        let caps = Capabilities::client_default();
        assert!(caps.contains(Capabilities::PROTOCOL_41));
        assert!(caps.contains(Capabilities::SECURE_CONNECTION));
        assert!(caps.contains(Capabilities::DEPRECATE_EOF));
        assert!(!caps.contains(Capabilities::SSL));
        assert!(!caps.contains(Capabilities::COMPRESS));
    }

    #[test]
    fn test_status_transaction_detection() {
        assert!(StatusFlags::IN_TRANS.in_transaction());
        assert!(StatusFlags::IN_TRANS_READONLY.in_transaction());
        assert!(!StatusFlags::AUTOCOMMIT.in_transaction());
    }
}
