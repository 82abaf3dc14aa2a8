//! Client command codes.

/// Command byte that opens every client request packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Close the connection.
    Quit = 0x01,
    /// Change the default database.
    InitDb = 0x02,
    /// Text-protocol query.
    Query = 0x03,
    /// Server statistics string.
    Statistics = 0x09,
    /// Kill another connection by thread id.
    ProcessKill = 0x0C,
    /// Liveness check, answered with OK.
    Ping = 0x0E,
    /// Re-authenticate and reset the session.
    ChangeUser = 0x11,
    /// Prepare a statement for binary execution.
    StmtPrepare = 0x16,
    /// Execute a prepared statement.
    StmtExecute = 0x17,
    /// Stream a long parameter value ahead of execute.
    StmtSendLongData = 0x18,
    /// Close a prepared statement (no response).
    StmtClose = 0x19,
    /// Reset a prepared statement's accumulated long data.
    StmtReset = 0x1A,
    /// Toggle multi-statement support.
    SetOption = 0x1B,
    /// Fetch rows from a server-side cursor.
    StmtFetch = 0x1C,
    /// Reset the session to a pristine state.
    ResetConnection = 0x1F,
}

impl Command {
    /// Whether the server sends no response packet for this command.
    #[must_use]
    pub const fn is_fire_and_forget(self) -> bool {
        matches!(self, Self::Quit | Self::StmtClose | Self::StmtSendLongData)
    }
}
