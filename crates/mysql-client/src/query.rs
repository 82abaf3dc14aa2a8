//! Command execution: the text-protocol query flow and row streaming.
//!
//! One command is exactly one request payload followed by frames up to a
//! terminal packet. Every exit path either consumes the full response or
//! poisons the session; a half-read response never survives into the next
//! command.

use std::sync::Arc;

use bytes::Bytes;
use mysql_types::decode::{decode_binary_row, decode_text_row};
use mysql_wire::response::{ErrPacket, LocalInfilePacket, OkPacket, ResponseKind, is_row_terminator};
use mysql_wire::{ColumnDefinition, Command, ProtocolError};

use crate::error::{Error, Result};
use crate::row::Row;
use crate::session::{Session, SessionState};

/// Summary of a completed non-query command (or a fully drained query).
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    /// Rows changed, deleted, or inserted.
    pub affected_rows: u64,
    /// Auto-increment id of the last inserted row.
    pub last_insert_id: u64,
    /// Warning count.
    pub warnings: u16,
    /// Server info string.
    pub info: String,
}

impl From<&OkPacket> for CommandResult {
    fn from(ok: &OkPacket) -> Self {
        Self {
            affected_rows: ok.affected_rows,
            last_insert_id: ok.last_insert_id,
            warnings: ok.warnings,
            info: ok.info.clone(),
        }
    }
}

/// First response to a command.
pub(crate) enum ResponseEvent {
    /// The statement produced no rows.
    Ok(OkPacket),
    /// A result set follows; the column definitions have been read.
    ResultSet(Arc<Vec<ColumnDefinition>>),
}

/// Read a command's first response, resolving LOCAL INFILE requests
/// inline.
pub(crate) async fn read_command_response(session: &mut Session) -> Result<ResponseEvent> {
    loop {
        let payload = session.read_payload().await?;

        match ResponseKind::classify(&payload, session.capabilities()) {
            ResponseKind::Ok => {
                let ok = session.settle_ok(&payload)?;
                return Ok(ResponseEvent::Ok(ok));
            }
            ResponseKind::Err => {
                // settle_ok parses ERR and leaves the session Ready.
                session.settle_ok(&payload)?;
                unreachable!("settle_ok returns Err for ERR packets");
            }
            ResponseKind::LocalInfile => {
                let request = LocalInfilePacket::decode(&payload)?;
                handle_local_infile(session, &request.filename).await?;
                // The server answers the (possibly empty) upload with its
                // own OK/ERR, which the next loop iteration settles.
            }
            ResponseKind::Eof => {
                session.poison();
                return Err(Error::Protocol(ProtocolError::Malformed(
                    "EOF packet in command-response position",
                )));
            }
            ResponseKind::Data => {
                let mut reader = mysql_wire::PayloadReader::new(&payload);
                let column_count = reader.read_lenenc_int("result set column count")? as usize;
                let columns = read_columns(session, column_count).await?;
                session.set_state(SessionState::StreamingResult);
                return Ok(ResponseEvent::ResultSet(Arc::new(columns)));
            }
        }
    }
}

/// Read `count` column definitions plus the legacy EOF separator when the
/// session did not negotiate DEPRECATE_EOF.
pub(crate) async fn read_columns(
    session: &mut Session,
    count: usize,
) -> Result<Vec<ColumnDefinition>> {
    // Zero-count blocks (parameterless prepares) have no EOF separator.
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut columns = Vec::with_capacity(count);
    for _ in 0..count {
        let payload = session.read_payload().await?;
        columns.push(ColumnDefinition::decode(&payload)?);
    }

    if !session
        .capabilities()
        .contains(mysql_wire::Capabilities::DEPRECATE_EOF)
    {
        let payload = session.read_payload().await?;
        if payload.first() != Some(&0xFE) {
            session.poison();
            return Err(Error::Protocol(ProtocolError::Malformed(
                "missing EOF after column definitions",
            )));
        }
    }

    Ok(columns)
}

/// Answer a LOCAL INFILE request.
///
/// With a registered handler the file content streams up in packets,
/// terminated by an empty payload. Without one, the safe default is an
/// immediate empty terminator; the caller sees a usage error after the
/// server acknowledges.
async fn handle_local_infile(session: &mut Session, filename: &str) -> Result<()> {
    tracing::debug!(filename = %filename, "server requested LOCAL INFILE");

    let handler = session.config().local_infile_handler.clone();
    match handler {
        Some(handler) => match handler.read(filename) {
            Ok(content) => {
                // Chunks stay under the frame limit so the codec never
                // needs a continuation run (whose empty terminator would
                // end the upload early).
                for chunk in content.chunks(1024 * 1024) {
                    session
                        .write_continuation(Bytes::copy_from_slice(chunk))
                        .await?;
                }
                session.write_continuation(Bytes::new()).await?;
                Ok(())
            }
            Err(io_err) => {
                // The upload was promised; terminate it cleanly before
                // surfacing the local failure, so the session survives.
                session.write_continuation(Bytes::new()).await?;
                let payload = session.read_payload().await?;
                match session.settle_ok(&payload) {
                    Ok(_) | Err(Error::Server { .. }) => Err(Error::Usage(format!(
                        "LOCAL INFILE handler failed for `{filename}`: {io_err}"
                    ))),
                    Err(other) => Err(other),
                }
            }
        },
        None => {
            // No file to offer: terminate the upload, let the server
            // answer, then tell the caller what went wrong.
            session.write_continuation(Bytes::new()).await?;
            let payload = session.read_payload().await?;
            // Server acknowledges the empty upload (OK) or complains
            // (ERR); either way the command is over.
            match session.settle_ok(&payload) {
                Ok(_) | Err(Error::Server { .. }) => Err(Error::Usage(format!(
                    "server requested LOCAL INFILE `{filename}` but no handler is registered"
                ))),
                Err(other) => Err(other),
            }
        }
    }
}

/// Execute SQL and drain every result set, returning the final summary.
///
/// This is the non-streaming path used for DML, for the internal
/// housekeeping statements, and by the blocking facade.
pub(crate) async fn execute_text(session: &mut Session, sql: &str) -> Result<CommandResult> {
    session.send_command(Command::Query, sql.as_bytes()).await?;

    match read_command_response(session).await? {
        ResponseEvent::Ok(ok) => {
            let mut result = CommandResult::from(&ok);
            let mut status = ok.status;
            // MORE_RESULTS: later sets overwrite the summary so the caller
            // sees the final one, matching the text protocol's contract.
            while status.has_more_results() {
                match read_command_response(session).await? {
                    ResponseEvent::Ok(ok) => {
                        result = CommandResult::from(&ok);
                        status = ok.status;
                    }
                    ResponseEvent::ResultSet(columns) => {
                        let ok = drain_rows(session, &columns).await?;
                        result = CommandResult::from(&ok);
                        status = ok.status;
                    }
                }
            }
            Ok(result)
        }
        ResponseEvent::ResultSet(columns) => {
            let mut ok = drain_rows(session, &columns).await?;
            while ok.status.has_more_results() {
                match read_command_response(session).await? {
                    ResponseEvent::Ok(next) => ok = next,
                    ResponseEvent::ResultSet(columns) => {
                        ok = drain_rows(session, &columns).await?;
                    }
                }
            }
            session.set_state(SessionState::Ready);
            Ok(CommandResult::from(&ok))
        }
    }
}

/// Read and discard rows until the set's terminator, returning it.
pub(crate) async fn drain_rows(
    session: &mut Session,
    _columns: &[ColumnDefinition],
) -> Result<OkPacket> {
    loop {
        let payload = session.read_payload().await?;

        if payload.first() == Some(&0xFF) {
            let err = ErrPacket::decode(&payload)?;
            session.set_state(SessionState::Ready);
            return Err(Error::from_err_packet(err));
        }

        if is_row_terminator(&payload, session.capabilities()) {
            let ok = terminal_ok(session, &payload)?;
            return Ok(ok);
        }
        // Row payloads are discarded without decoding.
    }
}

/// Parse a row-stream terminator into an OK packet, updating status.
pub(crate) fn terminal_ok(session: &mut Session, payload: &[u8]) -> Result<OkPacket> {
    let capabilities = session.capabilities();
    let ok = if capabilities.contains(mysql_wire::Capabilities::DEPRECATE_EOF) {
        OkPacket::decode(payload, capabilities).map_err(|e| {
            session.poison();
            Error::Protocol(e)
        })?
    } else {
        let eof = mysql_wire::EofPacket::decode(payload).map_err(|e| {
            session.poison();
            Error::Protocol(e)
        })?;
        OkPacket {
            status: eof.status,
            warnings: eof.warnings,
            ..OkPacket::default()
        }
    };
    session.update_status(ok.status);
    if !ok.status.has_more_results() {
        session.set_state(SessionState::Ready);
    }
    Ok(ok)
}

/// A lazy, single-pass stream over the result sets of one command.
///
/// Rows decode on demand and the stream is bound to the session lease:
/// it borrows the session mutably, so nothing else can touch the
/// connection until the stream is finished or dropped. Dropping the
/// stream before the final OK poisons the session, because a half-read
/// response cannot be resynchronized.
pub struct QueryStream<'a> {
    session: &'a mut Session,
    columns: Arc<Vec<ColumnDefinition>>,
    /// Rows decode with the binary layout (prepared statements) rather
    /// than the text layout.
    binary: bool,
    /// The current set's rows are exhausted.
    set_done: bool,
    /// The whole command is finished (final OK consumed).
    finished: bool,
    last_ok: Option<OkPacket>,
}

impl<'a> QueryStream<'a> {
    pub(crate) fn new(
        session: &'a mut Session,
        columns: Arc<Vec<ColumnDefinition>>,
        binary: bool,
    ) -> Self {
        Self {
            session,
            columns,
            binary,
            set_done: false,
            finished: false,
            last_ok: None,
        }
    }

    /// A stream for a command whose first response was already OK
    /// (no rows).
    pub(crate) fn completed(session: &'a mut Session, ok: OkPacket) -> Self {
        let finished = !ok.status.has_more_results();
        Self {
            session,
            columns: Arc::new(Vec::new()),
            binary: false,
            set_done: true,
            finished,
            last_ok: Some(ok),
        }
    }

    /// Column metadata of the current result set; empty for row-less
    /// statements.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Summary of the most recently completed set.
    #[must_use]
    pub fn last_result(&self) -> Option<CommandResult> {
        self.last_ok.as_ref().map(CommandResult::from)
    }

    /// Whether the final OK has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next row of the current result set.
    ///
    /// Returns `None` when the set is exhausted; [`next_result`] then
    /// moves to the following set if the server announced one.
    ///
    /// [`next_result`]: Self::next_result
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.set_done {
            return Ok(None);
        }

        let payload = self.session.read_payload().await?;

        if payload.first() == Some(&0xFF) {
            let err = ErrPacket::decode(&payload)?;
            self.set_done = true;
            self.finished = true;
            self.session.set_state(SessionState::Ready);
            return Err(Error::from_err_packet(err));
        }

        if is_row_terminator(&payload, self.session.capabilities()) {
            let ok = terminal_ok(self.session, &payload)?;
            self.set_done = true;
            self.finished = !ok.status.has_more_results();
            self.last_ok = Some(ok);
            return Ok(None);
        }

        let opts = self.session.decode_options();
        let values = if self.binary {
            decode_binary_row(&payload, &self.columns, &opts)?
        } else {
            decode_text_row(&payload, &self.columns, &opts)?
        };
        Ok(Some(Row::new(Arc::clone(&self.columns), values)))
    }

    /// Advance to the next result set.
    ///
    /// Any unread rows of the current set are drained first, preserving
    /// set ordering. Returns `false` when no further set exists.
    pub async fn next_result(&mut self) -> Result<bool> {
        while !self.set_done {
            if self.next_row().await?.is_none() {
                break;
            }
        }

        if self.finished {
            return Ok(false);
        }

        match read_command_response(self.session).await? {
            ResponseEvent::Ok(ok) => {
                self.columns = Arc::new(Vec::new());
                self.set_done = true;
                self.finished = !ok.status.has_more_results();
                self.last_ok = Some(ok);
            }
            ResponseEvent::ResultSet(columns) => {
                self.columns = columns;
                self.set_done = false;
            }
        }
        Ok(true)
    }

    /// Consume everything left and return the final summary.
    pub async fn drain(mut self) -> Result<CommandResult> {
        loop {
            while self.next_row().await?.is_some() {}
            if !self.next_result().await? {
                break;
            }
        }
        let result = self.last_ok.as_ref().map(CommandResult::from).unwrap_or_default();
        self.finished = true;
        Ok(result)
    }

    /// Collect all rows of the current result set into memory.
    pub async fn collect_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Drop for QueryStream<'_> {
    fn drop(&mut self) {
        // An abandoned stream leaves undrained frames on the wire; the
        // session cannot carry another command until they are gone, and
        // there is no async drain in Drop. Poison, and let the pool
        // replace the connection.
        if !self.finished {
            self.session.poison();
        }
    }
}

impl std::fmt::Debug for QueryStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStream")
            .field("columns", &self.columns.len())
            .field("binary", &self.binary)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
