//! Prepared statements: the binary protocol and the per-session cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use mysql_types::{Value, encode_param_value, param_type_bytes};
use mysql_wire::response::{ErrPacket, OkPacket};
use mysql_wire::{ColumnDefinition, Command, PayloadReader, PayloadWriter, ProtocolError};

use crate::error::{Error, Result};
use crate::query::{self, QueryStream, ResponseEvent};
use crate::session::{Session, SessionState};

/// Default per-session prepared-statement cache capacity.
pub const DEFAULT_MAX_STATEMENTS: usize = 256;

/// A server-side prepared statement.
///
/// Valid only on the session that prepared it, and only until the next
/// session reset invalidates server-side statement ids.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    /// Server-assigned statement id.
    pub statement_id: u32,
    /// Parameter placeholder metadata.
    pub params: Arc<Vec<ColumnDefinition>>,
    /// Result column metadata as known at prepare time.
    pub columns: Arc<Vec<ColumnDefinition>>,
}

impl PreparedStatement {
    /// Number of `?` placeholders.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

fn hash_sql(sql: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    hasher.finish()
}

/// LRU cache of prepared statements keyed by SQL text hash.
///
/// Evicted and invalidated statement ids must be closed on the server;
/// the cache hands them back to the caller rather than talking to the
/// wire itself.
pub struct StatementCache {
    cache: LruCache<u64, PreparedStatement>,
}

impl StatementCache {
    /// Create a cache holding at most `capacity` statements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).expect("capacity must be non-zero")),
        }
    }

    /// Create a cache with the default capacity.
    #[must_use]
    pub fn with_default_size() -> Self {
        Self::new(DEFAULT_MAX_STATEMENTS)
    }

    /// Look up a statement by SQL text, refreshing its recency.
    pub fn get(&mut self, sql: &str) -> Option<PreparedStatement> {
        self.cache.get(&hash_sql(sql)).cloned()
    }

    /// Insert a statement, returning whatever got evicted to make room.
    pub fn insert(&mut self, sql: &str, statement: PreparedStatement) -> Option<PreparedStatement> {
        self.cache
            .push(hash_sql(sql), statement)
            .map(|(_, evicted)| evicted)
    }

    /// Number of cached statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop all entries (after a reset invalidated the server-side ids).
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for StatementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCache")
            .field("len", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// `COM_STMT_PREPARE`: prepare SQL, caching the result by text.
///
/// A cache hit skips the round trip entirely. On a miss the evicted
/// entry (if any) is closed on the server before the new statement is
/// returned.
pub async fn prepare(session: &mut Session, sql: &str) -> Result<PreparedStatement> {
    if let Some(cached) = session.stmt_cache.get(sql) {
        tracing::trace!(statement_id = cached.statement_id, "statement cache hit");
        return Ok(cached);
    }

    session
        .send_command(Command::StmtPrepare, sql.as_bytes())
        .await?;

    let payload = session.read_payload().await?;
    let prepare_ok = match payload.first().copied() {
        Some(0x00) => {
            let mut reader = PayloadReader::new(&payload);
            reader.skip(1, "prepare ok header")?;
            let statement_id = reader.read_u32_le("prepare statement id")?;
            let num_columns = reader.read_u16_le("prepare column count")?;
            let num_params = reader.read_u16_le("prepare param count")?;
            // Filler plus warning count; absent on ancient servers.
            let _ = reader.skip(3, "prepare tail");
            (statement_id, num_columns as usize, num_params as usize)
        }
        Some(0xFF) => {
            let err = ErrPacket::decode(&payload)?;
            session.set_state(SessionState::Ready);
            return Err(Error::from_err_packet(err));
        }
        _ => {
            session.poison();
            return Err(Error::Protocol(ProtocolError::Malformed(
                "unexpected COM_STMT_PREPARE response",
            )));
        }
    };
    let (statement_id, num_columns, num_params) = prepare_ok;

    let params = query::read_columns(session, num_params).await?;
    let columns = query::read_columns(session, num_columns).await?;
    session.set_state(SessionState::Ready);

    let statement = PreparedStatement {
        statement_id,
        params: Arc::new(params),
        columns: Arc::new(columns),
    };

    tracing::debug!(
        statement_id,
        params = num_params,
        columns = num_columns,
        "prepared statement"
    );

    if let Some(evicted) = session.stmt_cache.insert(sql, statement.clone()) {
        close_statement(session, evicted.statement_id).await?;
    }

    Ok(statement)
}

/// Build the `COM_STMT_EXECUTE` body for a statement and its bindings.
fn encode_execute(statement: &PreparedStatement, params: &[Value]) -> Vec<u8> {
    let mut w = PayloadWriter::with_capacity(32 + params.len() * 8);
    w.write_u32_le(statement.statement_id);
    w.write_u8(0); // CURSOR_TYPE_NO_CURSOR
    w.write_u32_le(1); // iteration count, always 1

    if !params.is_empty() {
        let mut bitmap = vec![0u8; (params.len() + 7) / 8];
        for (i, value) in params.iter().enumerate() {
            if value.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        w.write_bytes(&bitmap);
        w.write_u8(1); // new-params-bound: types follow

        for value in params {
            w.write_bytes(&param_type_bytes(value));
        }
        for value in params {
            encode_param_value(&mut w, value);
        }
    }

    w.freeze().to_vec()
}

/// `COM_STMT_EXECUTE`: run a prepared statement and stream binary rows.
pub async fn execute<'a>(
    session: &'a mut Session,
    statement: &PreparedStatement,
    params: &[Value],
) -> Result<QueryStream<'a>> {
    if params.len() != statement.param_count() {
        return Err(Error::Usage(format!(
            "statement expects {} parameters, {} bound",
            statement.param_count(),
            params.len()
        )));
    }

    let body = encode_execute(statement, params);
    session.send_command(Command::StmtExecute, &body).await?;

    match query::read_command_response(session).await? {
        ResponseEvent::Ok(ok) => Ok(QueryStream::completed(session, ok)),
        ResponseEvent::ResultSet(columns) => Ok(QueryStream::new(session, columns, true)),
    }
}

/// `COM_STMT_CLOSE`: release a server-side statement. Fire-and-forget.
pub async fn close_statement(session: &mut Session, statement_id: u32) -> Result<()> {
    let mut w = PayloadWriter::with_capacity(4);
    w.write_u32_le(statement_id);
    session.send_command(Command::StmtClose, w.as_bytes()).await
}

/// `COM_STMT_SEND_LONG_DATA`: stream a large parameter value ahead of
/// execute. Fire-and-forget; the server accumulates chunks per parameter
/// until the next execute or `COM_STMT_RESET`.
pub async fn send_long_data(
    session: &mut Session,
    statement_id: u32,
    param_index: u16,
    chunk: &[u8],
) -> Result<()> {
    let mut w = PayloadWriter::with_capacity(6 + chunk.len());
    w.write_u32_le(statement_id);
    w.write_u16_le(param_index);
    w.write_bytes(chunk);
    session
        .send_command(Command::StmtSendLongData, w.as_bytes())
        .await
}

/// `COM_STMT_RESET`: discard accumulated long data for a statement.
pub async fn reset_statement(session: &mut Session, statement_id: u32) -> Result<OkPacket> {
    let mut w = PayloadWriter::with_capacity(4);
    w.write_u32_le(statement_id);
    session.send_command(Command::StmtReset, w.as_bytes()).await?;
    let payload = session.read_payload().await?;
    session.settle_ok(&payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn statement(id: u32) -> PreparedStatement {
        PreparedStatement {
            statement_id: id,
            params: Arc::new(Vec::new()),
            columns: Arc::new(Vec::new()),
        }
    }

    #[test]
    fn test_cache_hit_and_eviction() {
        let mut cache = StatementCache::new(2);
        assert!(cache.insert("a", statement(1)).is_none());
        assert!(cache.insert("b", statement(2)).is_none());
        assert_eq!(cache.get("a").unwrap().statement_id, 1);

        // "b" is now least recently used and gets evicted.
        let evicted = cache.insert("c", statement(3)).unwrap();
        assert_eq!(evicted.statement_id, 2);
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_cache_clear() {
        let mut cache = StatementCache::with_default_size();
        cache.insert("a", statement(1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_encode_execute_layout() {
        let stmt = PreparedStatement {
            statement_id: 7,
            params: Arc::new(vec![]),
            columns: Arc::new(vec![]),
        };

        // No parameters: header only.
        let body = encode_execute(&stmt, &[]);
        assert_eq!(body.len(), 9);
        assert_eq!(&body[..4], &7u32.to_le_bytes());
        assert_eq!(body[4], 0);
        assert_eq!(&body[5..9], &1u32.to_le_bytes());
    }

    #[test]
    fn test_encode_execute_null_bitmap() {
        let stmt = statement(1);
        let params = vec![Value::Null, Value::Int(5), Value::Null];
        let body = encode_execute(&stmt, &params);

        // Header (9) + bitmap (1): params 0 and 2 are NULL.
        assert_eq!(body[9], 0b0000_0101);
        // new-params-bound flag.
        assert_eq!(body[10], 1);
        // Three type pairs follow.
        assert_eq!(body[11], 0x06); // NULL
        assert_eq!(body[13], 0x08); // LONGLONG
        assert_eq!(body[15], 0x06); // NULL
        // Only the non-null value contributes bytes.
        assert_eq!(&body[17..25], &5i64.to_le_bytes());
        assert_eq!(body.len(), 25);
    }
}
