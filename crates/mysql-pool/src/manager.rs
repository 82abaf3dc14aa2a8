//! Process-wide pool registry.
//!
//! Pools are keyed by the normalized [`PoolKey`] of their configuration:
//! two connection strings that normalize to the same key share one pool.
//! Created lazily, kept for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use mysql_client::{Config, PoolKey};
use parking_lot::Mutex;

use crate::error::Result;
use crate::pool::{Pool, PooledSession};

static POOLS: OnceLock<Mutex<HashMap<PoolKey, Pool>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<PoolKey, Pool>> {
    POOLS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Get the pool for a configuration, creating it on first use.
pub fn pool_for(config: &Arc<Config>) -> Result<Pool> {
    let key = config.pool_key();

    if let Some(pool) = registry().lock().get(&key) {
        return Ok(pool.clone());
    }

    // Built outside the lock: pool creation spawns the sweeper.
    let pool = Pool::new(Arc::clone(config))?;
    let mut pools = registry().lock();
    // Another task may have raced us here; first insertion wins.
    Ok(pools.entry(key).or_insert(pool).clone())
}

/// Acquire a session for a configuration through the shared registry.
///
/// Configurations with pooling disabled bypass the registry and open a
/// dedicated session wrapped in a single-use pool.
pub async fn acquire(config: &Arc<Config>) -> Result<PooledSession> {
    if config.pooling {
        pool_for(config)?.acquire().await
    } else {
        // A throwaway pool gives the lease the same drop semantics
        // without registering anything process-wide.
        Pool::new(Arc::clone(config))?.acquire().await
    }
}

/// Number of registered pools, for diagnostics.
#[must_use]
pub fn pool_count() -> usize {
    registry().lock().len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_shares_pool() {
        let a = Arc::new(
            Config::from_connection_string("Server=shared-host;User=u;Password=p").unwrap(),
        );
        let b = Arc::new(
            Config::from_connection_string(
                "Server=shared-host;User=u;Password=p;Pooling=true",
            )
            .unwrap(),
        );

        let pool_a = pool_for(&a).unwrap();
        let pool_b = pool_for(&b).unwrap();
        assert_eq!(pool_a.config().pool_key(), pool_b.config().pool_key());

        let c = Arc::new(
            Config::from_connection_string("Server=other-host;User=u;Password=p").unwrap(),
        );
        let pool_c = pool_for(&c).unwrap();
        assert_ne!(pool_a.config().pool_key(), pool_c.config().pool_key());
    }
}
