//! Process-wide authentication plugin registry.
//!
//! Lookup is by exact server-advertised plugin name. The registry is
//! read-often, write-rare: readers clone an `Arc` snapshot of the map
//! under a short read lock, writers copy the map, insert, and swap. The
//! built-ins are committed once before first use.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::caching_sha2::{self, CachingSha2Password};
use crate::clear::{self, ClearPassword};
use crate::error::{AuthError, Result};
use crate::native::{self, NativePassword};
use crate::plugin::AuthPlugin;
use crate::sha256::{self, Sha256Password};

/// Factory producing a fresh plugin state machine per handshake.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn AuthPlugin> + Send + Sync>;

type PluginMap = HashMap<&'static str, PluginFactory>;

static REGISTRY: OnceLock<RwLock<Arc<PluginMap>>> = OnceLock::new();

fn registry() -> &'static RwLock<Arc<PluginMap>> {
    REGISTRY.get_or_init(|| {
        let mut map: PluginMap = HashMap::new();
        map.insert(
            native::NAME,
            Arc::new(|| Box::new(NativePassword) as Box<dyn AuthPlugin>) as PluginFactory,
        );
        map.insert(
            caching_sha2::NAME,
            Arc::new(|| Box::new(CachingSha2Password::new()) as Box<dyn AuthPlugin>),
        );
        map.insert(
            sha256::NAME,
            Arc::new(|| Box::new(Sha256Password::new()) as Box<dyn AuthPlugin>),
        );
        map.insert(
            clear::NAME,
            Arc::new(|| Box::new(ClearPassword) as Box<dyn AuthPlugin>),
        );
        RwLock::new(Arc::new(map))
    })
}

/// Create a plugin instance for the named method.
pub fn create(plugin_name: &str) -> Result<Box<dyn AuthPlugin>> {
    let snapshot = {
        let guard = registry().read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    };
    snapshot
        .get(plugin_name)
        .map(|factory| factory())
        .ok_or_else(|| AuthError::UnknownPlugin(plugin_name.to_owned()))
}

/// Register a user-defined plugin under a wire name.
///
/// Replaces any existing registration with the same name; later sessions
/// pick up the new factory, in-flight handshakes keep the old one.
pub fn register(name: &'static str, factory: PluginFactory) {
    let lock = registry();
    let mut guard = lock.write().unwrap_or_else(|e| e.into_inner());
    let mut map: PluginMap = (**guard).clone();
    map.insert(name, factory);
    *guard = Arc::new(map);
    tracing::debug!(plugin = name, "registered authentication plugin");
}

/// Whether a plugin is registered under this name.
#[must_use]
pub fn is_registered(name: &str) -> bool {
    let guard = registry().read().unwrap_or_else(|e| e.into_inner());
    guard.contains_key(name)
}
