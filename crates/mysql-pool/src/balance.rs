//! Host selection and quarantine for multi-host configurations.

use std::time::{Duration, Instant};

use mysql_client::LoadBalance;
use parking_lot::Mutex;
use rand::Rng;

/// Base quarantine after the first consecutive failure; doubles per
/// failure up to [`MAX_BACKOFF`].
const BASE_BACKOFF: Duration = Duration::from_secs(5);
/// Ceiling for the exponential backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct HostState {
    host: String,
    /// Sessions currently open against this host.
    open: u32,
    /// Consecutive connect failures.
    failures: u32,
    /// Quarantined until this instant, if failing.
    quarantined_until: Option<Instant>,
}

impl HostState {
    fn is_quarantined(&self, now: Instant) -> bool {
        self.quarantined_until.is_some_and(|until| until > now)
    }
}

/// Tracks per-host health and orders connection attempts per the
/// configured policy.
pub struct HostBalancer {
    policy: LoadBalance,
    hosts: Mutex<Vec<HostState>>,
    /// Rotation cursor for round-robin.
    cursor: Mutex<usize>,
}

impl HostBalancer {
    /// Create a balancer over the configured host list.
    #[must_use]
    pub fn new(hosts: &[String], policy: LoadBalance) -> Self {
        Self {
            policy,
            hosts: Mutex::new(
                hosts
                    .iter()
                    .map(|host| HostState {
                        host: host.clone(),
                        open: 0,
                        failures: 0,
                        quarantined_until: None,
                    })
                    .collect(),
            ),
            cursor: Mutex::new(0),
        }
    }

    /// Hosts to try for a new connection, best candidate first.
    ///
    /// Quarantined hosts sort last rather than disappearing: with every
    /// host failing there is nothing better to try.
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        let now = Instant::now();
        let hosts = self.hosts.lock();
        let mut order: Vec<usize> = (0..hosts.len()).collect();

        match self.policy {
            LoadBalance::RoundRobin => {
                let mut cursor = self.cursor.lock();
                let start = *cursor % hosts.len().max(1);
                *cursor = cursor.wrapping_add(1);
                order.rotate_left(start);
            }
            LoadBalance::FailOver => {
                // Configured order is the preference order.
            }
            LoadBalance::Random => {
                let mut rng = rand::thread_rng();
                for i in (1..order.len()).rev() {
                    order.swap(i, rng.gen_range(0..=i));
                }
            }
            LoadBalance::LeastConnections => {
                order.sort_by_key(|&i| hosts[i].open);
            }
        }

        order.sort_by_key(|&i| hosts[i].is_quarantined(now));
        order.into_iter().map(|i| hosts[i].host.clone()).collect()
    }

    /// Record a successful connection.
    pub fn report_success(&self, host: &str) {
        let mut hosts = self.hosts.lock();
        if let Some(state) = hosts.iter_mut().find(|s| s.host == host) {
            state.open += 1;
            state.failures = 0;
            state.quarantined_until = None;
        }
    }

    /// Record a connect failure, extending the host's quarantine.
    pub fn report_failure(&self, host: &str) {
        let mut hosts = self.hosts.lock();
        if let Some(state) = hosts.iter_mut().find(|s| s.host == host) {
            state.failures = state.failures.saturating_add(1);
            let backoff = BASE_BACKOFF
                .saturating_mul(1u32 << state.failures.saturating_sub(1).min(16))
                .min(MAX_BACKOFF);
            state.quarantined_until = Some(Instant::now() + backoff);
            tracing::warn!(
                host = %state.host,
                failures = state.failures,
                backoff_secs = backoff.as_secs(),
                "host quarantined"
            );
        }
    }

    /// Record a session against this host going away.
    pub fn on_session_closed(&self, host: &str) {
        let mut hosts = self.hosts.lock();
        if let Some(state) = hosts.iter_mut().find(|s| s.host == host) {
            state.open = state.open.saturating_sub(1);
        }
    }

    /// Hosts currently under quarantine, for the background prober.
    #[must_use]
    pub fn quarantined_hosts(&self) -> Vec<String> {
        let now = Instant::now();
        self.hosts
            .lock()
            .iter()
            .filter(|s| s.is_quarantined(now))
            .map(|s| s.host.clone())
            .collect()
    }

    /// Lift a host's quarantine after a successful probe.
    pub fn mark_healthy(&self, host: &str) {
        let mut hosts = self.hosts.lock();
        if let Some(state) = hosts.iter_mut().find(|s| s.host == host) {
            state.failures = 0;
            state.quarantined_until = None;
            tracing::info!(host = %state.host, "host recovered from quarantine");
        }
    }
}

impl std::fmt::Debug for HostBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBalancer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_round_robin_rotates() {
        let balancer = HostBalancer::new(&hosts(&["a", "b", "c"]), LoadBalance::RoundRobin);
        assert_eq!(balancer.candidates()[0], "a");
        assert_eq!(balancer.candidates()[0], "b");
        assert_eq!(balancer.candidates()[0], "c");
        assert_eq!(balancer.candidates()[0], "a");
    }

    #[test]
    fn test_failover_keeps_order() {
        let balancer = HostBalancer::new(&hosts(&["primary", "standby"]), LoadBalance::FailOver);
        assert_eq!(balancer.candidates(), vec!["primary", "standby"]);
        assert_eq!(balancer.candidates(), vec!["primary", "standby"]);
    }

    #[test]
    fn test_quarantined_host_sorts_last() {
        let balancer = HostBalancer::new(&hosts(&["primary", "standby"]), LoadBalance::FailOver);
        balancer.report_failure("primary");
        assert_eq!(balancer.candidates(), vec!["standby", "primary"]);
        assert_eq!(balancer.quarantined_hosts(), vec!["primary"]);

        balancer.mark_healthy("primary");
        assert_eq!(balancer.candidates(), vec!["primary", "standby"]);
    }

    #[test]
    fn test_least_connections_prefers_idle_host() {
        let balancer =
            HostBalancer::new(&hosts(&["a", "b"]), LoadBalance::LeastConnections);
        balancer.report_success("a");
        balancer.report_success("a");
        balancer.report_success("b");
        assert_eq!(balancer.candidates()[0], "b");

        balancer.on_session_closed("a");
        balancer.on_session_closed("a");
        assert_eq!(balancer.candidates()[0], "a");
    }

    #[test]
    fn test_backoff_grows() {
        let balancer = HostBalancer::new(&hosts(&["a"]), LoadBalance::RoundRobin);
        balancer.report_failure("a");
        let first = balancer.hosts.lock()[0].quarantined_until.unwrap();
        balancer.report_failure("a");
        let second = balancer.hosts.lock()[0].quarantined_until.unwrap();
        assert!(second > first);
    }
}
