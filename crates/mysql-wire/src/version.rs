//! Server version banner parsing.

use crate::prelude::*;

use core::fmt;

/// Server vendor inferred from the version banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// Oracle MySQL (also reported by compatible proxies).
    MySql,
    /// MariaDB, detected via the `5.5.5-` replication-compatibility prefix
    /// or a `MariaDB` suffix in the banner.
    MariaDb,
    /// Amazon Aurora MySQL-compatible edition.
    Aurora,
}

/// Parsed server version from the initial handshake banner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerVersion {
    /// Major version component.
    pub major: u16,
    /// Minor version component.
    pub minor: u16,
    /// Patch version component.
    pub patch: u16,
    /// Detected vendor.
    pub vendor: Vendor,
    /// The raw banner string as sent by the server.
    pub banner: String,
}

impl ServerVersion {
    /// Parse a version banner such as `8.0.34`, `5.5.5-10.6.12-MariaDB`,
    /// or `5.7.12-log`.
    ///
    /// Unparseable numeric components default to zero rather than failing:
    /// the banner is informational and must not abort a handshake.
    #[must_use]
    pub fn parse(banner: &str) -> Self {
        let mut effective = banner;
        let mut vendor = Vendor::MySql;

        // MariaDB >= 10 masquerades as 5.5.5 for old replication clients.
        if let Some(rest) = banner.strip_prefix("5.5.5-") {
            effective = rest;
            vendor = Vendor::MariaDb;
        }
        if banner.to_ascii_lowercase().contains("mariadb") {
            vendor = Vendor::MariaDb;
        }
        if banner.to_ascii_lowercase().contains("aurora") {
            vendor = Vendor::Aurora;
        }

        let numeric: &str = effective
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or("");
        let mut parts = numeric.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

        Self {
            major,
            minor,
            patch,
            vendor,
            banner: banner.to_owned(),
        }
    }

    /// Whether this version is at least `major.minor.patch`.
    #[must_use]
    pub fn at_least(&self, major: u16, minor: u16, patch: u16) -> bool {
        (self.major, self.minor, self.patch) >= (major, minor, patch)
    }

    /// Whether the server understands `COM_RESET_CONNECTION`.
    ///
    /// MySQL gained it in 5.7.3, MariaDB in 10.2.4.
    #[must_use]
    pub fn supports_reset_connection(&self) -> bool {
        match self.vendor {
            Vendor::MariaDb => self.at_least(10, 2, 4),
            Vendor::MySql | Vendor::Aurora => self.at_least(5, 7, 3),
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mysql() {
        let v = ServerVersion::parse("8.0.34");
        assert_eq!((v.major, v.minor, v.patch), (8, 0, 34));
        assert_eq!(v.vendor, Vendor::MySql);
        assert!(v.supports_reset_connection());
    }

    #[test]
    fn test_parse_mysql_with_suffix() {
        let v = ServerVersion::parse("5.7.12-log");
        assert_eq!((v.major, v.minor, v.patch), (5, 7, 12));
        assert_eq!(v.vendor, Vendor::MySql);
    }

    #[test]
    fn test_parse_mariadb_masquerade() {
        let v = ServerVersion::parse("5.5.5-10.6.12-MariaDB");
        assert_eq!((v.major, v.minor, v.patch), (10, 6, 12));
        assert_eq!(v.vendor, Vendor::MariaDb);
        assert!(v.supports_reset_connection());
    }

    #[test]
    fn test_parse_old_mysql_lacks_reset() {
        let v = ServerVersion::parse("5.6.51");
        assert!(!v.supports_reset_connection());
    }

    #[test]
    fn test_parse_garbage_defaults_to_zero() {
        let v = ServerVersion::parse("weird");
        assert_eq!((v.major, v.minor, v.patch), (0, 0, 0));
    }
}
