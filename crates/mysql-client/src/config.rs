//! Connection configuration and connection-string parsing.

use std::path::PathBuf;
use std::time::Duration;

use mysql_tls::{SslMode, TlsConfig};
use mysql_types::{DecodeOptions, GuidFormat};
use mysql_wire::Capabilities;
use mysql_wire::charset;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Host selection policy for multi-host configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadBalance {
    /// Rotate through healthy hosts.
    #[default]
    RoundRobin,
    /// Always prefer the first healthy host in order.
    FailOver,
    /// Pick a random healthy host.
    Random,
    /// Pick the healthy host with the fewest open sessions.
    LeastConnections,
}

impl std::str::FromStr for LoadBalance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "roundrobin" => Ok(Self::RoundRobin),
            "failover" => Ok(Self::FailOver),
            "random" => Ok(Self::Random),
            "leastconnections" => Ok(Self::LeastConnections),
            other => Err(format!("unrecognized load balance policy `{other}`")),
        }
    }
}

/// What happens when a command timeout fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancellationTimeout {
    /// Skip KILL QUERY entirely; the timeout immediately poisons the
    /// session. Corresponds to `Cancellation Timeout = -1`.
    PoisonImmediately,
    /// Issue KILL QUERY and wait this long for the server to confirm
    /// before giving up and poisoning.
    After(Duration),
}

impl Default for CancellationTimeout {
    fn default() -> Self {
        Self::After(Duration::from_secs(2))
    }
}

/// Callback supplying file content for `LOAD DATA LOCAL INFILE`.
///
/// Without a registered handler the driver terminates the upload with an
/// empty packet and surfaces a usage error, leaving the session usable.
#[derive(Clone)]
pub struct LocalInfileHandler(
    std::sync::Arc<dyn Fn(&str) -> std::io::Result<Vec<u8>> + Send + Sync>,
);

impl LocalInfileHandler {
    /// Wrap a callback that maps the server-requested filename to file
    /// content.
    pub fn new(
        f: impl Fn(&str) -> std::io::Result<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        Self(std::sync::Arc::new(f))
    }

    /// Produce the content for a requested filename.
    pub fn read(&self, filename: &str) -> std::io::Result<Vec<u8>> {
        (self.0)(filename)
    }
}

impl std::fmt::Debug for LocalInfileHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LocalInfileHandler(..)")
    }
}

/// Driver configuration, built from a connection string or the builder
/// methods.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server endpoints, tried per the load-balance policy.
    pub hosts: Vec<String>,
    /// TCP port, default 3306.
    pub port: u16,
    /// Path of a Unix domain socket; overrides hosts when set.
    pub unix_socket: Option<PathBuf>,
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Initial database.
    pub database: Option<String>,
    /// TLS policy.
    pub tls: TlsConfig,
    /// Negotiate the zlib compression envelope.
    pub use_compression: bool,
    /// Collation id requested at handshake.
    pub charset: u8,
    /// Budget for TCP + TLS + handshake.
    pub connect_timeout: Duration,
    /// Default per-command budget; `None` disables the timeout.
    pub command_timeout: Option<Duration>,
    /// Behavior when the command budget expires.
    pub cancellation_timeout: CancellationTimeout,
    /// Whether sessions are pooled at all.
    pub pooling: bool,
    /// Pool floor, eagerly filled by the background worker.
    pub min_pool_size: u32,
    /// Pool ceiling, a hard cap on live sessions.
    pub max_pool_size: u32,
    /// Recycle sessions older than this; `None` means no age limit.
    pub connection_lifetime: Option<Duration>,
    /// Reap sessions idle longer than this.
    pub connection_idle_timeout: Duration,
    /// Reset session state when a session returns to the pool.
    pub connection_reset: bool,
    /// Host selection policy.
    pub load_balance: LoadBalance,
    /// Permit `@user` variables in SQL text.
    pub allow_user_variables: bool,
    /// Return zero dates instead of erroring.
    pub allow_zero_datetime: bool,
    /// Convert zero dates to the minimum date instead of erroring.
    pub convert_zero_datetime: bool,
    /// GUID column interpretation.
    pub guid_format: GuidFormat,
    /// Connection attributes advertised at handshake.
    pub attributes: Vec<(String, String)>,
    /// LOCAL INFILE content provider.
    pub local_infile_handler: Option<LocalInfileHandler>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".into()],
            port: 3306,
            unix_socket: None,
            username: String::new(),
            password: String::new(),
            database: None,
            tls: TlsConfig::default(),
            use_compression: false,
            charset: charset::DEFAULT,
            connect_timeout: Duration::from_secs(15),
            command_timeout: Some(Duration::from_secs(30)),
            cancellation_timeout: CancellationTimeout::default(),
            pooling: true,
            min_pool_size: 0,
            max_pool_size: 100,
            connection_lifetime: None,
            connection_idle_timeout: Duration::from_secs(180),
            connection_reset: true,
            load_balance: LoadBalance::RoundRobin,
            allow_user_variables: false,
            allow_zero_datetime: false,
            convert_zero_datetime: false,
            guid_format: GuidFormat::Char36,
            attributes: vec![
                ("_client_name".into(), "rust-mysql-driver".into()),
                ("_client_version".into(), env!("CARGO_PKG_VERSION").into()),
            ],
            local_infile_handler: None,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "`{key}` expects a boolean, got `{other}`"
        ))),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("`{key}` expects an integer, got `{value}`")))
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("`{key}` expects seconds, got `{value}`")))
}

impl Config {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an ADO-style connection string: semicolon-separated
    /// `Key=Value` pairs with case-insensitive keys.
    pub fn from_connection_string(s: &str) -> Result<Self> {
        let mut config = Self::default();

        for pair in s.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("expected Key=Value, got `{pair}`")))?;
            let value = value.trim();
            let normalized = key.trim().to_ascii_lowercase().replace([' ', '_'], "");

            match normalized.as_str() {
                "server" | "host" | "datasource" | "address" => {
                    config.hosts = value
                        .split(',')
                        .map(|h| h.trim().to_owned())
                        .filter(|h| !h.is_empty())
                        .collect();
                    if config.hosts.is_empty() {
                        return Err(Error::Config("`Server` lists no hosts".into()));
                    }
                }
                "port" => {
                    config.port = value.parse().map_err(|_| {
                        Error::Config(format!("`Port` expects a port number, got `{value}`"))
                    })?;
                }
                "userid" | "user" | "username" | "uid" => config.username = value.to_owned(),
                "password" | "pwd" => config.password = value.to_owned(),
                "database" | "initialcatalog" => {
                    config.database = (!value.is_empty()).then(|| value.to_owned());
                }
                "unixsocket" | "socket" => {
                    config.unix_socket = (!value.is_empty()).then(|| PathBuf::from(value));
                }
                "sslmode" => {
                    config.tls.mode = value
                        .parse::<SslMode>()
                        .map_err(Error::Config)?;
                }
                "sslca" | "cafile" | "certificatefile" => {
                    config.tls.ca_file = Some(PathBuf::from(value));
                }
                "pooling" => config.pooling = parse_bool(key, value)?,
                "minimumpoolsize" | "minpoolsize" => {
                    config.min_pool_size = parse_u32(key, value)?;
                }
                "maximumpoolsize" | "maxpoolsize" => {
                    config.max_pool_size = parse_u32(key, value)?;
                }
                "connectionlifetime" => {
                    let secs = parse_secs(key, value)?;
                    config.connection_lifetime = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "connectionidletimeout" => {
                    config.connection_idle_timeout = Duration::from_secs(parse_secs(key, value)?);
                }
                "connectionreset" => config.connection_reset = parse_bool(key, value)?,
                "loadbalance" => {
                    config.load_balance = value
                        .parse::<LoadBalance>()
                        .map_err(Error::Config)?;
                }
                "allowuservariables" => config.allow_user_variables = parse_bool(key, value)?,
                "allowzerodatetime" => config.allow_zero_datetime = parse_bool(key, value)?,
                "convertzerodatetime" => config.convert_zero_datetime = parse_bool(key, value)?,
                "connectiontimeout" | "connecttimeout" => {
                    config.connect_timeout = Duration::from_secs(parse_secs(key, value)?);
                }
                "defaultcommandtimeout" | "commandtimeout" => {
                    let secs = parse_secs(key, value)?;
                    config.command_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "cancellationtimeout" => {
                    let parsed: i64 = value.trim().parse().map_err(|_| {
                        Error::Config(format!("`Cancellation Timeout` got `{value}`"))
                    })?;
                    config.cancellation_timeout = if parsed < 0 {
                        CancellationTimeout::PoisonImmediately
                    } else {
                        CancellationTimeout::After(Duration::from_secs(parsed as u64))
                    };
                }
                "characterset" | "charset" => {
                    config.charset = charset::from_name(value).ok_or_else(|| {
                        Error::Config(format!("unrecognized character set `{value}`"))
                    })?;
                }
                "usecompression" | "compress" => config.use_compression = parse_bool(key, value)?,
                "guidformat" => {
                    config.guid_format = match value
                        .trim()
                        .to_ascii_lowercase()
                        .replace([' ', '_'], "")
                        .as_str()
                    {
                        "none" => GuidFormat::None,
                        "char36" | "default" => GuidFormat::Char36,
                        "binary16" => GuidFormat::Binary16,
                        "littleendianbinary16" => GuidFormat::LittleEndianBinary16,
                        "timeswapbinary16" => GuidFormat::TimeSwapBinary16,
                        other => {
                            return Err(Error::Config(format!(
                                "unrecognized GUID format `{other}`"
                            )));
                        }
                    };
                }
                other => {
                    return Err(Error::Config(format!(
                        "unrecognized connection string key `{other}`"
                    )));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.max_pool_size == 0 {
            return Err(Error::Config("Maximum Pool Size must be at least 1".into()));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(Error::Config(
                "Minimum Pool Size cannot exceed Maximum Pool Size".into(),
            ));
        }
        if self.hosts.is_empty() && self.unix_socket.is_none() {
            return Err(Error::Config("no server endpoint configured".into()));
        }
        Ok(())
    }

    /// The capability set this configuration asks the server for.
    #[must_use]
    pub fn desired_capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::client_default();
        if self.database.is_some() {
            caps |= Capabilities::CONNECT_WITH_DB;
        }
        if self.use_compression {
            caps |= Capabilities::COMPRESS;
        }
        if self.tls.mode.allows_tls() {
            caps |= Capabilities::SSL;
        }
        caps
    }

    /// Decoding options derived from this configuration.
    #[must_use]
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            allow_zero_datetime: self.allow_zero_datetime,
            convert_zero_datetime: self.convert_zero_datetime,
            guid_format: self.guid_format,
        }
    }

    /// Normalized pool identity: configurations with equal keys share a
    /// pool.
    #[must_use]
    pub fn pool_key(&self) -> PoolKey {
        let mut hasher = Sha256::new();
        hasher.update(self.password.as_bytes());
        let password_hash: [u8; 32] = hasher.finalize().into();

        let mut hosts = self.hosts.clone();
        hosts.sort();

        PoolKey {
            hosts,
            port: self.port,
            unix_socket: self.unix_socket.clone(),
            username: self.username.clone(),
            password_hash,
            database: self.database.clone(),
            charset: self.charset,
            ssl_mode: self.tls.mode,
            use_compression: self.use_compression,
            connection_reset: self.connection_reset,
        }
    }

    /// Builder: set the single host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts = vec![host.into()];
        self
    }

    /// Builder: set the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder: set the user name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Builder: set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Builder: set the initial database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Builder: set the TLS mode.
    #[must_use]
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.tls.mode = mode;
        self
    }

    /// Builder: set the per-command timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Normalized identity tuple of a connection configuration.
///
/// Two configurations with identical pool keys share one pool for the
/// lifetime of the process. The password participates as a hash so keys
/// can be logged and compared without holding the secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    /// Sorted endpoint list.
    pub hosts: Vec<String>,
    /// TCP port.
    pub port: u16,
    /// Unix socket path, if configured.
    pub unix_socket: Option<PathBuf>,
    /// User name.
    pub username: String,
    /// SHA-256 of the password.
    pub password_hash: [u8; 32],
    /// Initial database.
    pub database: Option<String>,
    /// Collation id.
    pub charset: u8,
    /// TLS policy.
    pub ssl_mode: SslMode,
    /// Compression envelope flag.
    pub use_compression: bool,
    /// Reset-on-return flag.
    pub connection_reset: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_connection_string() {
        let config = Config::from_connection_string(
            "Server=db1.example.com,db2.example.com;Port=3307;User ID=app;Password=s3cret;\
             Database=orders;SSL Mode=Required;Maximum Pool Size=25",
        )
        .unwrap();

        assert_eq!(config.hosts, vec!["db1.example.com", "db2.example.com"]);
        assert_eq!(config.port, 3307);
        assert_eq!(config.username, "app");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.database.as_deref(), Some("orders"));
        assert_eq!(config.tls.mode, SslMode::Required);
        assert_eq!(config.max_pool_size, 25);
    }

    #[test]
    fn test_parse_timeouts_and_flags() {
        let config = Config::from_connection_string(
            "Host=localhost;User=root;Connection Timeout=5;Default Command Timeout=1;\
             Cancellation Timeout=-1;Use Compression=true;Allow Zero Datetime=yes;\
             Connection Reset=false;Load Balance=LeastConnections",
        )
        .unwrap();

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Some(Duration::from_secs(1)));
        assert_eq!(
            config.cancellation_timeout,
            CancellationTimeout::PoisonImmediately
        );
        assert!(config.use_compression);
        assert!(config.allow_zero_datetime);
        assert!(!config.connection_reset);
        assert_eq!(config.load_balance, LoadBalance::LeastConnections);
    }

    #[test]
    fn test_command_timeout_zero_disables() {
        let config =
            Config::from_connection_string("Host=h;User=u;Default Command Timeout=0").unwrap();
        assert_eq!(config.command_timeout, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            Config::from_connection_string("Host=h;Frobnicate=yes"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_pool_key_identity() {
        let a = Config::from_connection_string("Server=h2,h1;User=u;Password=p").unwrap();
        let b = Config::from_connection_string("Server=h1,h2;User=u;Password=p").unwrap();
        // Host order does not matter; the key is normalized.
        assert_eq!(a.pool_key(), b.pool_key());

        let c = Config::from_connection_string("Server=h1,h2;User=u;Password=other").unwrap();
        assert_ne!(a.pool_key(), c.pool_key());
    }

    #[test]
    fn test_pool_key_hides_password() {
        let config = Config::from_connection_string("Server=h;User=u;Password=topsecret").unwrap();
        let debug = format!("{:?}", config.pool_key());
        assert!(!debug.contains("topsecret"));
    }

    #[test]
    fn test_validate_pool_sizes() {
        let mut config = Config::default();
        config.min_pool_size = 10;
        config.max_pool_size = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_desired_capabilities() {
        let config = Config::default()
            .database("app")
            .ssl_mode(SslMode::Required);
        let caps = config.desired_capabilities();
        assert!(caps.contains(Capabilities::CONNECT_WITH_DB));
        assert!(caps.contains(Capabilities::SSL));
        assert!(!caps.contains(Capabilities::COMPRESS));
    }
}
