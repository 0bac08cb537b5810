//! Configuration shared by IndieAuth clients and servers.

use std::time::Duration;

/// Default values.
pub mod defaults {
    use std::time::Duration;

    /// User agent sent on every outbound request.
    pub const USER_AGENT: &str = concat!("indieauth-rs/", env!("CARGO_PKG_VERSION"));

    /// Authorization code lifetime: 10 minutes.
    pub const AUTHORIZATION_CODE_TTL: Duration = Duration::from_secs(600);

    /// Access token lifetime: 24 hours.
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);

    /// Maximum number of pending codes and of live tokens held in memory.
    pub const STORE_MAX_CAPACITY: u64 = 10_000;

    /// Keepalive expiry for pooled connections.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);
}

/// IndieAuth configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Reject authorization requests and exchanges that do not use PKCE.
    pub require_pkce: bool,

    /// Overall timeout for each outbound request. `None` leaves deadlines to the
    /// caller.
    pub request_timeout: Option<Duration>,

    /// Connection timeout for outbound requests.
    pub connect_timeout: Option<Duration>,

    /// User agent for outbound requests.
    pub user_agent: String,

    /// How long an issued authorization code can be redeemed.
    pub authorization_code_ttl: Duration,

    /// How long an issued access token stays valid.
    pub access_token_ttl: Duration,

    /// Capacity of the in-memory authorization store.
    pub store_max_capacity: u64,
}

impl Config {
    /// Create a new configuration.
    #[must_use]
    pub fn new(require_pkce: bool) -> Self {
        Self {
            require_pkce,
            request_timeout: None,
            connect_timeout: None,
            user_agent: defaults::USER_AGENT.to_string(),
            authorization_code_ttl: defaults::AUTHORIZATION_CODE_TTL,
            access_token_ttl: defaults::ACCESS_TOKEN_TTL,
            store_max_capacity: defaults::STORE_MAX_CAPACITY,
        }
    }

    /// Create a test configuration with short timeouts.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(5)),
            connect_timeout: Some(Duration::from_secs(2)),
            ..Self::new(true)
        }
    }

    /// Create configuration from environment variables.
    ///
    /// - `INDIEAUTH_REQUIRE_PKCE`: `true`/`false` (default `true`)
    /// - `INDIEAUTH_REQUEST_TIMEOUT_SECS`, `INDIEAUTH_CONNECT_TIMEOUT_SECS`
    /// - `INDIEAUTH_CODE_TTL_SECS`, `INDIEAUTH_TOKEN_TTL_SECS`
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_var::<bool>("INDIEAUTH_REQUIRE_PKCE")? {
            config.require_pkce = v;
        }
        if let Some(secs) = env_var::<u64>("INDIEAUTH_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = env_var::<u64>("INDIEAUTH_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = env_var::<u64>("INDIEAUTH_CODE_TTL_SECS")? {
            config.authorization_code_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_var::<u64>("INDIEAUTH_TOKEN_TTL_SECS")? {
            config.access_token_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Build the HTTP client described by this configuration.
    ///
    /// Each call returns a new client; nothing is shared process-wide.
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialised.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .pool_idle_timeout(defaults::KEEPALIVE_EXPIRY)
            .gzip(true);

        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        builder.build()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(true)
    }
}

fn env_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw.trim().parse::<T>().map_err(|e| anyhow::anyhow!("{name}: {e}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}
