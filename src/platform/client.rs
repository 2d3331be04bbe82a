//! Platform client configuration

/// Environment variable holding the platform API URL
pub const ENDPOINT_ENV: &str = "MLRUN_DBPATH";

/// Environment variable holding an optional bearer token
pub const TOKEN_ENV: &str = "MLRUN_AUTH_TOKEN";

/// Configuration for the platform client
#[derive(Debug, Clone)]
pub struct PlatformClientConfig {
    /// Base URL of the platform API (e.g. `http://mlrun-api:8080`)
    pub endpoint: Option<String>,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// Timeout for a single request in seconds
    pub timeout_secs: u64,

    /// Interval between build status polls in seconds
    pub poll_interval_secs: u64,

    /// Give up waiting for a build after this many seconds
    pub build_timeout_secs: u64,
}

impl Default for PlatformClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            timeout_secs: 300,
            poll_interval_secs: 5,
            build_timeout_secs: 3600,
        }
    }
}

impl PlatformClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with endpoint and token taken from the environment
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            endpoint: non_empty(ENDPOINT_ENV),
            token: non_empty(TOKEN_ENV),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval_secs: u64) -> Self {
        self.poll_interval_secs = poll_interval_secs;
        self
    }

    pub fn with_build_timeout(mut self, build_timeout_secs: u64) -> Self {
        self.build_timeout_secs = build_timeout_secs;
        self
    }
}
