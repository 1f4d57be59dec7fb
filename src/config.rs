// Configuration module for anilist-schedule-proxy
// Handles the TOML configuration file and environment overrides

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::rate_limiter::RateLimitPolicy;

const APP_NAME: &str = "anilist-schedule-proxy";
const CONFIG_FILENAME: &str = "config.toml";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Server configuration
    pub server: ServerConfig,

    /// AniList endpoint and credentials
    pub upstream: UpstreamConfig,

    /// Remote backlog list
    pub backlog: BacklogConfig,

    /// Cache lifetimes
    pub cache: CacheConfig,

    /// Outbound AniList throttling
    pub rate_limit: RateLimitConfig,

    /// Schedule building
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 3000)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// GraphQL endpoint
    pub api_url: String,

    /// OAuth token endpoint for the client-credentials grant
    pub token_url: String,

    /// OAuth client id (optional)
    pub client_id: Option<String>,

    /// OAuth client secret (optional)
    pub client_secret: Option<String>,

    /// Pre-issued access token (optional, wins over client credentials)
    pub access_token: Option<String>,

    /// Timeout applied to every outbound request
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: "https://graphql.anilist.co".to_string(),
            token_url: "https://anilist.co/api/v2/oauth/token".to_string(),
            client_id: None,
            client_secret: None,
            access_token: None,
            request_timeout_secs: 30,
        }
    }
}

// Secrets stay out of Debug output
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BacklogConfig {
    /// URL of the JSON backlog (array of {title, category})
    pub url: Option<String>,

    /// Give up on the backlog fetch after this many seconds (default: 8)
    pub timeout_secs: u64,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of the whole schedule and of each per-title lookup (default: 1 hour)
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum gap between two AniList calls (default: 700ms)
    pub min_spacing_ms: u64,

    /// Calls allowed per window (default: 90, AniList's per-minute quota)
    pub max_per_window: usize,

    /// Window length in seconds (default: 60)
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let policy = RateLimitPolicy::default();
        Self {
            min_spacing_ms: policy.min_spacing.as_millis() as u64,
            max_per_window: policy.max_per_window,
            window_secs: policy.window.as_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            min_spacing: Duration::from_millis(self.min_spacing_ms),
            max_per_window: self.max_per_window.max(1),
            window: Duration::from_secs(self.window_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Titles resolved concurrently during a build (default: 1)
    /// Every lookup still goes through the shared rate limiter
    pub concurrency: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server port
    pub port: u16,

    /// Bind address
    pub bind_address: String,

    pub upstream: UpstreamConfig,
    pub backlog: BacklogConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir);
        Self::build(config_file)
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        // Environment variable takes priority
        if let Ok(path) = std::env::var("ANILIST_PROXY_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        // Then XDG config dir
        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        // Fallback to current directory
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Load and parse the TOML config file
    fn load_config_file(config_dir: &std::path::Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    /// Build configuration from config file with environment overrides
    fn build(config_file: ConfigFile) -> Self {
        let ConfigFile {
            server,
            mut upstream,
            mut backlog,
            cache,
            rate_limit,
            schedule,
        } = config_file;

        // Port: env > config > default
        let port = Self::env_port().unwrap_or(server.port);

        // Bind address: env > config > default
        let bind_address =
            Self::env_var("ANILIST_PROXY_BIND_ADDRESS").unwrap_or(server.bind_address);

        if let Some(url) = Self::env_var("ANILIST_API_URL") {
            upstream.api_url = url;
        }

        // Secrets: env > config, never defaulted
        upstream.client_id = Self::env_var("ANILIST_CLIENT_ID").or(upstream.client_id);
        upstream.client_secret = Self::env_var("ANILIST_CLIENT_SECRET").or(upstream.client_secret);
        upstream.access_token = Self::env_var("ANILIST_ACCESS_TOKEN").or(upstream.access_token);

        backlog.url = Self::env_var("BACKLOG_URL").or(backlog.url);

        Self {
            port,
            bind_address,
            upstream,
            backlog,
            cache,
            rate_limit,
            schedule,
        }
    }

    fn env_port() -> Option<u16> {
        std::env::var("PORT").ok().and_then(|p| p.parse().ok())
    }

    fn env_var(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn backlog_timeout(&self) -> Duration {
        Duration::from_secs(self.backlog.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.request_timeout_secs)
    }

    /// Log configuration status
    pub fn log_config(&self) {
        tracing::info!("Server listening on {}:{}", self.bind_address, self.port);
        tracing::info!("AniList endpoint: {}", self.upstream.api_url);

        match self.backlog.url {
            Some(ref url) => tracing::info!("Backlog source: {}", url),
            None => {
                tracing::warn!("No backlog URL configured, schedule builds will fail");
                tracing::info!("Hint: Add backlog.url to config.toml or set BACKLOG_URL env var");
            }
        }

        tracing::info!(
            "Cache TTL: {}s, backlog timeout: {}s",
            self.cache.ttl_secs,
            self.backlog.timeout_secs
        );
        tracing::debug!(
            "Rate limit: {}ms spacing, {} calls per {}s, concurrency {}",
            self.rate_limit.min_spacing_ms,
            self.rate_limit.max_per_window,
            self.rate_limit.window_secs,
            self.schedule.concurrency
        );
    }
}
