//! Configuration management for Quotebook services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    pub redis: RedisConfig,

    /// Public site settings
    #[serde(default)]
    pub site: SiteConfig,

    /// Content listing and sitemap tuning
    #[serde(default)]
    pub content: ContentConfig,

    /// Search index integration
    #[serde(default)]
    pub search: SearchConfig,

    /// In-process outbox queues
    #[serde(default)]
    pub queue: QueueConfig,

    /// Review policy for new content
    #[serde(default)]
    pub review: ReviewConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations on startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis URL
    pub url: String,

    /// Default TTL in seconds
    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,

    /// Prefix applied to every cache key
    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Expose base-62 short ids instead of raw numeric ids
    #[serde(default = "default_enabled")]
    pub short_id_enabled: bool,

    /// Public site URL used in links and notifications
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Default response language
    #[serde(default = "default_lang")]
    pub default_lang: String,
}

/// A configured close reason
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CloseReasonConfig {
    /// Id submitted by clients as `close_type`
    pub id: i32,
    /// Reason key, e.g. `reason.duplicate`
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Window applied to the `hot` ordering
    #[serde(default = "default_hot_in_days")]
    pub hot_in_days: i64,

    /// Maximum entries in a single sitemap page
    #[serde(default = "default_sitemap_max_size")]
    pub sitemap_max_size: u64,

    #[serde(default = "default_sitemap_cache_ttl")]
    pub sitemap_cache_ttl_secs: u64,

    /// Interval between sitemap refreshes (0 disables the cron)
    #[serde(default = "default_sitemap_interval")]
    pub sitemap_interval_secs: u64,

    #[serde(default = "default_similar_page_size")]
    pub similar_page_size: u64,

    #[serde(default = "default_title_search_limit")]
    pub title_search_limit: u64,

    #[serde(default = "default_close_reasons")]
    pub close_reasons: Vec<CloseReasonConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Search provider: none, http
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// Indexing endpoint for the http provider
    pub endpoint: Option<String>,

    /// API key sent as a bearer token
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Give up retrying after this many seconds
    #[serde(default = "default_search_max_elapsed")]
    pub max_elapsed_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Capacity of each outbox channel
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Upper bound on redelivery attempts per message
    #[serde(default = "default_queue_max_delivery")]
    pub max_delivery_secs: u64,

    /// Endpoint receiving external notifications (webhook)
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewConfig {
    /// Publish content from every user without moderation
    #[serde(default)]
    pub auto_approve: bool,

    /// Edits from these roles are applied without review
    #[serde(default = "default_trusted_roles")]
    pub trusted_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_redis_ttl() -> u64 { 300 }
fn default_cache_prefix() -> String { "quotebook".to_string() }
fn default_site_url() -> String { "http://localhost:8080".to_string() }
fn default_lang() -> String { "en_US".to_string() }
fn default_page_size() -> u64 { 20 }
fn default_hot_in_days() -> i64 { 90 }
fn default_sitemap_max_size() -> u64 { 50_000 }
fn default_sitemap_cache_ttl() -> u64 { 3600 }
fn default_sitemap_interval() -> u64 { 3600 }
fn default_similar_page_size() -> u64 { 6 }
fn default_title_search_limit() -> u64 { 10 }
fn default_search_provider() -> String { "none".to_string() }
fn default_search_timeout() -> u64 { 10 }
fn default_search_max_elapsed() -> u64 { 30 }
fn default_queue_capacity() -> usize { 1024 }
fn default_queue_max_delivery() -> u64 { 60 }
fn default_trusted_roles() -> Vec<String> { vec!["admin".to_string(), "moderator".to_string()] }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_request_id_header() -> String { "X-Request-ID".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "quotebook".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

fn default_close_reasons() -> Vec<CloseReasonConfig> {
    [
        (1, "reason.duplicate", "duplicate", "This item already exists elsewhere."),
        (2, "reason.off_topic", "off topic", "This item does not belong on this site."),
        (3, "reason.not_clarity", "not clarity", "This item needs details or clarity."),
        (4, "reason.something", "something else", "This item needs attention for another reason."),
    ]
    .into_iter()
    .map(|(id, key, name, description)| CloseReasonConfig {
        id,
        key: key.to_string(),
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            short_id_enabled: default_enabled(),
            site_url: default_site_url(),
            default_lang: default_lang(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            hot_in_days: default_hot_in_days(),
            sitemap_max_size: default_sitemap_max_size(),
            sitemap_cache_ttl_secs: default_sitemap_cache_ttl(),
            sitemap_interval_secs: default_sitemap_interval(),
            similar_page_size: default_similar_page_size(),
            title_search_limit: default_title_search_limit(),
            close_reasons: default_close_reasons(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_search_timeout(),
            max_elapsed_secs: default_search_max_elapsed(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_delivery_secs: default_queue_max_delivery(),
            webhook_url: None,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            trusted_roles: default_trusted_roles(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("auth.jwt_expiration_secs", 3600)?
            .set_default("observability.log_level", "info")?
            .set_default("rate_limit.enabled", true)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl ContentConfig {
    pub fn sitemap_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.sitemap_cache_ttl_secs)
    }

    /// Look up a configured close reason by id
    pub fn close_reason(&self, id: i32) -> Option<&CloseReasonConfig> {
        self.close_reasons.iter().find(|r| r.id == id)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/quotebook".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: default_enabled(),
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                default_ttl_secs: default_redis_ttl(),
                key_prefix: default_cache_prefix(),
            },
            site: SiteConfig::default(),
            content: ContentConfig::default(),
            search: SearchConfig::default(),
            queue: QueueConfig::default(),
            review: ReviewConfig::default(),
            auth: AuthConfig {
                jwt_secret: None,
                jwt_expiration_secs: default_jwt_expiration(),
                request_id_header: default_request_id_header(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: default_rate_limit(),
                burst: default_burst(),
                enabled: default_enabled(),
            },
        }
    }
}
