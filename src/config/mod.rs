//! Settings: a preset per deployment stage with environment variables
//! layered on top. Read once into [`CONFIG`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::acl::Access;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub acl: AclConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" | "stage" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Paging bounds applied to every collection read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
    pub default_limit: Option<i32>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Response header carrying the request's cache tags
    pub cache_tag_header: String,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclConfig {
    /// Access granted on tables without an explicit rule
    pub default_access: Access,
}

const DEFAULT_TAG_HEADER: &str = "x-cache-tags";
const MB: usize = 1024 * 1024;

/// Parse `key` into `slot`, leaving it untouched when unset; unparsable values are logged and skipped
fn env_override<T: FromStr>(key: &str, slot: &mut T)
where
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(e) => tracing::warn!("Ignoring {}={:?}: {}", key, raw, e),
        }
    }
}

fn origins(list: &[&str]) -> Vec<String> {
    list.iter().map(|o| o.to_string()).collect()
}

impl AppConfig {
    /// Preset chosen by `APP_ENV`, with environment overrides applied
    pub fn from_env() -> Self {
        let environment = env::var("APP_ENV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Environment::Development);

        let mut config = Self::preset(environment);
        config.apply_env();
        config
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::development(),
            Environment::Staging => Self::staging(),
            Environment::Production => Self::production(),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.trim().parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEFAULT_LIMIT") {
            self.filter.default_limit = v.trim().parse().ok();
        }
        env_override("FILTER_DEBUG_LOGGING", &mut self.filter.debug_logging);

        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        env_override("DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections);
        env_override("DATABASE_CONNECTION_TIMEOUT", &mut self.database.connection_timeout);
        env_override("DATABASE_ENABLE_QUERY_LOGGING", &mut self.database.enable_query_logging);

        if let Some(header) = env::var("CACHE_TAG_HEADER").ok().filter(|v| !v.trim().is_empty()) {
            self.api.cache_tag_header = header.trim().to_ascii_lowercase();
        }
        env_override("API_ENABLE_REQUEST_LOGGING", &mut self.api.enable_request_logging);
        env_override("API_MAX_REQUEST_SIZE_BYTES", &mut self.api.max_request_size_bytes);

        env_override("SECURITY_ENABLE_CORS", &mut self.security.enable_cors);
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }

        env_override("ACL_DEFAULT_ACCESS", &mut self.acl.default_access);
    }

    /// Permissive local setup with a fixed signing secret
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig { max_limit: Some(1000), default_limit: None, debug_logging: true },
            database: DatabaseConfig { url: None, max_connections: 10, connection_timeout: 30, enable_query_logging: true },
            api: ApiConfig {
                cache_tag_header: DEFAULT_TAG_HEADER.to_string(),
                enable_request_logging: true,
                max_request_size_bytes: 10 * MB,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: origins(&["http://localhost:3000", "http://localhost:5173"]),
                jwt_secret: "development-secret".to_string(),
            },
            acl: AclConfig { default_access: Access::All },
        }
    }

    pub fn staging() -> Self {
        let base = Self::development();
        Self {
            environment: Environment::Staging,
            filter: FilterConfig { max_limit: Some(500), default_limit: Some(100), debug_logging: false },
            database: DatabaseConfig { max_connections: 20, connection_timeout: 10, ..base.database },
            api: ApiConfig { max_request_size_bytes: 5 * MB, ..base.api },
            security: SecurityConfig {
                cors_origins: origins(&["https://staging.example.com"]),
                jwt_secret: String::new(),
                ..base.security
            },
            acl: AclConfig { default_access: Access::Own },
        }
    }

    /// Strict limits, no query or request logging, deny-by-default tables
    pub fn production() -> Self {
        let base = Self::staging();
        Self {
            environment: Environment::Production,
            filter: FilterConfig { max_limit: Some(100), default_limit: Some(50), ..base.filter },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
                ..base.database
            },
            api: ApiConfig { enable_request_logging: false, max_request_size_bytes: 2 * MB, ..base.api },
            security: SecurityConfig { cors_origins: origins(&["https://app.example.com"]), ..base.security },
            acl: AclConfig { default_access: Access::None },
        }
    }
}

/// Process-wide settings, resolved on first access
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
