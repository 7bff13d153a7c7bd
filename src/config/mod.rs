use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub tracking: TrackingConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Visitor records older than this are evicted
    pub retention_hours: u64,
    /// Cadence of the cleanup task
    pub cleanup_interval_secs: u64,
    /// Deployment-supplied path prefixes that are never tracked
    /// (media and admin asset roots)
    pub untracked_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Collector account; the beacon is disabled entirely when unset
    pub account_id: Option<String>,
    pub endpoint: String,
    pub beacon_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./footfall.db".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()?;

        let retention_hours = std::env::var("TRACKING_RETENTION_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<u64>()?;
        let cleanup_interval_secs = std::env::var("CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()?;
        let untracked_prefixes = std::env::var("UNTRACKED_PREFIXES")
            .unwrap_or_else(|_| "/media/,/static/admin/".to_string())
            .split(',')
            .map(|prefix| prefix.trim().to_string())
            .filter(|prefix| !prefix.is_empty())
            .collect();

        let account_id = std::env::var("ANALYTICS_ACCOUNT_ID").ok();
        let endpoint = std::env::var("ANALYTICS_ENDPOINT")
            .unwrap_or_else(|_| "http://www.google-analytics.com/__utm.gif".to_string());
        let beacon_timeout_secs = std::env::var("BEACON_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()?;

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            tracking: TrackingConfig {
                retention_hours,
                cleanup_interval_secs,
                untracked_prefixes,
            },
            analytics: AnalyticsConfig {
                account_id,
                endpoint,
                beacon_timeout_secs,
            },
        })
    }
}
