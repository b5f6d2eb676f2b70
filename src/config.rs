// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the FormGate relay.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the FormGate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Storage path: "memory" or a RocksDB directory (default: memory)
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Base URL of the dashboard, used for deep links in notification emails
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    /// Origins allowed to call the management API cross-origin
    #[serde(default = "default_dashboard_origins")]
    pub dashboard_origins: Vec<String>,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Origin resolution configuration
    #[serde(default)]
    pub origins: OriginConfig,

    /// Outbound mail configuration
    #[serde(default)]
    pub mail: MailConfig,
}

/// Fixed-window rate limiting configuration for the public intake endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window per source IP (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Interval between sweeps of stale window entries in seconds (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Origin resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Host suffixes accepted regardless of a form's allow-list.
    /// Covers the platform's own hosted preview domains; set empty to
    /// disable the exception entirely.
    #[serde(default = "default_trusted_suffixes")]
    pub trusted_suffixes: Vec<String>,
}

/// Outbound mail API configuration. Notifications are disabled unless
/// `api_key` and `sender` are both set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Mail API endpoint (default: Brevo transactional send)
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,

    /// Mail API key (default: empty, notifications disabled)
    #[serde(default)]
    pub api_key: String,

    /// Sender address (default: empty, notifications disabled)
    #[serde(default)]
    pub sender: String,

    /// Optional sender display name
    #[serde(default)]
    pub sender_name: Option<String>,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_db_path() -> String {
    "memory".to_string()
}

fn default_dashboard_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_dashboard_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_trusted_suffixes() -> Vec<String> {
    vec![".formgate.app".to_string()]
}

fn default_mail_api_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            dashboard_url: default_dashboard_url(),
            dashboard_origins: default_dashboard_origins(),
            rate_limit: RateLimitConfig::default(),
            origins: OriginConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            trusted_suffixes: default_trusted_suffixes(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: default_mail_api_url(),
            api_key: String::new(),
            sender: String::new(),
            sender_name: None,
        }
    }
}

impl RateLimitConfig {
    /// Get the window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(v) = std::env::var("BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Ok(v) = std::env::var("DB_PATH") {
            config.db_path = v;
        }
        if let Ok(v) = std::env::var("DASHBOARD_URL") {
            config.dashboard_url = v;
        }
        if let Ok(v) = std::env::var("DASHBOARD_ORIGINS") {
            config.dashboard_origins = split_list(&v);
        }
        if let Ok(v) = std::env::var("TRUSTED_ORIGIN_SUFFIXES") {
            config.origins.trusted_suffixes = split_list(&v);
        }
        if let Some(v) = env_parse("RATE_LIMIT_MAX_REQUESTS") {
            config.rate_limit.max_requests = v;
        }
        if let Some(v) = env_parse("RATE_LIMIT_WINDOW_SECS") {
            config.rate_limit.window_secs = v;
        }
        if let Some(v) = env_parse("RATE_LIMIT_SWEEP_INTERVAL_SECS") {
            config.rate_limit.sweep_interval_secs = v;
        }
        if let Ok(v) = std::env::var("MAIL_API_URL") {
            config.mail.api_url = v;
        }
        if let Ok(v) = std::env::var("MAIL_API_KEY") {
            config.mail.api_key = v;
        }
        if let Ok(v) = std::env::var("MAIL_SENDER") {
            config.mail.sender = v;
        }
        if let Ok(v) = std::env::var("MAIL_SENDER_NAME") {
            config.mail.sender_name = Some(v).filter(|s| !s.is_empty());
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
