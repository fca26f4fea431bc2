//! Hub configuration
//!
//! All settings can be overridden through environment variables:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | HUB_LISTEN_ADDR | 0.0.0.0:7411 | Job channel TCP listen address |
//! | CHANNEL_CAPACITY | 1024 | Broadcast channel capacity |
//! | LOG_LEVEL | info | Tracing level filter |
//! | LOG_DIR | (stdout) | Daily-rolling log file directory |

use crate::channel::TransportConfig;

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Job channel TCP listen address
    pub listen_addr: String,
    /// Broadcast channel capacity
    pub channel_capacity: usize,
    /// Tracing level filter
    pub log_level: String,
    /// Optional log file directory
    pub log_dir: Option<String>,
}

impl HubConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("HUB_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:7411".into()),
            channel_capacity: std::env::var("CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// Override the listen address (test scenarios)
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Build the transport configuration for the message bus
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tcp_listen_addr: self.listen_addr.clone(),
            channel_capacity: self.channel_capacity,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
