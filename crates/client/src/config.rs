//! Configuration system for webterm
//!
//! Reads config from ~/.config/webterm/config.toml

use std::path::PathBuf;

/// Host endpoint configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ws_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:9001".to_string(),
        }
    }
}

/// Reconnect backoff configuration
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    /// Fraction of the raw delay added as random jitter, clamped to [0, 1].
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            max_attempts: 5,
            jitter: 0.25,
        }
    }
}

/// Offline input buffering configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub queue_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub reconnect: ReconnectConfig,
    pub input: InputConfig,
}

impl Config {
    /// Load configuration from default path
    pub fn load() -> Self {
        let config_path = Self::default_config_path();
        Self::load_from_path(&config_path).unwrap_or_default()
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webterm")
            .join("config.toml")
    }

    /// Load from specific path (simple key=value parsing)
    pub fn load_from_path(path: &PathBuf) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;

        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "ws_url" => {
                        config.server.ws_url = value.to_string();
                    }
                    "base_delay_ms" => {
                        if let Ok(ms) = value.parse() {
                            config.reconnect.base_delay_ms = ms;
                        }
                    }
                    "max_delay_ms" => {
                        if let Ok(ms) = value.parse() {
                            config.reconnect.max_delay_ms = ms;
                        }
                    }
                    "max_attempts" => {
                        if let Ok(n) = value.parse() {
                            config.reconnect.max_attempts = n;
                        }
                    }
                    "jitter" => {
                        if let Ok(frac) = value.parse() {
                            config.reconnect.jitter = frac;
                        }
                    }
                    "queue_capacity" => {
                        if let Ok(cap) = value.parse() {
                            config.input.queue_capacity = cap;
                        }
                    }
                    _ => {}
                }
            }
        }

        Some(config)
    }

    /// Create default config file if it doesn't exist
    pub fn create_default_if_missing() {
        let path = Self::default_config_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let default_config = r#"# webterm Configuration

[server]
ws_url = "ws://127.0.0.1:9001"

[reconnect]
base_delay_ms = 500
max_delay_ms = 10000
max_attempts = 5
jitter = 0.25

[input]
queue_capacity = 256
"#;
            let _ = std::fs::write(&path, default_config);
        }
    }
}
