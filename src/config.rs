//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `relay.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     `RELAY_*` environment overrides (secrets usually arrive that way).
//!
//! structure:
//!     - ServerConfig: Where the HTTP front door listens.
//!     - StorageConfig: Which backend persists readings (influx or memory).
//!     - InfluxConfig: URL, token, org and bucket of the time-series store.
//!     - ViewersConfig: Per-session queue depth for live viewers.
//!     - LoggingConfig: Log level and per-reading log lines.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub influx: InfluxConfig,
    #[serde(default)]
    pub viewers: ViewersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Influx,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Influx => "influx",
            StorageBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// points kept by the memory backend
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewersConfig {
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

fn default_memory_capacity() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 5000 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackend::Influx, memory_capacity: default_memory_capacity() }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: String::new(),
            bucket: "sensores".to_string(),
        }
    }
}

impl Default for ViewersConfig {
    fn default() -> Self {
        Self { channel_capacity: 32 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl RelayConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("relay.toml"),
            std::path::PathBuf::from("..").join("config").join("relay.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Apply `RELAY_*` overrides from the process environment
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment, in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RELAY_INFLUX_URL") {
            self.influx.url = v;
        }
        if let Some(v) = lookup("RELAY_INFLUX_TOKEN") {
            self.influx.token = v;
        }
        if let Some(v) = lookup("RELAY_INFLUX_ORG") {
            self.influx.org = v;
        }
        if let Some(v) = lookup("RELAY_INFLUX_BUCKET") {
            self.influx.bucket = v;
        }
        if let Some(v) = lookup("RELAY_STORAGE_BACKEND") {
            self.storage.backend = match v.to_ascii_lowercase().as_str() {
                "influx" => StorageBackend::Influx,
                "memory" => StorageBackend::Memory,
                other => anyhow::bail!("RELAY_STORAGE_BACKEND: unknown backend '{}'", other),
            };
        }
        if let Some(v) = lookup("RELAY_PORT") {
            self.server.port = v
                .parse()
                .map_err(|e| anyhow::anyhow!("RELAY_PORT: {}", e))?;
        }
        if let Some(v) = lookup("RELAY_LOG_LEVEL") {
            self.logging.level = v;
        }
        Ok(self)
    }

    /// Reject configurations the storage client cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.backend == StorageBackend::Influx {
            let influx = &self.influx;
            for (name, value) in [
                ("influx.url", &influx.url),
                ("influx.token", &influx.token),
                ("influx.org", &influx.org),
                ("influx.bucket", &influx.bucket),
            ] {
                if value.trim().is_empty() {
                    anyhow::bail!("{} is required for the influx storage backend", name);
                }
            }
        }
        if self.storage.memory_capacity == 0 {
            anyhow::bail!("storage.memory_capacity must be at least 1");
        }
        if self.viewers.channel_capacity == 0 {
            anyhow::bail!("viewers.channel_capacity must be at least 1");
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let token = if self.influx.token.is_empty() { "(unset)" } else { "********" };
        println!("┌─────────────────────────────────────────┐");
        println!("│          RELAY CONFIGURATION            │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Listen: {}:{}", self.server.bind_address, self.server.port);
        println!("│ Storage: {}", self.storage.backend.as_str());
        if self.storage.backend == StorageBackend::Influx {
            println!("│ InfluxDB: {}", self.influx.url);
            println!("│ Org: {} | Bucket: {}", self.influx.org, self.influx.bucket);
            println!("│ Token: {}", token);
        }
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
