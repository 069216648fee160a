//! Node configuration module
//!
//! Parses and manages node configuration from YAML files.
//! Every field has a default, so an empty document is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::DEFAULT_TICK_RATE;
use crate::network::packet::GLOBAL_CHANNEL;
use crate::network::switch::{SWITCH_COOLDOWN_WINDOW, SWITCH_DELAY_TICKS};

/// MySQL connection settings for the location table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlConfig {
    pub ip: String,

    #[serde(default = "default_sql_port")]
    pub port: u16,

    pub id: String,

    #[serde(default)]
    pub pw: String,

    pub db: String,
}

impl SqlConfig {
    pub fn url(&self) -> String {
        format!("mysql://{}:{}@{}:{}/{}", self.id, self.pw, self.ip, self.port, self.db)
    }
}

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    // ============================================
    // Scheduler
    // ============================================
    /// Scheduler ticks per second
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,

    // ============================================
    // Server switching
    // ============================================
    /// Ticks between an approved switch and the proxy reconnect
    #[serde(default = "default_switch_delay_ticks")]
    pub switch_delay_ticks: u64,

    /// Minimum time between two approved switches (ms)
    #[serde(default = "default_switch_cooldown_ms")]
    pub switch_cooldown_ms: u64,

    // ============================================
    // Topology
    // ============================================
    /// Initial self name. Normally reported by the proxy feed instead.
    #[serde(default)]
    pub server_name: Option<String>,

    /// Initial registry contents, replaced by the first feed update
    #[serde(default)]
    pub servers: Vec<String>,

    // ============================================
    // Messages, storage, queues
    // ============================================
    /// `key: value` file overriding built-in message texts
    #[serde(default)]
    pub lang_file: Option<String>,

    /// Location storage. When absent locations are kept in memory.
    #[serde(default)]
    pub sql: Option<SqlConfig>,

    /// Bound of the outbound packet and proxy instruction queues
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

// ============================================
// Default value functions
// ============================================

fn default_sql_port() -> u16 {
    3306
}

fn default_tick_rate() -> u32 {
    DEFAULT_TICK_RATE
}

fn default_switch_delay_ticks() -> u64 {
    SWITCH_DELAY_TICKS
}

fn default_switch_cooldown_ms() -> u64 {
    SWITCH_COOLDOWN_WINDOW.as_millis() as u64
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            switch_delay_ticks: default_switch_delay_ticks(),
            switch_cooldown_ms: default_switch_cooldown_ms(),
            server_name: None,
            servers: Vec::new(),
            lang_file: None,
            sql: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl NetworkConfig {
    /// Load configuration from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use netswitch::config::NetworkConfig;
    ///
    /// let config = NetworkConfig::from_file("conf/network.yaml")
    ///     .expect("Failed to load config");
    /// println!("tick rate: {}", config.tick_rate);
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: NetworkConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(contents: &str) -> Result<Self> {
        // serde_yaml reads an empty document as null, not as an empty map
        let contents = if contents.trim().is_empty() { "{}" } else { contents };
        let config: NetworkConfig = serde_yaml::from_str(contents)
            .context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    pub fn switch_cooldown(&self) -> Duration {
        Duration::from_millis(self.switch_cooldown_ms)
    }

    /// Checks that values are usable
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.tick_rate > 0, "tick_rate must be positive");
        anyhow::ensure!(self.switch_delay_ticks > 0, "switch_delay_ticks must be positive");
        anyhow::ensure!(self.channel_capacity > 0, "channel_capacity must be positive");

        if let Some(name) = &self.server_name {
            anyhow::ensure!(!name.is_empty(), "server_name cannot be empty");
            anyhow::ensure!(
                !name.eq_ignore_ascii_case(GLOBAL_CHANNEL),
                "server_name cannot be the reserved name {:?}",
                GLOBAL_CHANNEL
            );
        }

        if let Some(sql) = &self.sql {
            anyhow::ensure!(!sql.ip.is_empty(), "sql.ip cannot be empty");
            anyhow::ensure!(!sql.id.is_empty(), "sql.id cannot be empty");
            anyhow::ensure!(!sql.db.is_empty(), "sql.db cannot be empty");
        }

        Ok(())
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }
}
