use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Shortest and longest tick interval the renderer accepts.
pub const MIN_TICK_MS: u64 = 1;
pub const MAX_TICK_MS: u64 = 1000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Replay the effect sequence indefinitely instead of exiting after the
    /// last frame.
    #[serde(default, rename = "loop")]
    pub loop_sequence: bool,
    /// Interval between render ticks in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Custom effect assets: a directory of images, a single image or a JSON
    /// manifest. When `None` the built-in sequence is used.
    #[serde(default)]
    pub effects_path: Option<PathBuf>,
    /// Look up the approximate location of the public IP at startup.
    #[serde(default)]
    pub ip_lookup: bool,
    /// Upper bound on how long startup waits for the lookup.
    #[serde(default = "default_ip_lookup_timeout")]
    pub ip_lookup_timeout_ms: u64,
    /// Override the geolocation endpoints queried in order.
    #[serde(default)]
    pub ip_lookup_endpoints: Option<Vec<String>>,
    /// Append a typed location report when a lookup succeeds.
    #[serde(default = "default_show_location")]
    pub show_location: bool,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_tick_interval() -> u64 {
    33
}

fn default_ip_lookup_timeout() -> u64 {
    3000
}

fn default_show_location() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            loop_sequence: false,
            tick_interval_ms: default_tick_interval(),
            effects_path: None,
            ip_lookup: false,
            ip_lookup_timeout_ms: default_ip_lookup_timeout(),
            ip_lookup_endpoints: None,
            show_location: default_show_location(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing, unreadable or empty file yields
    /// the defaults; read failures other than a missing file are logged.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!(path, error = %e, "could not read settings; using defaults");
                String::new()
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        let ms = self.tick_interval_ms.clamp(MIN_TICK_MS, MAX_TICK_MS);
        if ms != self.tick_interval_ms {
            tracing::warn!(
                requested = self.tick_interval_ms,
                used = ms,
                "tick interval out of range; clamping"
            );
        }
        Duration::from_millis(ms)
    }

    pub fn ip_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.ip_lookup_timeout_ms)
    }
}
