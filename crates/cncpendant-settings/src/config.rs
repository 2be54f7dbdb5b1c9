//! Configuration and settings management for CNC Pendant
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats stored in the platform config directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, detection candidates and timing)
//! - Device settings (queue sizes, firmware windows, watchdog, polling)
//! - Job settings (program line limits)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use cncpendant_communication::{
    CounterLimits, DetectorConfig, DeviceConfig, FirmwareKind, JobConfig, LINE_OVERHEAD,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port name that selects the first likely controller port
pub const AUTO_PORT: &str = "auto";

/// Connection and detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port name, or `auto`
    pub port: String,
    /// Candidate baud rates, tried in order
    pub baud_rates: Vec<u32>,
    /// Baud rate of the first attempt
    pub preferred_baud: Option<u32>,
    /// Dialect of the first attempt
    pub preferred_dialect: Option<FirmwareKind>,
    /// Longest wait for a probe answer in milliseconds
    pub probe_timeout_ms: u64,
    /// Silence after data that ends a probe read, in milliseconds
    pub probe_quiet_ms: u64,
    /// Probes per candidate
    pub probe_retries: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rates: vec![115200, 250000, 57600],
            preferred_baud: Some(250000),
            preferred_dialect: Some(FirmwareKind::Marlin),
            probe_timeout_ms: 1000,
            probe_quiet_ms: 200,
            probe_retries: 2,
        }
    }
}

impl ConnectionSettings {
    /// Whether the port should be picked automatically
    pub fn is_auto_port(&self) -> bool {
        self.port.is_empty() || self.port.eq_ignore_ascii_case(AUTO_PORT)
    }
}

/// Device engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Response watchdog in milliseconds
    pub watchdog_timeout_ms: u64,
    /// Normal lane capacity in lines
    pub normal_lines: usize,
    /// Priority lane capacity in lines, 0 routes priority commands to the normal lane
    pub priority_lines: usize,
    /// GRBL receive window in lines
    pub grbl_window_lines: usize,
    /// GRBL receive window in bytes
    pub grbl_window_bytes: usize,
    /// Marlin unacknowledged lines
    pub marlin_window_lines: usize,
    /// Marlin unacknowledged bytes
    pub marlin_window_bytes: usize,
    /// Honour XON/XOFF from the firmware
    pub xon_xoff: bool,
    /// Longest command accepted
    pub max_command_len: usize,
    /// Status poll period in milliseconds, 0 disables polling
    pub status_poll_ms: u64,
    /// Marlin temperature autoreport period in seconds, 0 leaves it off
    pub autoreport_interval_s: u32,
    /// Engine tick period in milliseconds
    pub tick_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: 2500,
            normal_lines: 16,
            priority_lines: 4,
            grbl_window_lines: 32,
            grbl_window_bytes: 127,
            marlin_window_lines: 4,
            marlin_window_bytes: 384,
            xon_xoff: false,
            max_command_len: 100,
            status_poll_ms: 1000,
            autoreport_interval_s: 2,
            tick_ms: 2,
        }
    }
}

/// Job feeder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Longest program line, comments excluded
    pub max_line_len: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self { max_line_len: 100 }
    }
}

/// Complete pendant configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Device engine settings
    pub device: DeviceSettings,
    /// Job settings
    pub job: JobSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or_default().to_string()).into()),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(dir.join("cncpendant").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, otherwise the defaults
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| SettingsError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let c = &self.connection;
        if c.baud_rates.is_empty() {
            return Err(SettingsError::invalid("connection.baud_rates", "must not be empty"));
        }
        if c.baud_rates.contains(&0) || c.preferred_baud == Some(0) {
            return Err(SettingsError::invalid("connection.baud_rates", "baud rate must be > 0"));
        }
        if c.preferred_baud.is_some() != c.preferred_dialect.is_some() {
            return Err(SettingsError::invalid(
                "connection.preferred_baud",
                "preferred baud and dialect must be set together",
            ));
        }
        if c.probe_timeout_ms == 0 || c.probe_quiet_ms == 0 {
            return Err(SettingsError::invalid("connection.probe_timeout_ms", "must be > 0"));
        }
        if c.probe_retries == 0 {
            return Err(SettingsError::invalid("connection.probe_retries", "must be > 0"));
        }

        let d = &self.device;
        if d.watchdog_timeout_ms == 0 {
            return Err(SettingsError::invalid("device.watchdog_timeout_ms", "must be > 0"));
        }
        if d.normal_lines == 0 {
            return Err(SettingsError::invalid("device.normal_lines", "must be > 0"));
        }
        if d.grbl_window_lines == 0 || d.grbl_window_bytes == 0 {
            return Err(SettingsError::invalid("device.grbl_window", "must be > 0"));
        }
        if d.marlin_window_lines == 0 || d.marlin_window_bytes == 0 {
            return Err(SettingsError::invalid("device.marlin_window", "must be > 0"));
        }
        if d.max_command_len == 0 {
            return Err(SettingsError::invalid("device.max_command_len", "must be > 0"));
        }
        let narrowest = d.grbl_window_bytes.min(d.marlin_window_bytes);
        if d.max_command_len + LINE_OVERHEAD > narrowest {
            return Err(SettingsError::invalid(
                "device.max_command_len",
                "longest command plus terminator must fit both firmware windows",
            ));
        }
        if d.tick_ms == 0 {
            return Err(SettingsError::invalid("device.tick_ms", "must be > 0"));
        }

        if self.job.max_line_len == 0 {
            return Err(SettingsError::invalid("job.max_line_len", "must be > 0"));
        }
        if self.job.max_line_len > d.max_command_len {
            return Err(SettingsError::invalid(
                "job.max_line_len",
                "must not exceed device.max_command_len",
            ));
        }

        Ok(())
    }

    /// Detection settings for the communication crate
    pub fn detector_config(&self) -> DetectorConfig {
        let c = &self.connection;
        DetectorConfig {
            baud_rates: c.baud_rates.clone(),
            preferred: c.preferred_baud.zip(c.preferred_dialect),
            probe_timeout: Duration::from_millis(c.probe_timeout_ms),
            quiet_timeout: Duration::from_millis(c.probe_quiet_ms),
            retries: c.probe_retries,
            ..DetectorConfig::default()
        }
    }

    /// Engine settings for the communication crate
    pub fn device_config(&self) -> DeviceConfig {
        let d = &self.device;
        DeviceConfig {
            normal_lines: d.normal_lines,
            priority_lines: d.priority_lines,
            watchdog_timeout: Duration::from_millis(d.watchdog_timeout_ms),
            grbl_window: CounterLimits::new(d.grbl_window_lines, d.grbl_window_bytes),
            marlin_window: CounterLimits::new(d.marlin_window_lines, d.marlin_window_bytes),
            xon_xoff: d.xon_xoff,
            max_command_len: d.max_command_len,
            autoreport_interval_s: d.autoreport_interval_s,
            ..DeviceConfig::default()
        }
    }

    /// Job settings for the communication crate
    pub fn job_config(&self) -> JobConfig {
        JobConfig {
            max_line_len: self.job.max_line_len,
        }
    }

    /// Status poll period, `None` when disabled
    pub fn status_poll_interval(&self) -> Option<Duration> {
        (self.device.status_poll_ms > 0).then(|| Duration::from_millis(self.device.status_poll_ms))
    }

    /// Engine tick period
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.device.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.connection.is_auto_port());
    }

    #[test]
    fn test_maps_onto_engine_defaults() {
        let config = Config::default();
        assert_eq!(config.device_config(), DeviceConfig::default());
        assert_eq!(config.detector_config(), DetectorConfig::default());
        assert_eq!(config.job_config(), JobConfig::default());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = Config::default();
        config.device.normal_lines = 0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { key, .. }) if key == "device.normal_lines"
        ));
    }

    #[test]
    fn test_rejects_windows_narrower_than_a_command() {
        let mut config = Config::default();
        config.device.grbl_window_bytes = 40;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { key, .. }) if key == "device.max_command_len"
        ));

        config.device.grbl_window_bytes = config.device.max_command_len + 1;
        assert!(config.validate().is_ok());

        config.device.marlin_window_bytes = config.device.max_command_len;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_job_lines_the_device_would_refuse() {
        let mut config = Config::default();
        config.job.max_line_len = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preferred_attempt_needs_both_halves() {
        let mut config = Config::default();
        config.connection.preferred_dialect = None;
        assert!(config.validate().is_err());

        config.connection.preferred_baud = None;
        assert!(config.validate().is_ok());
        assert_eq!(config.detector_config().preferred, None);
    }

    #[test]
    fn test_status_poll_can_be_disabled() {
        let mut config = Config::default();
        assert_eq!(config.status_poll_interval(), Some(Duration::from_millis(1000)));
        config.device.status_poll_ms = 0;
        assert_eq!(config.status_poll_interval(), None);
    }
}
