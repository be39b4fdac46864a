use config::{Config, ConfigError, Environment, File};
use rusty_scpi::agilent4156::{
    AnalyzerMode, IntegrationTime, MAX_DISPLAY_VARIABLES, MAX_EXTRA_VARIABLES,
    MAX_SAMPLING_PERIOD, MAX_SAMPLING_POINTS, MIN_SAMPLING_PERIOD,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionSettings,
    pub analyzer: AnalyzerSettings,
    pub measurement: MeasurementSettings,
    pub console: ConsoleConfig,
}

impl AppConfig {
    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()?;
        self.measurement.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Single byte terminating instrument replies
    pub read_termination: String,
    pub write_termination: String,
}

impl ConnectionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Message("connection.host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Message("connection.port must be non-zero".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "connection timeouts must be greater than zero".to_string(),
            ));
        }
        if self.read_termination.len() != 1 {
            return Err(ConfigError::Message(format!(
                "connection.read_termination must be a single byte, got {:?}",
                self.read_termination
            )));
        }
        Ok(())
    }

    pub fn read_termination_byte(&self) -> u8 {
        self.read_termination.bytes().next().unwrap_or(b'\n')
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5025,
            connect_timeout_ms: 5000,
            read_timeout_ms: 10000,
            write_timeout_ms: 5000,
            read_termination: "\n".to_string(),
            write_termination: "\n".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Pause after every channel setting
    pub settle_delay_ms: u64,
    /// Pause between data fetches
    pub fetch_delay_ms: u64,
    pub mode: AnalyzerMode,
    pub integration_time: IntegrationTime,
    pub delay_time_s: Option<f64>,
    pub hold_time_s: Option<f64>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            fetch_delay_ms: 10,
            mode: AnalyzerMode::Sweep,
            integration_time: IntegrationTime::Medium,
            delay_time_s: None,
            hold_time_s: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MeasurementSettings {
    /// JSON channel configuration document
    pub channel_config: PathBuf,
    pub display_variables: Vec<String>,
    pub extra_variables: Vec<String>,
    /// Sampling period in seconds; unset runs until stopped
    pub sampling_period_s: Option<f64>,
    pub sampling_points: u32,
    pub output_dir: String,
    pub plot: bool,
}

impl MeasurementSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_config.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "measurement.channel_config must name a JSON file".to_string(),
            ));
        }
        if self.display_variables.is_empty() {
            return Err(ConfigError::Message(
                "measurement.display_variables must name at least one variable".to_string(),
            ));
        }
        if self.display_variables.len() > MAX_DISPLAY_VARIABLES {
            return Err(ConfigError::Message(format!(
                "at most {MAX_DISPLAY_VARIABLES} display variables allowed, got {}",
                self.display_variables.len()
            )));
        }
        if self.extra_variables.len() > MAX_EXTRA_VARIABLES {
            return Err(ConfigError::Message(format!(
                "at most {MAX_EXTRA_VARIABLES} extra variables allowed, got {}",
                self.extra_variables.len()
            )));
        }
        if !(1..=MAX_SAMPLING_POINTS).contains(&self.sampling_points) {
            return Err(ConfigError::Message(format!(
                "measurement.sampling_points must be in 1..={MAX_SAMPLING_POINTS}, got {}",
                self.sampling_points
            )));
        }
        if let Some(period) = self.sampling_period_s {
            if !(MIN_SAMPLING_PERIOD..=MAX_SAMPLING_PERIOD).contains(&period) {
                return Err(ConfigError::Message(format!(
                    "measurement.sampling_period_s must be in [{MIN_SAMPLING_PERIOD}, {MAX_SAMPLING_PERIOD}], got {period}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            channel_config: PathBuf::from("channels.json"),
            display_variables: vec!["VC".to_string(), "IC".to_string()],
            extra_variables: Vec::new(),
            sampling_period_s: None,
            sampling_points: 100,
            output_dir: "./data".to_string(),
            plot: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub verbosity: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            verbosity: "info".to_string(),
        }
    }
}

/// Load configuration with layered fallbacks: defaults, then the TOML file, then
/// `RUSTY_SCPI__SECTION__KEY` environment overrides.
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(File::from(path));
    } else {
        for path in ["iv_sweep.toml", "config.toml"] {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("RUSTY_SCPI")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let app_config = builder.build()?.try_deserialize::<AppConfig>()?;
    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[connection]
host = "10.0.0.7"

[analyzer]
mode = "SAMPLING"
integration_time = "LONG"

[measurement]
display_variables = ["VB", "IB", "IC"]
sampling_period_s = 0.5
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.connection.host, "10.0.0.7");
        assert_eq!(config.connection.port, 5025);
        assert_eq!(config.analyzer.mode, AnalyzerMode::Sampling);
        assert_eq!(config.analyzer.integration_time, IntegrationTime::Long);
        assert_eq!(config.measurement.display_variables.len(), 3);
        assert_eq!(config.measurement.sampling_period_s, Some(0.5));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/iv_sweep.toml"))).is_err());
    }

    #[test]
    fn limits_are_checked() {
        let mut config = AppConfig::default();
        config.measurement.extra_variables = vec!["A".into(), "B".into(), "C".into()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.connection.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.measurement.sampling_period_s = Some(1e-9);
        assert!(config.validate().is_err());
    }
}
