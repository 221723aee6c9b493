
use crate::domain::telemetry::MissingFieldPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const SIMULATOR_NAME: &str = "simulate";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub simulator: SimulatorSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub datasets: DatasetSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorSettings {
    /// Defaults to `simulate` next to the running binary.
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub kill_on_timeout: bool,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            stop_timeout_ms: default_stop_timeout_ms(),
            kill_on_timeout: true,
        }
    }
}

impl SimulatorSettings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn resolve_executable(&self) -> anyhow::Result<PathBuf> {
        match &self.executable {
            Some(path) => Ok(path.clone()),
            None => {
                let current = std::env::current_exe()?;
                Ok(sibling_executable(&current, SIMULATOR_NAME))
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub missing_fields: MissingFieldPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamSettings {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetSettings {
    /// Recordings are only read from below this directory.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_stop_timeout_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    256
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Load `config/monitor.*` (optional), overridden by `MONITOR__SECTION__KEY`
/// environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/monitor").required(false))
        .add_source(
            config::Environment::with_prefix("MONITOR")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("simulator.args")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Path of executable `name` in the same directory as `current`.
pub fn sibling_executable(current: &std::path::Path, name: &str) -> PathBuf {
    current.with_file_name(format!("{}{}", name, std::env::consts::EXE_SUFFIX))
}
