use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compaction: CompactionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Deadline stamped onto records that reach the inspector without one.
    pub default_timeout_secs: i64,
    /// Number of result segment IDs allocated per plan.
    pub result_segments_per_plan: usize,
    /// Inspector tick period.
    pub poll_interval_ms: u64,
    /// Upper bound on tasks tracked by one inspector.
    pub max_concurrent_tasks: usize,
    /// Consecutive failed status RPCs after which a task is failed. Unset means
    /// only the deadline ends a task whose worker cannot be reached.
    pub unreachable_poll_limit: Option<u32>,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 900,
            result_segments_per_plan: 1,
            poll_interval_ms: 500,
            max_concurrent_tasks: 16,
            unreachable_poll_limit: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            stdout_level: "info".to_string(),
            file_level: "debug".to_string(),
        }
    }
}

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_path =
        env::var("COMPACTION_COORD_CONFIG").unwrap_or_else(|_| "config".to_string());

    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(&config_path).required(false))
        .add_source(
            config::Environment::with_prefix("COMPACTION_COORD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    Ok(settings)
}
