//! Logging configuration and initialization
//!
//! Structured logging with tracing: compact console output for development,
//! JSON for log aggregation, and an optional non-blocking log file.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "EFFECTS_LOG";
/// Environment variable selecting the output format ("json")
pub const LOG_FORMAT_ENV: &str = "EFFECTS_LOG_FORMAT";

// Re-export WorkerGuard so callers can store it
pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Enable file logging (default: false)
    pub file_enabled: bool,
    /// Path for the log file (default: effect-compositor.log in the working directory)
    pub file_path: Option<PathBuf>,
    /// Use JSON format for console logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Build a config from the CLI verbosity flag and an optional log file
    pub fn for_cli(verbose: bool, file_path: Option<PathBuf>) -> Self {
        Self {
            file_enabled: file_path.is_some(),
            file_path,
            default_level: if verbose { "debug" } else { "info" }.to_string(),
            ..Default::default()
        }
    }

    /// Whether JSON output is selected, honoring `EFFECTS_LOG_FORMAT`
    pub fn use_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }

    fn log_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("effect-compositor.log"))
    }
}

/// Initialize the logging system with the given configuration
///
/// Returns a guard that must be kept alive for the duration of the program
/// so the log file is flushed. Also bridges `log` records from the GPU
/// backend into tracing.
///
/// # Environment Variables
///
/// - `EFFECTS_LOG`: Log filter (e.g., "debug", "info,effect_compositor=trace"),
///   falling back to `RUST_LOG`, then to `default_level`
/// - `EFFECTS_LOG_FORMAT`: Set to "json" for JSON output
///
/// # Example
///
/// ```no_run
/// use effect_compositor::telemetry::{init_logging, LogConfig};
///
/// let config = LogConfig::default();
/// let _guard = init_logging(&config).expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = config.use_json();

    let (file_layer, file_guard) = if config.file_enabled {
        let log_path = config.log_path();
        let file = std::fs::File::create(&log_path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        eprintln!("Logging to file: {}", log_path.display());

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false); // No ANSI colors in file
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let console = config.console_enabled;
    let json_layer = (console && use_json).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let compact_layer = (console && !use_json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(json_layer)
        .with(compact_layer)
        .try_init()?;

    tracing::info!(
        target: "effect_compositor",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_cli_config() {
        let config = LogConfig::for_cli(true, Some(PathBuf::from("run.log")));
        assert!(config.file_enabled);
        assert_eq!(config.default_level, "debug");
        assert_eq!(config.log_path(), PathBuf::from("run.log"));

        let config = LogConfig::for_cli(false, None);
        assert!(!config.file_enabled);
        assert_eq!(config.default_level, "info");
        assert_eq!(config.log_path(), PathBuf::from("effect-compositor.log"));
    }
}
