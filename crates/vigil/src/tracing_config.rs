//! Logging setup.
//!
//! - Console output for interactive use
//! - JSON lines for log collectors

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output.
    Console,
    /// One JSON object per event.
    Json,
}

impl TracingFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            TracingFormat::Json
        } else {
            TracingFormat::Console
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive, e.g. `info` or `vigil_sched=debug,info`.
    pub log_level: String,
    pub format: TracingFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: TracingFormat::Console,
        }
    }
}

impl TracingConfig {
    pub fn new(log_level: impl Into<String>, format: TracingFormat) -> Self {
        Self {
            log_level: log_level.into(),
            format,
        }
    }

    /// Read `RUST_LOG` (default `info`) and `VIGIL_LOG_FORMAT`
    /// (`console` or `json`, default `console`).
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = std::env::var("VIGIL_LOG_FORMAT")
            .map_or(TracingFormat::Console, |f| TracingFormat::parse(&f));
        Self { log_level, format }
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match config.format {
        TracingFormat::Console => fmt::layer().with_target(true).compact().boxed(),
        TracingFormat::Json => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .with_current_span(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(format = ?config.format, "tracing initialized");
    Ok(())
}

/// [`init_tracing`] with [`TracingConfig::from_env`].
pub fn init_default_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing(TracingConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format, TracingFormat::Console);
    }

    #[test]
    fn test_custom_config() {
        let config = TracingConfig::new("vigil_sched=debug", TracingFormat::Json);
        assert_eq!(config.log_level, "vigil_sched=debug");
        assert_eq!(config.format, TracingFormat::Json);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(TracingFormat::parse("json"), TracingFormat::Json);
        assert_eq!(TracingFormat::parse("JSON"), TracingFormat::Json);
        assert_eq!(TracingFormat::parse("pretty"), TracingFormat::Console);
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_tracing(TracingConfig::default());
        assert!(init_tracing(TracingConfig::default()).is_err());
    }
}
