//! Logging Module
//!
//! Structured logging through `tracing`. The binary installs the subscriber;
//! the library only emits events.

use std::time::Instant;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::error::{DeepWaterError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Create a verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// Create a quiet logging config (errors only)
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            include_target: false,
            ansi_colors: true,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name; unknown names fall back to `Info`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Initialize logging with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(config.ansi_colors)
                .with_target(config.include_target)
                .compact(),
        )
        .with(filter)
        .try_init()
        .map_err(|e| DeepWaterError::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}

/// Training progress logger.
///
/// With `summaries` on, epochs are reported at `info`; otherwise at `debug`.
pub struct TrainingLogger {
    name: String,
    total_epochs: usize,
    summaries: bool,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    /// Create a new training logger
    pub fn new(name: &str, total_epochs: usize, summaries: bool) -> Self {
        Self {
            name: name.to_string(),
            total_epochs,
            summaries,
            epoch_start: Instant::now(),
            training_start: Instant::now(),
        }
    }

    /// Mark the start of an epoch
    pub fn start_epoch(&mut self) {
        self.epoch_start = Instant::now();
    }

    /// Log end of an epoch with metrics
    pub fn end_epoch(&self, epoch: usize, loss: f64, error: f64) {
        let secs = self.epoch_start.elapsed().as_secs_f64();
        if self.summaries {
            tracing::info!(
                "[{}] epoch {}/{} in {:.1}s | loss: {:.4} | train error: {:.4}",
                self.name,
                epoch + 1,
                self.total_epochs,
                secs,
                loss,
                error
            );
        } else {
            tracing::debug!(
                "[{}] epoch {}/{} in {:.1}s | loss: {:.4} | train error: {:.4}",
                self.name,
                epoch + 1,
                self.total_epochs,
                secs,
                loss,
                error
            );
        }
    }

    /// Log training completion
    pub fn log_complete(&self, final_error: f64) {
        tracing::info!(
            "[{}] training complete: {} epochs in {:.1}s | final train error: {:.4}",
            self.name,
            self.total_epochs,
            self.training_start.elapsed().as_secs_f64(),
            final_error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::parse("Warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_log_level_display_is_filter_directive() {
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogConfig::quiet().level.to_string(), "error");
    }
}
