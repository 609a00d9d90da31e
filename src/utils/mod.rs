//! Utilities module for logging, configuration files and error handling

pub mod error;
pub mod logging;

pub use error::{DeepWaterError, Result};
pub use logging::{init_logging, LogConfig};

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

/// Read and parse a TOML file into `T`
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path).map_err(|e| {
        DeepWaterError::Config(format!("Failed to read config {}: {e}", path.display()))
    })?;

    toml::from_str(&content).map_err(|e| {
        DeepWaterError::Config(format!("Failed to parse config {}: {e}", path.display()))
    })
}

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.5), "30.5s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m");
    }

    #[test]
    fn test_load_toml_config_missing_file() {
        let result: Result<toml::Value> = load_toml_config(Path::new("/nonexistent/run.toml"));
        assert!(matches!(result, Err(DeepWaterError::Config(_))));
    }
}
