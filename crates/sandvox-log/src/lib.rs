//! Structured logging setup for the engine.
//!
//! Console output via the `tracing` ecosystem with timestamps, module paths
//! and severity, filterable through `RUST_LOG`, plus optional JSON file
//! logging in debug builds for post-mortem analysis.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber.
///
/// `log_level` overrides the default filter when `RUST_LOG` is unset;
/// `log_dir` enables JSON file logging in debug builds.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, log_level: Option<&str>) {
    let filter_str = log_level.filter(|level| !level.is_empty()).unwrap_or("info");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("sandvox.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The default filter used when neither `RUST_LOG` nor a config override is
/// present.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_is_info() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,sandvox_mesh=trace",
            "warn,sandvox_lighting=debug",
            "error",
        ];
        for filter_str in &valid_filters {
            assert!(
                EnvFilter::try_from(*filter_str).is_ok(),
                "failed to parse filter: {filter_str}"
            );
        }
    }

    #[test]
    fn test_log_file_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_file_path = temp_dir.path().join("sandvox.log");
        assert_eq!(log_file_path.file_name().unwrap(), "sandvox.log");
    }
}
