//! ---
//! pv_section: "01-core-functionality"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Shared configuration and logging primitives."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "PAPERVISION_LOG";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Available log formats for stdout output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Build the log filter: `PAPERVISION_LOG` wins over `RUST_LOG`, and an unset
/// or unparsable directive falls back to `info`.
fn filter_from(papervision_log: Option<String>, rust_log: Option<String>) -> EnvFilter {
    let (source, directive) = match (papervision_log, rust_log) {
        (Some(directive), _) => (LOG_ENV, directive),
        (None, Some(directive)) => ("RUST_LOG", directive),
        (None, None) => return EnvFilter::new("info"),
    };
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("invalid {source} directive ({err}); defaulting to info logging");
        EnvFilter::new("info")
    })
}

fn env_filter() -> EnvFilter {
    filter_from(std::env::var(LOG_ENV).ok(), std::env::var("RUST_LOG").ok())
}

/// Initialize a baseline stdout subscriber suitable for tests and short-lived tools.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .try_init();
}

/// Initialize the tracing subscriber based on configuration and environment variables.
///
/// * `PAPERVISION_LOG` overrides the filter (e.g. `info`, `debug,pv_engine_msg=trace`).
///   When unset the standard `RUST_LOG` variable is honoured, defaulting to `info`.
/// * A daily rolling JSON log file is written under the configured directory in
///   addition to stdout.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config
        .file_prefix
        .clone()
        .unwrap_or_else(|| service_name.to_owned());

    let file_appender = daily(&config.directory, format!("{prefix}.log"));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);

    let filter = env_filter();

    let stdout_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .json()
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_writer(stdout_writer)
            .boxed(),
    };

    let file_layer = fmt::layer()
        .with_target(true)
        .json()
        .with_writer(file_writer)
        .boxed();

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(service = %service_name, log_dir = %config.directory.display(), format = ?config.format, "tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    fn max_level(papervision_log: Option<&str>, rust_log: Option<&str>) -> Option<LevelFilter> {
        filter_from(papervision_log.map(Into::into), rust_log.map(Into::into)).max_level_hint()
    }

    #[test]
    fn papervision_log_takes_priority_over_rust_log() {
        assert_eq!(max_level(Some("trace"), Some("warn")), Some(LevelFilter::TRACE));
        assert_eq!(max_level(None, Some("debug")), Some(LevelFilter::DEBUG));
        assert_eq!(max_level(None, None), Some(LevelFilter::INFO));
        assert_eq!(max_level(Some("pv_engine_msg=loud"), None), Some(LevelFilter::INFO));
    }

    #[test]
    fn init_does_not_panic() {
        init();
        init();
    }

    #[test]
    fn init_tracing_creates_log_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = LoggingConfig {
            directory: dir.path().join("nested/logs"),
            format: LogFormat::StructuredJson,
            file_prefix: Some("test".into()),
        };
        init_tracing("pv-common-test", &config).expect("tracing initialises");
        assert!(config.directory.is_dir());
    }
}
