//! Subscriber setup for the binary. The library itself only emits `tracing`
//! events and never installs a subscriber.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "study-advisor.log";

/// Where log output goes and how much of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `warn` or `study_advisor=debug`
    pub filter: String,
    /// Daily rolling log files are written here when set
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    /// `STUDY_ADVISOR_LOG`, `STUDY_ADVISOR_FILE_LOGS`, `STUDY_ADVISOR_LOG_DIR`.
    pub fn from_env(default_filter: &str) -> Self {
        let filter =
            std::env::var("STUDY_ADVISOR_LOG").unwrap_or_else(|_| default_filter.to_string());
        let file_logs = std::env::var("STUDY_ADVISOR_FILE_LOGS")
            .map(|v| flag_enabled(&v))
            .unwrap_or(false);
        let file_dir = file_logs.then(|| {
            std::env::var_os("STUDY_ADVISOR_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs"))
        });
        Self { filter, file_dir }
    }
}

fn flag_enabled(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Flushes buffered file output on drop.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Install the global subscriber: stderr always, plus a rolling file when
/// configured. Keep the guard alive until exit.
pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let mut guard = None;
    let file_layer = settings.file_dir.as_ref().and_then(|dir| {
        if let Err(err) = std::fs::create_dir_all(dir) {
            eprintln!("log directory {} unavailable: {err}", dir.display());
            return None;
        }
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        guard = Some(FileLogGuard { _guard: worker });
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    });

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("tracing already initialized: {err}");
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values() {
        assert!(flag_enabled("1"));
        assert!(flag_enabled(" TRUE "));
        assert!(flag_enabled("on"));
        assert!(!flag_enabled("0"));
        assert!(!flag_enabled(""));
        assert!(!flag_enabled("nope"));
    }
}
