//! Tracing subscriber setup.
//!
//! Console output by default; with `LOG_FILE` set, JSON lines are appended to
//! that file instead. `RUST_LOG` overrides the default filter.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "genai_adapter=info,tower_http=info";

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// process lifetime or buffered file records are lost.
pub fn init(log_file: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "genai_adapter.log".into());

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer);

            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(json_layer)
                .try_init();
            Ok(Some(guard))
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .try_init();
            Ok(None)
        }
    }
}
