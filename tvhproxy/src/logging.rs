//! Logging setup: console output, optionally mirrored to daily-rotated
//! log files with a retention window.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system.
///
/// Verbosity maps to the default filter level (0 = info, 1 = debug,
/// 2+ = trace); `RUST_LOG` still wins when set. When `log_dir` is given,
/// logs are also written to daily-rotated files and files older than
/// `retention_days` are removed at startup.
pub fn init_logging(
    log_dir: Option<&Path>,
    retention_days: u64,
    verbose: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(LocalTimeTimer);

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)?;
        clean_old_logs(dir, retention_days)?;

        let file_appender = tracing_appender::rolling::daily(dir, "tvhproxy.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Keep the writer guard alive for the lifetime of the process.
        let _ = Box::leak(Box::new(guard));

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_timer(LocalTimeTimer);

        tracing::subscriber::set_global_default(registry.with(file_layer))?;
    } else {
        tracing::subscriber::set_global_default(registry)?;
    }

    // Bridge log:: macros to tracing.
    tracing_log::LogTracer::init()?;

    Ok(())
}

/// Remove log files older than the retention window.
fn clean_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let cutoff = Local::now() - chrono::Duration::days(retention_days as i64);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains("tvhproxy.log"));
        if !is_log {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified: chrono::DateTime<Local> = modified.into();
            if modified < cutoff {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!("Failed to remove old log file {:?}: {}", path, e);
                }
            }
        }
    }

    Ok(())
}

/// Local-time timestamps for log lines.
#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}
