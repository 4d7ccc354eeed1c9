//! Logging setup for scribe: a log file, plus the terminal when asked for.
//!
//! The file receives `warn` and above unless a filter is set through the
//! environment. Terminal logging goes to stderr, leaving stdout to command
//! output, and is on when `SCRIBE_LOG` or `RUST_LOG` is set or in debug
//! builds.
//!
//! ## Environment Variables
//!
//! 1. **`SCRIBE_LOG`** (highest priority). A bare level such as `debug`
//!    applies to every scribe crate; anything with `=`, `:` or `,` is used
//!    as a full filter directive.
//! 2. **`RUST_LOG`**, used as-is.
//! 3. **Default**: `warn` globally, `info` for scribe crates.
//!
//! ## Log File Location
//!
//! Default: `<data_local_dir>/scribe/logs/scribe-<pid>.log`
//! - macOS: `~/Library/Application Support/scribe/logs/scribe-12345.log`
//! - Linux: `~/.local/share/scribe/logs/scribe-12345.log`
//!
//! Override with `--log-file <path>`. A path with an extension names the
//! file, any other path names the directory.

use std::{
    env,
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const CRATES: &[&str] = &[
    "scribe_markup",
    "scribe_source",
    "scribe_editor",
    "scribe_config",
    "scribe_bin",
];

/// Returned from [`init`]; must be held alive to ensure log file flushing.
pub struct LogGuard {
    _file_guard: WorkerGuard,
    pub log_file: PathBuf,
}

#[derive(Debug, Default)]
pub struct LogConfig {
    pub log_file_path: Option<PathBuf>,
}

/// Initialize logging.
///
/// Dropping the returned [`LogGuard`] flushes and stops the background file
/// writer, so hold it for the life of the program. Fails if a global
/// subscriber is already installed.
pub fn init(config: LogConfig) -> Result<LogGuard, BoxError> {
    let (log_dir, filename) = resolve_log_path(config.log_file_path);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, &filename);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(file_filter());

    let terminal_layer = terminal_enabled().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    Registry::default()
        .with(file_layer)
        .with(terminal_layer)
        .try_init()?;

    Ok(LogGuard {
        _file_guard: file_guard,
        log_file: log_dir.join(filename),
    })
}

/// Initialize logging for tests.
///
/// Terminal only, through the test writer so output is captured per test.
/// Calling it more than once, or after another test did, is fine.
pub fn test() {
    let _ = fmt()
        .with_env_filter(filter())
        .with_test_writer()
        .try_init();
}

fn terminal_enabled() -> bool {
    env::var("SCRIBE_LOG").is_ok() || env::var("RUST_LOG").is_ok() || cfg!(debug_assertions)
}

fn resolve_log_path(override_path: Option<PathBuf>) -> (PathBuf, String) {
    let filename = format!("scribe-{}.log", std::process::id());

    match override_path {
        Some(path) if path.extension().is_some() => {
            let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(filename);
            (dir, name)
        },
        Some(dir) => (dir, filename),
        None => {
            let dir = dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("scribe")
                .join("logs");
            (dir, filename)
        },
    }
}

/// The file gets `warn` unless the environment asks for something else.
fn file_filter() -> EnvFilter {
    if env::var("SCRIBE_LOG").is_ok() || env::var("RUST_LOG").is_ok() {
        return filter();
    }
    EnvFilter::new("warn")
}

fn filter() -> EnvFilter {
    if let Ok(level) = env::var("SCRIBE_LOG") {
        return expand_scribe_log(&level);
    }
    if let Ok(directives) = env::var("RUST_LOG") {
        return EnvFilter::new(directives);
    }
    EnvFilter::new(crate_directives("info"))
}

/// `SCRIBE_LOG=debug` becomes `warn,scribe_markup=debug,...`. Full
/// directives like `scribe_editor=trace` pass through untouched.
fn expand_scribe_log(value: &str) -> EnvFilter {
    if value.contains(['=', ':', ',']) {
        return EnvFilter::new(value);
    }
    EnvFilter::new(crate_directives(value))
}

fn crate_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for name in CRATES {
        directives.push_str(&format!(",{name}={level}"));
    }
    directives
}
