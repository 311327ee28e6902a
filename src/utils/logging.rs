//! Logging Module
//!
//! Structured logging on top of the `tracing` crate. The binary installs a
//! global subscriber once at startup; library code only emits events.
//! Events always go to stderr so `predict --json` keeps stdout clean.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use super::error::{Result, TomatoError};

/// Minimum severity passed to the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level '{}' (expected trace, debug, info, warn or error)",
                other
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Print the module path of each event
    pub include_target: bool,
    pub include_thread_ids: bool,
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug-level output with module paths and thread ids
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            ..Self::default()
        }
    }

    /// Settings for a CLI run
    ///
    /// JSON output silences everything but errors, `--verbose` switches to
    /// the verbose preset, and an explicit level overrides either.
    pub fn for_cli(verbose: bool, json: bool, level: Option<LogLevel>) -> Self {
        let mut config = if json {
            Self::quiet()
        } else if verbose {
            Self::verbose()
        } else {
            Self::default()
        };
        if let Some(level) = level {
            config.level = level;
        }
        config
    }
}

/// Install the global subscriber
///
/// Fails when a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(config.level))
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TomatoError::Config(format!("logging already initialized: {}", e)))?;

    tracing::debug!("Logging at level {}", config.level);
    Ok(())
}

/// Periodic progress lines for batch runs
pub struct ProgressLogger {
    operation: String,
    total: usize,
    current: usize,
    log_interval: usize,
    started: Instant,
}

impl ProgressLogger {
    /// Logs roughly every tenth of `total`
    pub fn new(operation: &str, total: usize) -> Self {
        Self {
            operation: operation.to_string(),
            total,
            current: 0,
            log_interval: (total / 10).max(1),
            started: Instant::now(),
        }
    }

    pub fn with_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval.max(1);
        self
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Set the processed count, clamped to the total
    pub fn update(&mut self, count: usize) {
        self.current = count.min(self.total);

        if self.current % self.log_interval != 0 && self.current != self.total {
            return;
        }

        let percent = if self.total == 0 {
            100.0
        } else {
            100.0 * self.current as f64 / self.total as f64
        };
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.current as f64 / elapsed
        } else {
            0.0
        };

        tracing::info!(
            "{}: {}/{} images ({:.0}%), {:.1} images/s",
            self.operation,
            self.current,
            self.total,
            percent,
            rate
        );
    }

    pub fn increment(&mut self) {
        self.update(self.current + 1);
    }

    pub fn finish(&self) {
        tracing::info!(
            "{}: {} images in {:.2}s",
            self.operation,
            self.current,
            self.started.elapsed().as_secs_f64()
        );
    }
}
