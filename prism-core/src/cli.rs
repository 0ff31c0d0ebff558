use clap::{Args, ValueEnum};
use log::LevelFilter;

/// Log level options for command-line argument.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

/// Common command-line arguments for Prism tools.
///
/// Flatten this into a tool's own `Parser` struct.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Set the log verbosity level
    #[arg(short = 'l', long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Start a puffin profiling server
    #[arg(long = "profile", default_value_t = false)]
    pub profile: bool,
}
