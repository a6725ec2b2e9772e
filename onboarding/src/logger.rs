use std::{fmt, fs, path::Path, str::FromStr};

use clap::ValueEnum;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid logs path '{0}', it must end with a '/'")]
    InvalidLogsPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as ValueEnum>::from_str(s, true)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(s)
    }
}

pub fn default_logs_datetime_format() -> String {
    String::from("[%Y-%m-%d] (%H:%M:%S%.3f)")
}

/// Options consumed by `setup_logger`, built from the CLI `LogConfig`
#[derive(Debug, Clone)]
pub struct LoggerOptions<'a> {
    pub level: LogLevel,
    pub file_level: LogLevel,
    pub disable_file_logging: bool,
    pub disable_file_log_date_based: bool,
    pub disable_colors: bool,
    pub filename_log: &'a str,
    pub logs_path: &'a str,
    pub datetime_format: &'a str,
}

/// Install the global logger: colored stdout plus an optional file sink
///
/// The file is rotated daily (`YYYY-MM-DD.<filename>`) unless
/// `disable_file_log_date_based` is set.
pub fn setup_logger(options: LoggerOptions<'_>) -> Result<(), LoggerError> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Cyan)
        .trace(Color::Magenta);

    let datetime_format = options.datetime_format.to_owned();
    let disable_colors = options.disable_colors;
    let stdout = fern::Dispatch::new()
        .level(options.level.into())
        .format(move |out, message, record| {
            let level = if disable_colors {
                record.level().to_string()
            } else {
                colors.color(record.level()).to_string()
            };
            out.finish(format_args!(
                "{} {} > {}: {}",
                chrono::Local::now().format(&datetime_format),
                level,
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());

    let mut base = fern::Dispatch::new()
        .level(LevelFilter::from(options.level).max(options.file_level.into()))
        .chain(stdout);

    if !options.disable_file_logging {
        if !options.logs_path.ends_with('/') {
            return Err(LoggerError::InvalidLogsPath(options.logs_path.to_owned()));
        }
        if !Path::new(options.logs_path).exists() {
            fs::create_dir_all(options.logs_path)?;
        }

        let datetime_format = options.datetime_format.to_owned();
        let file = fern::Dispatch::new()
            .level(options.file_level.into())
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "{} {} > {}: {}",
                    chrono::Local::now().format(&datetime_format),
                    record.level(),
                    record.target(),
                    message
                ))
            });

        let file = if options.disable_file_log_date_based {
            file.chain(fern::log_file(format!(
                "{}{}",
                options.logs_path, options.filename_log
            ))?)
        } else {
            file.chain(fern::DateBased::new(
                options.logs_path,
                format!("%Y-%m-%d.{}", options.filename_log),
            ))
        };
        base = base.chain(file);
    }

    base.apply()?;
    Ok(())
}
