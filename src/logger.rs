//! log4rs setup.
//!
//! The first successful call installs log4rs as the global logger; later calls swap its
//! configuration in place.

use crate::errors::DbError;
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_RETENTION: usize = 7;

static HANDLE: Mutex<Option<log4rs::Handle>> = parking_lot::const_mutex(None);

fn config_error(e: impl std::fmt::Display) -> DbError {
    DbError::Config(format!("logging: {e}"))
}

fn install(config: Config) -> Result<(), DbError> {
    let mut slot = HANDLE.lock();
    if let Some(handle) = slot.as_ref() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config).map_err(config_error)?;
    *slot = Some(handle);
    Ok(())
}

/// Initialize from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns `DbError::Config` if the file is missing or invalid, or another logger is installed.
pub fn init() -> Result<(), DbError> {
    init_path(Path::new("log4rs.yaml"))
}

/// # Errors
/// Returns `DbError::Config` if the file is missing or invalid, or another logger is installed.
pub fn init_path(path: &Path) -> Result<(), DbError> {
    let config = log4rs::config::load_config_file(path, log4rs::config::Deserializers::default())
        .map_err(config_error)?;
    install(config)
}

/// `error|warn|info|debug|trace|off`; anything else is `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let pattern = base.join(format!("{stem}.{{}}.log"));
    let roller =
        FixedWindowRoller::builder().build(&pattern.display().to_string(), keep).map_err(config_error)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Log to rolling files under `dir` (default: the working directory).
///
/// - level: see [`parse_level`]; default `info`
/// - retention: rolled files to keep; default 7
///
/// # Errors
/// Returns an error if the directory or files cannot be created, or another logger is installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), DbError> {
    configure_logging_with_dev(dir, level, retention, false)
}

/// Like [`configure_logging`]; with `enable_dev6`, lines from the `dev6!` channel also go to
/// `dev6.log` next to `app.log`.
///
/// # Errors
/// Returns an error if the directory or files cannot be created, or another logger is installed.
pub fn configure_logging_with_dev(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> Result<(), DbError> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(DEFAULT_RETENTION).max(1)).unwrap_or(u32::MAX);
    let lvl = parse_level(level.unwrap_or("info"));

    let mut builder =
        Config::builder().appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)));
    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev6")
                    .additive(false)
                    .build(crate::devlog::TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(crate::devlog::TARGET, LevelFilter::Off))
    };
    let config = builder.build(Root::builder().appender("app").build(lvl)).map_err(config_error)?;
    install(config)?;
    log::info!("logging to {} at {lvl}", base.display());
    Ok(())
}

/// Configure from `MINQ_LOG_DIR`, `MINQ_LOG_LEVEL`, `MINQ_LOG_RETENTION` and `MINQ_DEV6`.
///
/// # Errors
/// See [`configure_logging_with_dev`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("MINQ_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("MINQ_LOG_LEVEL").ok();
    let retention = std::env::var("MINQ_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    let dev6 = std::env::var("MINQ_DEV6").is_ok_and(|s| is_truthy(&s));
    configure_logging_with_dev(dir.as_deref(), level.as_deref(), retention, dev6)
}

pub(crate) fn is_truthy(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
