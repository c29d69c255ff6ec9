//! File logging and the audit trail of filesystem changes.
//!
//! Every file the library creates, moves or deletes is reported through
//! [`log_fs_modification`] under the `ebm::fs` target, so the effect of an
//! import or removal can be reconstructed from the log alone.

use log::{error, info, LevelFilter};
use std::path::Path;

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;

const LOG_FILE_NAME: &str = "ebm.log";
const ROLL_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const ARCHIVED_LOGS: u32 = 5;
const FS_TARGET: &str = "ebm::fs";

/// Log to a rolling file in `log_dir`, echoing warnings and errors to stderr.
///
/// `EBM_LOG` overrides `level` when it parses as a level filter.
pub fn init_logger(log_dir: &Path, level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let level = std::env::var("EBM_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(level);

    let log_file = log_dir.join(LOG_FILE_NAME);
    let archive_pattern = log_dir.join("ebm.{}.log");
    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern.to_string_lossy(), ARCHIVED_LOGS)
        .map_err(|e| format!("Failed to create log roller: {}", e))?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(ROLL_SIZE_BYTES)),
        Box::new(roller),
    );

    let file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] [{t}] - {m}{n}",
        )))
        .build(&log_file, Box::new(policy))
        .map_err(|e| format!("Failed to create log appender: {}", e))?;
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l}: {m}{n}")))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
                .build("stderr", Box::new(stderr)),
        )
        .build(
            Root::builder()
                .appender("file")
                .appender("stderr")
                .build(level),
        )
        .map_err(|e| format!("Failed to build log config: {}", e))?;

    log4rs::init_config(config).map_err(|e| format!("Failed to initialize log4rs: {}", e))?;

    info!("Logging to {} at level {}", log_file.display(), level);
    Ok(())
}

/// A filesystem operation on `path` failed
pub fn log_file_error(path: &Path, operation: &str, error: &dyn std::error::Error) {
    error!(target: FS_TARGET, "{} failed for {}: {}", operation, path.display(), error);
}

/// The library changed `path` on disk
pub fn log_fs_modification(operation: &str, path: &Path, details: Option<&str>) {
    match details {
        Some(details) if !details.is_empty() => {
            info!(target: FS_TARGET, "{} {} ({})", operation, path.display(), details)
        }
        _ => info!(target: FS_TARGET, "{} {}", operation, path.display()),
    }
}
