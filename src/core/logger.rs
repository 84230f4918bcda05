use flexi_logger::{
    filter::{self, LogLineFilter},
    Age, Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
    WriteMode,
};

use super::configuration::Configuration;

const DEFAULT_LEVEL: &str = "info";
const DEFAULT_RETENTION: usize = 7;

/// Drops the chatter of the HTTP stack.
pub struct IgnoreHttpStack;

impl LogLineFilter for IgnoreHttpStack {
    fn write(
        &self,
        now: &mut flexi_logger::DeferredNow,
        record: &log::Record,
        log_line_writer: &dyn filter::LogLineWriter,
    ) -> std::io::Result<()> {
        if is_http_stack(record.module_path().unwrap_or_default()) {
            return Ok(());
        }

        log_line_writer.write(now, record)
    }
}

fn is_http_stack(path: &str) -> bool {
    ["reqwest", "hyper", "wiremock"]
        .iter()
        .any(|p| path.starts_with(p))
}

/// Starts logging to stderr and to daily rotated files in the data directory.
/// `verbosity` wins over the configured level.
pub fn init(
    conf: &Configuration,
    verbosity: Option<log::LevelFilter>,
) -> Result<LoggerHandle, FlexiLoggerError> {
    let level = match verbosity {
        Some(v) => v.to_string().to_lowercase(),
        None => conf
            .log
            .level
            .clone()
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
    };

    let directory = conf
        .core
        .data_directory
        .clone()
        .unwrap_or_else(|| ".".to_string());

    Logger::try_with_str(level)?
        .log_to_file(FileSpec::default().directory(directory))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(conf.log.retention.unwrap_or(DEFAULT_RETENTION)),
        )
        .duplicate_to_stderr(Duplicate::All)
        .filter(Box::new(IgnoreHttpStack))
        .write_mode(WriteMode::Async)
        .start()
}
