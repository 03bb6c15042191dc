//! Process-wide logging: a small `log` backend writing single-line records
//! to stderr, or to the file given with `--log`. The level comes from the
//! `SKIFF_LOG` environment variable and defaults to `warn` so that bootstrap
//! warnings stay visible without drowning the container's own output.

use std::fs::{File, OpenOptions};
use std::io::{stderr, Write};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::SecondsFormat;
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<RuntimeLogger> = OnceCell::new();
static LOG_FILE: OnceCell<Option<File>> = OnceCell::new();

pub const LOG_LEVEL_ENV: &str = "SKIFF_LOG";

pub fn init(log_file: Option<PathBuf>) -> std::io::Result<()> {
    LOG_FILE.get_or_try_init(|| -> std::io::Result<Option<File>> {
        match log_file {
            Some(path) => Ok(Some(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => Ok(None),
        }
    })?;

    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|raw| LevelFilter::from_str(&raw).ok())
        .unwrap_or(LevelFilter::Warn);

    let logger = LOGGER.get_or_init(|| RuntimeLogger { level });
    // A second init (e.g. from tests) keeps the first backend.
    let _ = log::set_logger(logger).map(|()| log::set_max_level(level));
    Ok(())
}

struct RuntimeLogger {
    level: LevelFilter,
}

impl Log for RuntimeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!(
            "[{} {}] {}",
            record.level(),
            chrono::Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            record.args()
        );

        match LOG_FILE.get().and_then(|f| f.as_ref()) {
            Some(mut file) => {
                let _ = writeln!(file, "{}", line);
            }
            None => {
                let _ = writeln!(stderr(), "{}", line);
            }
        }
    }

    fn flush(&self) {
        match LOG_FILE.get().and_then(|f| f.as_ref()) {
            Some(mut file) => {
                let _ = file.flush();
            }
            None => {
                let _ = stderr().flush();
            }
        }
    }
}
