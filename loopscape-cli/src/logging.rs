use clap::ArgMatches;
use log::{LevelFilter, Log, Metadata, Record};
use std::sync::OnceLock;

struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Parse `RUST_LOG` as a single level name, defaulting to info.
fn env_level() -> LevelFilter {
    match std::env::var("RUST_LOG") {
        Ok(level) => match level.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        },
        Err(_) => LevelFilter::Info,
    }
}

fn flag(args: &ArgMatches, name: &str) -> bool {
    args.get_flag(name)
        || args
            .subcommand()
            .map_or(false, |(_, sub)| sub.get_flag(name))
}

/// `--quiet` and `--debug` win over `RUST_LOG`.
pub fn level_from_args(args: &ArgMatches) -> LevelFilter {
    if flag(args, "quiet") {
        LevelFilter::Error
    } else if flag(args, "debug") {
        LevelFilter::Debug
    } else {
        env_level()
    }
}

pub fn init(level: LevelFilter) {
    let logger_ref = LOGGER.get_or_init(|| StderrLogger { level });
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }
}
