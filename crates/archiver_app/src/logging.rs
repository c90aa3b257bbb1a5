//! Logger setup for the `wiki-archiver` binary.

use std::fs::File;
use std::path::Path;

use archiver_logging::Verbosity;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Terminal logging at the level chosen by `verbosity`, plus a full
/// debug-level copy in `log_file` when one is given.
pub fn initialize(verbosity: Verbosity, log_file: Option<&Path>) {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        verbosity.level(),
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(file_logger) = log_file.and_then(|path| create_file_logger(path, config)) {
        loggers.push(file_logger);
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .add_filter_allow_str("archiver")
        .add_filter_allow_str("wiki_archiver")
        .build()
}

fn create_file_logger(path: &Path, config: Config) -> Option<Box<WriteLogger<File>>> {
    match File::create(path) {
        Ok(file) => Some(WriteLogger::new(LevelFilter::Debug, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            None
        }
    }
}
