use std::error::Error;
use std::fs::File;
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Terminal logging at `level`, mirrored to `file` when given.
pub fn init_logging(level: LevelFilter, file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = file {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        loggers.push(WriteLogger::new(level, Config::default(), File::create(path)?));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

pub fn parse_level(name: &str) -> Result<LevelFilter, Box<dyn Error>> {
    name.parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level '{}'", name).into())
}
