use std::path::Path;

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Initializes logging for a cast root: console plus a rolling file under
/// `<root>/.cast/logs/cast.log`. Called by the binary; the library only uses
/// the `log` macros.
///
/// # Errors
/// Returns an error if the log directory cannot be created or log4rs is
/// already initialized.
pub fn init_for_root(root: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = root.join(".cast").join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let logfile = log_dir.join("cast.log");

    let file_encoder =
        Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}"));
    let file_appender = FileAppender::builder().encoder(file_encoder).build(logfile)?;
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({l})} {m}{n}")))
        .build();

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("file").appender("console").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Console-only fallback for commands that run outside any cast root.
///
/// # Errors
/// Returns an error if log4rs is already initialized.
pub fn init_console() -> Result<(), Box<dyn std::error::Error>> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({l})} {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("console").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}
