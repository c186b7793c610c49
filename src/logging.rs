/// Logging setup
///
/// Console output plus a daily log file under the user data directory, so
/// a failed batch can still be diagnosed after the window is closed.

use std::path::PathBuf;

use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;

/// Install the global logger; call once, before anything logs
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for("pixmix", LevelFilter::Debug)
        .chain(std::io::stdout());

    // File logging is best-effort: a missing data dir just means console only
    if let Some(dir) = log_directory() {
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("pixmix-{}.log", Local::now().format("%Y%m%d")));
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

/// Where log files go:
/// - Linux: ~/.local/share/pixmix/logs
/// - macOS: ~/Library/Application Support/pixmix/logs
/// - Windows: %APPDATA%\pixmix\logs
fn log_directory() -> Option<PathBuf> {
    dirs::data_dir().map(|base| base.join("pixmix").join("logs"))
}
