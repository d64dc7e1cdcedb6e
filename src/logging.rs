use std::path::Path;

use anyhow::Context;


/// Timestamped lines to stderr and, if given, appended to `file`.
pub fn dispatch(level: log::LevelFilter, file: Option<&Path>) -> anyhow::Result<fern::Dispatch> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {:<5} {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(file) = file {
        let log_file = fern::log_file(file)
            .with_context(|| format!("Unable to open log file {}", file.to_string_lossy()))?;
        dispatch = dispatch.chain(log_file);
    }
    Ok(dispatch)
}

pub fn init(level: log::LevelFilter, file: Option<&Path>) -> anyhow::Result<()> {
    dispatch(level, file)?
        .apply()
        .context("Unable to install logger")
}


#[cfg(test)]
mod test {
    use super::*;
    use log::{Level, LevelFilter, Log, Record};

    #[test]
    fn writes_level_target_and_message_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bastion.log");
        let (_, logger) = dispatch(LevelFilter::Info, Some(&path)).unwrap().into_log();

        logger.log(&Record::builder()
            .args(format_args!("listening on {}", 8080))
            .level(Level::Info)
            .target("bastion::server")
            .build());
        logger.log(&Record::builder()
            .args(format_args!("too chatty"))
            .level(Level::Debug)
            .target("bastion::server")
            .build());
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("INFO  bastion::server: listening on 8080"), "{}", contents);
        assert!(!contents.contains("too chatty"));
        assert_eq!(contents.lines().count(), 1);
    }
}
