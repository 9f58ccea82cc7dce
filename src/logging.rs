use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

/// Writes every log line to stdout and, in parallel, to a log file — the same shape as the
/// original tool's `zerolog.MultiLevelWriter(consoleWriter, logFile)`.
struct DualWriter {
    file: Mutex<File>,
}

impl Log for DualWriter {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{:<5} {}", record.level(), record.args());
        println!("{line}");
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Initializes the global logger. `verbose` maps to `Debug`, otherwise `Info`, matching the `-v`
/// CLI flag's effect on the original Go tool's zerolog level.
pub fn init(log_file: &str, verbose: bool) -> Result<(), String> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_file)
        .map_err(|e| format!("could not open log file {log_file:?}: {e}"))?;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    log::set_max_level(level);
    log::set_boxed_logger(Box::new(DualWriter {
        file: Mutex::new(file),
    }))
    .map_err(|e| format!("logger already initialized: {e}"))?;

    Ok(())
}
