//! Run-scoped logging: console lines plus a timestamped log file.
//!
//! Each run writes to its own file under the data dir; at startup old run
//! logs are pruned so the last 10 runs are retained.

use crate::paths::PATH_LOGS;

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{LazyLock, Mutex};

/// Number of run logs to retain, including the current one.
const KEEP_RUNS: usize = 10;

static SINK: Mutex<Option<File>> = Mutex::new(None);

static DEBUG: LazyLock<bool> =
    LazyLock::new(|| std::env::var("SPLITCRAFT_DEBUG").is_ok_and(|v| v == "1"));

/// Open this run's log file. Failure is non-fatal; logging then only
/// reaches the console.
pub fn init() {
    if let Err(e) = open_run_log() {
        eprintln!("[splitcraft] log file unavailable: {}", e);
    }
}

fn open_run_log() -> std::io::Result<()> {
    fs::create_dir_all(&*PATH_LOGS)?;
    prune_old_runs()?;

    let name = format!("run-{}.log", Local::now().format("%Y%m%d-%H%M%S"));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(PATH_LOGS.join(name))?;

    if let Ok(mut guard) = SINK.lock() {
        *guard = Some(file);
    }
    Ok(())
}

fn prune_old_runs() -> std::io::Result<()> {
    let mut runs: Vec<PathBuf> = fs::read_dir(&*PATH_LOGS)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("run-"))
        })
        .collect();

    // Filenames embed the start timestamp, so lexical order is age order.
    runs.sort();
    while runs.len() >= KEEP_RUNS {
        let _ = fs::remove_file(runs.remove(0));
    }
    Ok(())
}

pub fn log_line(msg: &str) {
    println!("[splitcraft] {}", msg);
    if let Ok(mut guard) = SINK.lock()
        && let Some(file) = guard.as_mut()
    {
        let _ = writeln!(file, "{} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), msg);
    }
}

pub fn debug_line(msg: &str) {
    if *DEBUG {
        log_line(msg);
    }
}

#[macro_export]
macro_rules! logln {
    ($($arg:tt)*) => {
        $crate::logging::log_line(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! debugln {
    ($($arg:tt)*) => {
        $crate::logging::debug_line(&format!($($arg)*))
    };
}
