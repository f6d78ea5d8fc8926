mod config;
mod driver;
mod hotplug;
mod input;
mod instances;
mod logging;
mod notify;
mod orchestrator;
mod paths;
mod process;
mod screen;
mod session;
mod wm;

use crate::config::{SessionMode, load_cfg};
use crate::driver::RealDriver;
use crate::hotplug::ControllerMonitor;
use crate::instances::InstanceLifecycleManager;
use crate::orchestrator::Orchestrator;
use crate::process::ProcScanner;
use crate::wm::LayoutEngine;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Signal handlers must not run cleanup themselves; they only raise the
/// cancellation flag, which the loop observes on its next tick.
extern "C" fn on_signal(_: libc::c_int) {
    CANCELLED.store(true, Ordering::Relaxed);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_signal as libc::sighandler_t);
    }
}

fn resolve_launch_target(command: &str) -> Option<PathBuf> {
    // Anything with a path separator resolves against the filesystem
    // directly (absolute, or relative to the working directory); only
    // bare names go through the PATH search.
    let path = Path::new(command);
    if command.contains('/') {
        return path.exists().then(|| path.to_path_buf());
    }

    let path_var = std::env::var("PATH").ok()?;
    path_var
        .split(':')
        .map(|dir| Path::new(dir).join(command))
        .find(|candidate| candidate.exists())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help") {
        println!("{}", USAGE_TEXT);
        return;
    }

    logging::init();

    let mut cfg = load_cfg();
    for arg in &args[1..] {
        if let Some(value) = arg.strip_prefix("--mode=") {
            match value {
                "static" => cfg.mode = SessionMode::Static,
                "dynamic" => cfg.mode = SessionMode::Dynamic,
                other => {
                    eprintln!("[splitcraft] unknown mode '{}'", other);
                    println!("{}", USAGE_TEXT);
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("[splitcraft] unknown option '{}'", arg);
            println!("{}", USAGE_TEXT);
            std::process::exit(1);
        }
    }

    // Nothing useful can happen without the launcher; fail loud and early.
    let Some(launcher) = resolve_launch_target(&cfg.launch_command) else {
        logln!(
            "launch command '{}' not found on PATH; check launch_command in settings.json",
            cfg.launch_command
        );
        std::process::exit(1);
    };

    logln!(
        "splitcraft {} starting ({:?} mode, launcher {})",
        env!("CARGO_PKG_VERSION"),
        cfg.mode,
        launcher.display()
    );

    install_signal_handlers();

    let manager = InstanceLifecycleManager::new(ProcScanner, &cfg);
    manager.kill_strays();

    let engine = LayoutEngine::detect();
    let driver = RealDriver::new(manager, engine, &cfg);
    let mut orchestrator = Orchestrator::new(driver, &cfg, &CANCELLED);

    let initial_count = input::snapshot_count();

    match cfg.mode {
        SessionMode::Dynamic => {
            let mut monitor =
                ControllerMonitor::new(Duration::from_secs(cfg.poll_interval_secs));
            let events = monitor.start();
            orchestrator.run(Some(events), Some(monitor), initial_count);
        }
        SessionMode::Static => {
            orchestrator.run(None, None, initial_count);
        }
    }

    logln!("session ended");
}

static USAGE_TEXT: &str = r#"
Usage: splitcraft [OPTIONS]

Orchestrates up to four split-screen game instances, scaling the session
as controllers connect and disconnect.

Options:
    --mode=dynamic    Grow and shrink the session with controller hotplug (default)
    --mode=static     Launch for the controllers present at startup and never rescale
    --help            Show this help

Environment:
    SPLITCRAFT_DEBUG=1    Enable verbose diagnostics
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashed_commands_resolve_against_the_working_directory() {
        // cargo runs tests from the crate root, so this file exists.
        assert_eq!(
            resolve_launch_target("./Cargo.toml"),
            Some(PathBuf::from("./Cargo.toml"))
        );
        assert_eq!(resolve_launch_target("./no-such-launcher"), None);
    }

    #[test]
    fn bare_commands_resolve_through_path() {
        assert!(resolve_launch_target("sh").is_some());
        assert!(resolve_launch_target("no-such-launcher-anywhere").is_none());
    }
}
