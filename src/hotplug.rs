//! Controller hotplug monitor.
//!
//! Watches the input subsystem over a udev monitor socket and emits the
//! player count whenever it changes. If the socket cannot be opened the
//! monitor silently degrades to fixed-interval polling; it never fails.

use crate::input::snapshot_count;
use crate::{debugln, logln};

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::thread::JoinHandle;
use std::time::Duration;

/// Wait for device nodes to settle after a hotplug event before re-counting.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Sleep between udev socket drains.
const WATCH_IDLE: Duration = Duration::from_millis(250);

pub struct ControllerMonitor {
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ControllerMonitor {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Spawn the background watcher and return its event channel. The
    /// channel is unbuffered; the orchestrator reads it with a timeout.
    pub fn start(&mut self) -> Receiver<usize> {
        let (tx, rx) = sync_channel(0);
        let stop = self.stop.clone();
        let poll_interval = self.poll_interval;
        self.thread = Some(std::thread::spawn(move || {
            run_monitor(tx, stop, poll_interval);
        }));
        rx
    }

    /// Stop the watcher thread. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            debugln!("hotplug - monitor stopped");
        }
    }
}

impl Drop for ControllerMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_monitor(tx: SyncSender<usize>, stop: Arc<AtomicBool>, poll_interval: Duration) {
    let last = snapshot_count();

    match open_udev_socket() {
        Ok(socket) => {
            logln!("hotplug - watching input subsystem via udev");
            watch_loop(socket, tx, stop, last);
        }
        Err(e) => {
            logln!(
                "hotplug - udev watch unavailable ({}), polling every {}s",
                e,
                poll_interval.as_secs()
            );
            poll_loop(tx, stop, poll_interval, last);
        }
    }
}

fn open_udev_socket() -> std::io::Result<udev::MonitorSocket> {
    let socket = udev::MonitorBuilder::new()?
        .match_subsystem("input")?
        .listen()?;

    // Non-blocking reads so the loop can interleave stop checks.
    unsafe {
        let fd = socket.as_raw_fd();
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }

    Ok(socket)
}

/// Drain pending udev events, returning true if any event device node
/// was added or removed.
fn drain_events(socket: &udev::MonitorSocket) -> bool {
    let mut saw_change = false;
    for event in socket.iter() {
        // Only event* nodes matter (not js*, mouse*, etc.)
        if let Some(devnode) = event.devnode() {
            let path = devnode.to_string_lossy();
            if path.contains("/dev/input/event") {
                match event.event_type() {
                    udev::EventType::Add => {
                        debugln!("hotplug - added {}", path);
                        saw_change = true;
                    }
                    udev::EventType::Remove => {
                        debugln!("hotplug - removed {}", path);
                        saw_change = true;
                    }
                    _ => {}
                }
            }
        }
    }
    saw_change
}

fn watch_loop(
    socket: udev::MonitorSocket,
    tx: SyncSender<usize>,
    stop: Arc<AtomicBool>,
    mut last: usize,
) {
    while !stop.load(Ordering::Relaxed) {
        if drain_events(&socket) {
            // Let the device settle, fold in any follow-up events, then
            // take a fresh snapshot.
            std::thread::sleep(DEBOUNCE);
            drain_events(&socket);

            let count = snapshot_count();
            if count != last {
                logln!("hotplug - controller count {} -> {}", last, count);
                if !deliver(&tx, &stop, count) {
                    return;
                }
                last = count;
            }
        }
        std::thread::sleep(WATCH_IDLE);
    }
}

fn poll_loop(
    tx: SyncSender<usize>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    mut last: usize,
) {
    while !stop.load(Ordering::Relaxed) {
        sleep_responsive(poll_interval, &stop);
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let count = snapshot_count();
        if count != last {
            logln!("hotplug - controller count {} -> {}", last, count);
            if !deliver(&tx, &stop, count) {
                return;
            }
            last = count;
        }
    }
}

/// Offer `count` on the rendezvous channel until the loop takes it.
/// Returns false when the receiver is gone.
fn deliver(tx: &SyncSender<usize>, stop: &AtomicBool, count: usize) -> bool {
    loop {
        match tx.try_send(count) {
            Ok(()) => return true,
            Err(TrySendError::Full(_)) => {
                if stop.load(Ordering::Relaxed) {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

fn sleep_responsive(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    let step = Duration::from_millis(250);
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let chunk = remaining.min(step);
        std::thread::sleep(chunk);
        remaining -= chunk;
    }
}
