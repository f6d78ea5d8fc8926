//! The session state machine.
//!
//! Single-threaded and cooperative: each tick waits briefly for a
//! controller event, then checks every occupied slot for exited instances.
//! Scale-up is event-driven; scale-down only ever follows an instance
//! exiting. The loop is the sole mutator of session state, so the only
//! concurrency boundary is the event channel from the hotplug monitor.

use crate::config::{SessionMode, SplitcraftConfig};
use crate::hotplug::ControllerMonitor;
use crate::session::{MAX_SLOTS, SessionState};
use crate::{debugln, logln};

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Bounded event wait per tick; also bounds quit-detection latency.
const TICK: Duration = Duration::from_secs(1);

/// Everything the loop needs from the rest of the system. The production
/// implementation composes the lifecycle manager and layout engine; tests
/// substitute a scripted recorder.
pub trait SessionDriver {
    fn launch(&mut self, slot: usize, total: usize) -> Result<(), Box<dyn Error>>;
    fn stop(&mut self, slot: usize);
    fn stop_all(&mut self);
    fn is_running(&mut self, slot: usize) -> bool;
    fn apply_layout(&mut self, total: usize);
    fn occupied(&self) -> Vec<usize>;
    fn next_free(&self) -> Option<usize>;
    fn count_active(&self) -> usize;
    fn teardown(&mut self);
}

#[derive(Debug, PartialEq, Eq)]
enum SweepResult {
    Continue,
    SessionEnded,
}

pub struct Orchestrator<D: SessionDriver> {
    driver: D,
    state: SessionState,
    inter_launch_delay: Duration,
    settle_delay: Duration,
    cancel: &'static AtomicBool,
    cleanup_done: bool,
    origin_pid: u32,
}

impl<D: SessionDriver> Orchestrator<D> {
    pub fn new(driver: D, cfg: &SplitcraftConfig, cancel: &'static AtomicBool) -> Self {
        Self {
            driver,
            state: SessionState::new(cfg.mode),
            inter_launch_delay: Duration::from_secs(cfg.inter_launch_delay_secs),
            settle_delay: Duration::from_secs(cfg.settle_delay_secs),
            cancel,
            cleanup_done: false,
            origin_pid: std::process::id(),
        }
    }

    /// Run until the session ends or cancellation is requested.
    ///
    /// `events` is None in static mode, where the initial snapshot alone
    /// decides the player count.
    pub fn run(
        &mut self,
        events: Option<Receiver<usize>>,
        mut monitor: Option<ControllerMonitor>,
        initial_count: usize,
    ) {
        logln!(
            "session loop starting ({:?} mode, {} controller(s) connected)",
            self.state.mode,
            initial_count
        );

        if initial_count > 0 {
            self.scale_up(initial_count);
        } else if self.state.mode == SessionMode::Static {
            logln!("no controllers connected, nothing to launch");
            return;
        }

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                logln!("cancellation requested");
                self.shutdown(&mut monitor);
                return;
            }

            match &events {
                Some(rx) => match rx.recv_timeout(TICK) {
                    Ok(count) => self.handle_count(count),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => std::thread::sleep(TICK),
                },
                None => std::thread::sleep(TICK),
            }

            if self.sweep() == SweepResult::SessionEnded {
                logln!("last instance exited, ending session");
                self.shutdown(&mut monitor);
                return;
            }
        }
    }

    /// React to a controller-count event. Only growth matters here: a
    /// count drop never stops instances, players quit from inside the game.
    fn handle_count(&mut self, count: usize) {
        if count > self.state.active_count {
            logln!(
                "controller count {} > {} active, scaling up",
                count,
                self.state.active_count
            );
            self.scale_up(count);
        } else {
            debugln!(
                "controller count {} <= {} active, ignoring",
                count,
                self.state.active_count
            );
        }
    }

    /// Launch slots sequentially up to `to`, then position windows once
    /// everything has had time to settle.
    fn scale_up(&mut self, to: usize) {
        let target = to.min(MAX_SLOTS);
        let mut launched_any = false;

        while self.state.active_count < target {
            let Some(slot) = self.driver.next_free() else {
                break;
            };
            match self.driver.launch(slot, target) {
                Ok(()) => {
                    self.state.ever_launched = true;
                    launched_any = true;
                    self.state.active_count = self.driver.count_active();
                    if self.state.active_count < target {
                        std::thread::sleep(self.inter_launch_delay);
                    }
                }
                Err(e) => {
                    logln!("slot {} - launch failed: {}", slot + 1, e);
                    break;
                }
            }
        }

        if launched_any {
            std::thread::sleep(self.settle_delay);
            self.driver.apply_layout(self.state.active_count);
            // A restart relayout inside apply can lose slots; resync.
            self.state.active_count = self.driver.count_active();
        }
    }

    /// Clear any occupied slot whose instance is gone; relayout the rest,
    /// or end the session when nothing is left.
    ///
    /// The zero-active check runs every tick, not just when an exit was
    /// observed: a restart relayout can empty slots on its own when a
    /// relaunch fails, and those must still end the session.
    fn sweep(&mut self) -> SweepResult {
        let mut exited = Vec::new();
        for slot in self.driver.occupied() {
            if !self.driver.is_running(slot) {
                logln!("slot {} - instance no longer running", slot + 1);
                exited.push(slot);
            }
        }

        for slot in exited.iter() {
            self.driver.stop(*slot);
        }
        self.state.active_count = self.driver.count_active();

        if !exited.is_empty() && self.state.active_count > 0 {
            self.driver.apply_layout(self.state.active_count);
            self.state.active_count = self.driver.count_active();
        }

        if self.state.active_count == 0 && self.state.ever_launched {
            SweepResult::SessionEnded
        } else {
            SweepResult::Continue
        }
    }

    /// The single cleanup path, reached from session end and cancellation
    /// alike. Idempotent, and guarded so it only ever runs in the original
    /// orchestrator process, never in a forked helper that inherited the
    /// signal disposition.
    fn shutdown(&mut self, monitor: &mut Option<ControllerMonitor>) {
        if std::process::id() != self.origin_pid {
            return;
        }
        if self.cleanup_done {
            debugln!("cleanup already performed");
            return;
        }
        self.cleanup_done = true;

        self.driver.stop_all();
        if let Some(mut mon) = monitor.take() {
            mon.stop();
        }
        self.driver.teardown();
        self.state.active_count = 0;
        logln!("session cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, PartialEq, Eq, Clone)]
    enum Call {
        Launch(usize, usize),
        Stop(usize),
        StopAll,
        Apply(usize),
        Teardown,
    }

    #[derive(Default)]
    struct ScriptedDriver {
        calls: Vec<Call>,
        occupied: [bool; MAX_SLOTS],
        dead: HashSet<usize>,
    }

    impl SessionDriver for ScriptedDriver {
        fn launch(&mut self, slot: usize, total: usize) -> Result<(), Box<dyn Error>> {
            self.calls.push(Call::Launch(slot, total));
            self.occupied[slot] = true;
            Ok(())
        }

        fn stop(&mut self, slot: usize) {
            self.calls.push(Call::Stop(slot));
            self.occupied[slot] = false;
        }

        fn stop_all(&mut self) {
            self.calls.push(Call::StopAll);
            self.occupied = [false; MAX_SLOTS];
        }

        fn is_running(&mut self, slot: usize) -> bool {
            self.occupied[slot] && !self.dead.contains(&slot)
        }

        fn apply_layout(&mut self, total: usize) {
            self.calls.push(Call::Apply(total));
        }

        fn occupied(&self) -> Vec<usize> {
            (0..MAX_SLOTS).filter(|&i| self.occupied[i]).collect()
        }

        fn next_free(&self) -> Option<usize> {
            (0..MAX_SLOTS).find(|&i| !self.occupied[i])
        }

        fn count_active(&self) -> usize {
            self.occupied.iter().filter(|&&o| o).count()
        }

        fn teardown(&mut self) {
            self.calls.push(Call::Teardown);
        }
    }

    fn quiet_cfg() -> SplitcraftConfig {
        let mut cfg = SplitcraftConfig::default();
        cfg.inter_launch_delay_secs = 0;
        cfg.settle_delay_secs = 0;
        cfg
    }

    fn orchestrator() -> Orchestrator<ScriptedDriver> {
        let cancel: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
        Orchestrator::new(ScriptedDriver::default(), &quiet_cfg(), cancel)
    }

    #[test]
    fn scale_up_launches_then_applies_in_order() {
        let mut orch = orchestrator();
        orch.handle_count(1);
        orch.handle_count(2);

        assert_eq!(
            orch.driver.calls,
            vec![
                Call::Launch(0, 1),
                Call::Apply(1),
                Call::Launch(1, 2),
                Call::Apply(2),
            ]
        );
        assert_eq!(orch.state.active_count, 2);
        assert!(orch.state.ever_launched);
    }

    #[test]
    fn lower_count_events_are_ignored() {
        let mut orch = orchestrator();
        orch.handle_count(2);
        let before = orch.driver.calls.len();

        orch.handle_count(1);
        orch.handle_count(2);
        assert_eq!(orch.driver.calls.len(), before);
        assert_eq!(orch.state.active_count, 2);
    }

    #[test]
    fn count_is_capped_at_four_slots() {
        let mut orch = orchestrator();
        orch.handle_count(9);

        let launches: Vec<&Call> = orch
            .driver
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Launch(_, _)))
            .collect();
        assert_eq!(launches.len(), 4);
        assert_eq!(*orch.driver.calls.last().unwrap(), Call::Apply(4));
    }

    #[test]
    fn exited_instance_is_cleared_and_remainder_relaid() {
        let mut orch = orchestrator();
        orch.handle_count(2);
        orch.driver.dead.insert(0);

        assert_eq!(orch.sweep(), SweepResult::Continue);
        assert_eq!(orch.state.active_count, 1);

        let tail: Vec<Call> = orch.driver.calls[3..].to_vec();
        assert_eq!(tail, vec![Call::Stop(0), Call::Apply(1)]);
    }

    #[test]
    fn last_exit_ends_the_session_without_a_relayout() {
        let mut orch = orchestrator();
        orch.handle_count(1);
        orch.driver.dead.insert(0);

        assert_eq!(orch.sweep(), SweepResult::SessionEnded);
        assert_eq!(orch.state.active_count, 0);
        assert_eq!(*orch.driver.calls.last().unwrap(), Call::Stop(0));
    }

    #[test]
    fn unobserved_slot_loss_still_ends_the_session() {
        let mut orch = orchestrator();
        orch.handle_count(1);

        // A failed relaunch during a restart relayout clears the slot
        // without the loop ever seeing the instance exit.
        orch.driver.occupied[0] = false;

        assert_eq!(orch.sweep(), SweepResult::SessionEnded);
        assert_eq!(orch.state.active_count, 0);
    }

    #[test]
    fn active_count_resyncs_after_scale_up_layout() {
        let mut orch = orchestrator();
        orch.handle_count(2);
        assert_eq!(orch.state.active_count, 2);
        assert_eq!(orch.state.active_count, orch.driver.count_active());
    }

    #[test]
    fn sweep_without_launches_never_ends_the_session() {
        let mut orch = orchestrator();
        assert_eq!(orch.sweep(), SweepResult::Continue);
        assert!(orch.driver.calls.is_empty());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut orch = orchestrator();
        orch.handle_count(3);

        orch.shutdown(&mut None);
        orch.shutdown(&mut None);

        let stop_alls = orch
            .driver
            .calls
            .iter()
            .filter(|c| **c == Call::StopAll)
            .count();
        let teardowns = orch
            .driver
            .calls
            .iter()
            .filter(|c| **c == Call::Teardown)
            .count();
        assert_eq!(stop_alls, 1);
        assert_eq!(teardowns, 1);
        assert_eq!(orch.driver.count_active(), 0);
    }
}
