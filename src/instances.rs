//! Instance lifecycle: launch, liveness, stop.
//!
//! The launch command is opaque and may be wrapped by sandboxing or
//! inhibitor layers that exec and exit before the real game process is up,
//! so there is no reliable parent/child relationship. Liveness is treated
//! as probabilistic: worker identity is resolved lazily from the process
//! table and, until something identifiable exists, a bounded grace window
//! keeps freshly launched slots alive.

use crate::config::SplitcraftConfig;
use crate::process::ProcessLocator;
use crate::session::{MAX_SLOTS, Slot, count_active, next_free, occupied_ordinals};
use crate::wm::WindowTarget;
use crate::wm::layout::Rect;
use crate::{debugln, logln};

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Directive written to `<instance_dir>/config/<layout_file>` before a
/// launch. Regular launches always use fullscreen and leave positioning to
/// the layout engine; only the restart fallback bakes a window geometry in,
/// because in-game split modes are known to crash under one display backend.
#[derive(Clone, Copy, Debug)]
pub enum LayoutDirective {
    Fullscreen,
    Windowed(Rect),
}

/// Per-slot launch ingredients.
#[derive(Clone)]
pub struct SlotPlan {
    pub instance_dir: PathBuf,
    pub profile: String,
}

pub struct InstanceLifecycleManager<L: ProcessLocator> {
    locator: L,
    plans: Vec<SlotPlan>,
    launch_command: String,
    launch_args: Vec<String>,
    layout_file: String,
    grace: Duration,
    term_wait: Duration,
    slots: [Slot; MAX_SLOTS],
    children: [Option<Child>; MAX_SLOTS],
}

impl<L: ProcessLocator> InstanceLifecycleManager<L> {
    pub fn new(locator: L, cfg: &SplitcraftConfig) -> Self {
        let plans: Vec<SlotPlan> = cfg
            .instances
            .iter()
            .take(MAX_SLOTS)
            .enumerate()
            .map(|(i, dir)| SlotPlan {
                instance_dir: PathBuf::from(dir),
                profile: cfg
                    .profiles
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("Player{}", i + 1)),
            })
            .collect();

        Self::from_parts(
            locator,
            plans,
            cfg.launch_command.clone(),
            cfg.launch_args.clone(),
            cfg.layout_file.clone(),
            Duration::from_secs(cfg.grace_secs),
            Duration::from_secs(2),
        )
    }

    pub fn from_parts(
        locator: L,
        plans: Vec<SlotPlan>,
        launch_command: String,
        launch_args: Vec<String>,
        layout_file: String,
        grace: Duration,
        term_wait: Duration,
    ) -> Self {
        Self {
            locator,
            plans,
            launch_command,
            launch_args,
            layout_file,
            grace,
            term_wait,
            slots: Default::default(),
            children: Default::default(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.plans.len()
    }

    pub fn next_free_slot(&self) -> Option<usize> {
        next_free(&self.slots[..self.plans.len()])
    }

    pub fn count_active(&self) -> usize {
        count_active(&self.slots)
    }

    pub fn occupied_slots(&self) -> Vec<usize> {
        occupied_ordinals(&self.slots)
    }

    pub fn instance_name(&self, slot: usize) -> String {
        self.plans[slot]
            .instance_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("slot{}", slot + 1))
    }

    /// What the layout engine should look for on screen for this slot.
    pub fn window_target(&self, slot: usize) -> WindowTarget {
        WindowTarget {
            pid: self.slots[slot].worker_pid,
            title_hint: self.instance_name(slot),
        }
    }

    /// Write the layout directive and start the instance. The spawned
    /// process is the wrapper; the real worker is resolved later.
    pub fn launch(&mut self, slot: usize, directive: LayoutDirective) -> Result<(), Box<dyn Error>> {
        let plan = self.plans[slot].clone();
        self.write_layout_directive(&plan.instance_dir, directive)?;

        let mut cmd = self.build_command(&plan);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        let child = cmd.spawn()?;

        logln!(
            "slot {} - launched {} (wrapper pid {})",
            slot + 1,
            plan.instance_dir.display(),
            child.id()
        );

        self.slots[slot] = Slot {
            occupied: true,
            wrapper_pid: Some(child.id()),
            worker_pid: None,
            worker_resolved: false,
            launched_at: Some(Instant::now()),
        };
        self.children[slot] = Some(child);
        Ok(())
    }

    fn write_layout_directive(
        &self,
        instance_dir: &Path,
        directive: LayoutDirective,
    ) -> std::io::Result<()> {
        let config_dir = instance_dir.join("config");
        std::fs::create_dir_all(&config_dir)?;

        let contents = match directive {
            LayoutDirective::Fullscreen => "mode=fullscreen\n".to_string(),
            LayoutDirective::Windowed(rect) => format!(
                "mode=windowed\nx={}\ny={}\nwidth={}\nheight={}\n",
                rect.x, rect.y, rect.width, rect.height
            ),
        };

        std::fs::write(config_dir.join(&self.layout_file), contents)
    }

    fn build_command(&self, plan: &SlotPlan) -> Command {
        let instance_dir = plan.instance_dir.to_string_lossy();
        let instance_name = plan
            .instance_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut cmd = Command::new(&self.launch_command);
        for arg in &self.launch_args {
            cmd.arg(
                arg.replace("{instance_dir}", &instance_dir)
                    .replace("{instance}", &instance_name)
                    .replace("{profile}", &plan.profile),
            );
        }
        cmd
    }

    /// Tiered liveness check.
    ///
    /// 1. A known worker pid decides outright: dead worker, dead instance.
    /// 2. Otherwise try to resolve the worker from the process table.
    /// 3. Otherwise a live wrapper means the instance is still starting up.
    /// 4. Otherwise report alive only inside the post-launch grace window;
    ///    this absorbs the race where the wrapper exits before the worker
    ///    shows up in the process table.
    pub fn is_running(&mut self, slot: usize) -> bool {
        if !self.slots[slot].occupied {
            return false;
        }

        if let Some(worker) = self.slots[slot].worker_pid {
            let alive = self.locator.is_alive(worker);
            if !alive {
                debugln!("slot {} - worker pid {} has exited", slot + 1, worker);
            }
            return alive;
        }

        let needle = self.plans[slot].instance_dir.to_string_lossy().into_owned();
        let mut exclude = vec![std::process::id()];
        if let Some(wrapper) = self.slots[slot].wrapper_pid {
            exclude.push(wrapper);
        }
        if let Some(pid) = self.locator.find_by_arg(&needle, &exclude) {
            let elapsed = self.slots[slot]
                .launched_at
                .map(|t| t.elapsed().as_secs())
                .unwrap_or(0);
            logln!(
                "slot {} - resolved worker pid {} ({}s after launch)",
                slot + 1,
                pid,
                elapsed
            );
            self.slots[slot].worker_pid = Some(pid);
            self.slots[slot].worker_resolved = true;
            return true;
        }

        if self.wrapper_alive(slot) {
            return true;
        }

        if let Some(launched_at) = self.slots[slot].launched_at {
            let elapsed = launched_at.elapsed();
            if elapsed < self.grace {
                debugln!(
                    "slot {} - no pid yet, {}s into {}s grace window",
                    slot + 1,
                    elapsed.as_secs(),
                    self.grace.as_secs()
                );
                return true;
            }
            logln!(
                "slot {} - grace window expired ({}s) with no identifiable process",
                slot + 1,
                elapsed.as_secs()
            );
        }
        false
    }

    fn wrapper_alive(&mut self, slot: usize) -> bool {
        match self.children[slot].as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    debugln!("slot {} - wrapper exited ({})", slot + 1, status);
                    false
                }
                Err(_) => false,
            },
            None => match self.slots[slot].wrapper_pid {
                Some(pid) => self.locator.is_alive(pid),
                None => false,
            },
        }
    }

    /// Stop the slot's processes and clear it. Best-effort and idempotent:
    /// already-gone processes are fine, and the slot is cleared regardless.
    pub fn stop(&mut self, slot: usize) {
        if slot >= self.plans.len() {
            return;
        }

        if let Some(worker) = self.slots[slot].worker_pid {
            debugln!("slot {} - terminating worker pid {}", slot + 1, worker);
            self.locator.terminate(worker);
            let deadline = Instant::now() + self.term_wait;
            while self.locator.is_alive(worker) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(100));
            }
            if self.locator.is_alive(worker) {
                logln!("slot {} - worker pid {} ignored SIGTERM, killing", slot + 1, worker);
                self.locator.kill(worker);
            }
        }

        if let Some(mut child) = self.children[slot].take() {
            let _ = child.kill();
            let _ = child.wait();
        }

        // Sweep anything stray still referencing the instance path.
        let needle = self.plans[slot].instance_dir.to_string_lossy().into_owned();
        for pid in self
            .locator
            .find_all_by_arg(&needle, &[std::process::id()])
        {
            debugln!("slot {} - sweeping stray pid {}", slot + 1, pid);
            self.locator.kill(pid);
        }

        self.slots[slot].clear();
    }

    pub fn stop_all(&mut self) {
        for slot in self.occupied_slots() {
            self.stop(slot);
        }
    }

    /// Kill leftover processes from a previous run before a new session
    /// starts. Called once at startup.
    pub fn kill_strays(&self) {
        let mut killed = 0;
        for plan in &self.plans {
            let needle = plan.instance_dir.to_string_lossy().into_owned();
            for pid in self
                .locator
                .find_all_by_arg(&needle, &[std::process::id()])
            {
                self.locator.kill(pid);
                killed += 1;
            }
        }
        if killed > 0 {
            logln!("cleaned up {} stray instance process(es) from a previous run", killed);
        }
    }

    #[cfg(test)]
    fn occupy_for_test(&mut self, slot: usize) {
        self.slots[slot] = Slot {
            occupied: true,
            wrapper_pid: None,
            worker_pid: None,
            worker_resolved: false,
            launched_at: Some(Instant::now()),
        };
    }

    #[cfg(test)]
    fn backdate_launch(&mut self, slot: usize, by: Duration) {
        if let Some(t) = self.slots[slot].launched_at {
            self.slots[slot].launched_at = Some(t - by);
        }
    }

    #[cfg(test)]
    fn set_worker(&mut self, slot: usize, pid: u32) {
        self.slots[slot].worker_pid = Some(pid);
        self.slots[slot].worker_resolved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeLocator;

    fn test_manager() -> InstanceLifecycleManager<FakeLocator> {
        let plans = (1..=4)
            .map(|n| SlotPlan {
                instance_dir: PathBuf::from(format!("/tmp/splitcraft-test/Minecraft{}", n)),
                profile: format!("Player{}", n),
            })
            .collect();
        InstanceLifecycleManager::from_parts(
            FakeLocator::default(),
            plans,
            "true".to_string(),
            vec![],
            "window-layout.txt".to_string(),
            Duration::from_secs(60),
            Duration::ZERO,
        )
    }

    #[test]
    fn unoccupied_slot_is_not_running() {
        let mut mgr = test_manager();
        assert!(!mgr.is_running(0));
    }

    #[test]
    fn grace_window_keeps_unresolved_slot_alive() {
        let mut mgr = test_manager();
        mgr.occupy_for_test(0);

        // No wrapper, no worker, nothing in the process table.
        assert!(mgr.is_running(0));

        mgr.backdate_launch(0, Duration::from_secs(30));
        assert!(mgr.is_running(0));
    }

    #[test]
    fn grace_window_expiry_reports_not_running() {
        let mut mgr = test_manager();
        mgr.occupy_for_test(0);
        mgr.backdate_launch(0, Duration::from_secs(60));
        assert!(!mgr.is_running(0));
    }

    #[test]
    fn worker_resolution_is_cached() {
        let mut mgr = test_manager();
        mgr.occupy_for_test(0);
        mgr.locator
            .register_arg("/tmp/splitcraft-test/Minecraft1", 5000);

        assert!(mgr.is_running(0));
        assert_eq!(mgr.slots[0].worker_pid, Some(5000));
        assert!(mgr.slots[0].worker_resolved);

        // Once resolved, only the worker pid decides.
        mgr.locator.mark_dead(5000);
        assert!(!mgr.is_running(0));
    }

    #[test]
    fn dead_worker_ends_instance_despite_grace() {
        let mut mgr = test_manager();
        mgr.occupy_for_test(0);
        mgr.set_worker(0, 6000);
        // Worker never marked alive: fresh launch time must not save it.
        assert!(!mgr.is_running(0));
    }

    #[test]
    fn stop_always_clears_the_slot() {
        let mut mgr = test_manager();
        mgr.occupy_for_test(1);
        mgr.set_worker(1, 7000);
        mgr.locator.mark_alive(7000);

        assert_eq!(mgr.count_active(), 1);
        mgr.stop(1);
        assert_eq!(mgr.count_active(), 0);
        assert!(!mgr.slots[1].occupied);
        assert!(mgr.locator.terminated.borrow().contains(&7000));
        assert!(mgr.locator.killed.borrow().contains(&7000));

        // Stopping again is harmless.
        mgr.stop(1);
        assert_eq!(mgr.count_active(), 0);
    }

    #[test]
    fn slots_fill_in_ordinal_order() {
        let mut mgr = test_manager();
        assert_eq!(mgr.next_free_slot(), Some(0));
        mgr.occupy_for_test(0);
        assert_eq!(mgr.next_free_slot(), Some(1));
        mgr.occupy_for_test(1);
        assert_eq!(mgr.occupied_slots(), vec![0, 1]);
        assert_eq!(mgr.count_active(), 2);
    }

    #[test]
    fn window_target_prefers_resolved_pid() {
        let mut mgr = test_manager();
        mgr.occupy_for_test(2);

        let target = mgr.window_target(2);
        assert_eq!(target.pid, None);
        assert_eq!(target.title_hint, "Minecraft3");

        mgr.set_worker(2, 8000);
        assert_eq!(mgr.window_target(2).pid, Some(8000));
    }
}
