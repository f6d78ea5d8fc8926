//! Production session driver: composes the lifecycle manager and the
//! layout engine behind the narrow interface the orchestrator loop drives.

use crate::config::SplitcraftConfig;
use crate::instances::{InstanceLifecycleManager, LayoutDirective};
use crate::logln;
use crate::notify;
use crate::orchestrator::SessionDriver;
use crate::process::ProcessLocator;
use crate::screen;
use crate::wm::layout::compute_rectangles;
use crate::wm::{ApplyOutcome, LayoutEngine, WindowTarget};

use std::error::Error;
use std::time::Duration;

pub struct RealDriver<L: ProcessLocator> {
    manager: InstanceLifecycleManager<L>,
    engine: LayoutEngine,
    inter_launch_delay: Duration,
}

impl<L: ProcessLocator> RealDriver<L> {
    pub fn new(
        manager: InstanceLifecycleManager<L>,
        engine: LayoutEngine,
        cfg: &SplitcraftConfig,
    ) -> Self {
        Self {
            manager,
            engine,
            inter_launch_delay: Duration::from_secs(cfg.inter_launch_delay_secs),
        }
    }

    /// Restart-based relayout: stop every active instance, then relaunch
    /// them sequentially with their rectangle baked into startup config.
    fn restart_relayout(&mut self) {
        let ordinals = self.manager.occupied_slots();
        if ordinals.is_empty() {
            return;
        }

        logln!(
            "layout - restarting {} instance(s) to apply the new layout",
            ordinals.len()
        );

        let size = screen::query();
        let rects = compute_rectangles(ordinals.len(), size.width, size.height);

        for &slot in &ordinals {
            self.manager.stop(slot);
        }
        for (i, &slot) in ordinals.iter().enumerate() {
            if let Err(e) = self
                .manager
                .launch(slot, LayoutDirective::Windowed(rects[i]))
            {
                logln!("slot {} - relaunch failed: {}", slot + 1, e);
                continue;
            }
            if i + 1 < ordinals.len() {
                std::thread::sleep(self.inter_launch_delay);
            }
        }
    }
}

impl<L: ProcessLocator> SessionDriver for RealDriver<L> {
    fn launch(&mut self, slot: usize, _total: usize) -> Result<(), Box<dyn Error>> {
        self.manager.launch(slot, LayoutDirective::Fullscreen)?;
        notify::send(
            &format!("Player {} joined", slot + 1),
            &self.manager.instance_name(slot),
        );
        Ok(())
    }

    fn stop(&mut self, slot: usize) {
        notify::send(
            &format!("Player {} left", slot + 1),
            &self.manager.instance_name(slot),
        );
        self.manager.stop(slot);
    }

    fn stop_all(&mut self) {
        self.manager.stop_all();
    }

    fn is_running(&mut self, slot: usize) -> bool {
        self.manager.is_running(slot)
    }

    fn apply_layout(&mut self, total: usize) {
        let size = screen::query();
        let rects = compute_rectangles(total, size.width, size.height);
        let targets: Vec<WindowTarget> = self
            .manager
            .occupied_slots()
            .into_iter()
            .map(|slot| self.manager.window_target(slot))
            .collect();

        match self.engine.apply(&targets, &rects) {
            ApplyOutcome::Positioned(placed) => {
                if placed < targets.len() {
                    logln!(
                        "layout - positioned {}/{} windows, leaving the rest as they are",
                        placed,
                        targets.len()
                    );
                } else {
                    logln!("layout - applied {}-player layout", total);
                }
            }
            ApplyOutcome::RestartRequired => self.restart_relayout(),
        }
    }

    fn occupied(&self) -> Vec<usize> {
        self.manager.occupied_slots()
    }

    fn next_free(&self) -> Option<usize> {
        self.manager.next_free_slot()
    }

    fn count_active(&self) -> usize {
        self.manager.count_active()
    }

    fn teardown(&mut self) {
        self.engine.teardown();
    }
}
