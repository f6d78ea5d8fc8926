//! Layout backend abstraction.
//!
//! Three strategies for getting windows into place, probed most to least
//! capable: KWin compositor scripting over D-Bus, legacy X11 CLI tools,
//! and as a last resort a restart-based relayout in which instances are
//! stopped and relaunched with their geometry baked into startup config.

mod kwin;
pub mod layout;
mod x11;

pub use kwin::KwinScripting;
pub use x11::X11Tools;

use crate::logln;
use layout::Rect;

use std::error::Error;

pub type WmResult<T> = Result<T, Box<dyn Error>>;

/// How the backend locates one instance's window: by worker pid when
/// identity resolution has completed, by title substring otherwise.
#[derive(Clone, Debug)]
pub struct WindowTarget {
    pub pid: Option<u32>,
    pub title_hint: String,
}

/// Result of a layout attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Number of windows actually positioned (may be fewer than requested).
    Positioned(usize),
    /// No live-reposition mechanism worked; the caller must stop and
    /// relaunch instances with the layout baked in.
    RestartRequired,
}

pub enum BackendKind {
    Kwin(KwinScripting),
    X11(X11Tools),
    Restart,
    #[cfg(test)]
    Recording(RecordingBackend),
}

/// Captures the geometry commands an apply would issue, one batch per
/// call, so engine-level properties are observable without a compositor.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingBackend {
    applied: Vec<Vec<(Option<u32>, Rect)>>,
}

pub struct LayoutEngine {
    backend: BackendKind,
}

impl LayoutEngine {
    /// Probe for the most capable backend available in this session.
    pub fn detect() -> Self {
        let kde_session = std::env::var("KDE_SESSION_VERSION").is_ok()
            || std::env::var("KDE_FULL_SESSION").is_ok();
        if kde_session && KwinScripting::is_available() {
            logln!("wm - using KWin scripting backend");
            return Self {
                backend: BackendKind::Kwin(KwinScripting::new()),
            };
        }

        // KDE env vars are not always exported; fall back to process detection.
        if !kde_session && kwin_process_running() && KwinScripting::is_available() {
            logln!("wm - using KWin scripting backend (detected via process)");
            return Self {
                backend: BackendKind::Kwin(KwinScripting::new()),
            };
        }

        if X11Tools::is_available() {
            logln!("wm - using X11 tools backend (xdotool/wmctrl)");
            return Self {
                backend: BackendKind::X11(X11Tools::new()),
            };
        }

        logln!("wm - no live-reposition backend available, relayouts will restart instances");
        Self {
            backend: BackendKind::Restart,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            BackendKind::Kwin(_) => "kwin-scripting",
            BackendKind::X11(_) => "x11-tools",
            BackendKind::Restart => "restart-fallback",
            #[cfg(test)]
            BackendKind::Recording(_) => "recording",
        }
    }

    /// Try the selected backend; on outright failure fall back one tier
    /// for this attempt only. The selected backend stays in place for the
    /// next call.
    pub fn apply(&mut self, targets: &[WindowTarget], rects: &[Rect]) -> ApplyOutcome {
        match &mut self.backend {
            BackendKind::Kwin(kwin) => match kwin.apply(targets, rects) {
                Ok(placed) => ApplyOutcome::Positioned(placed),
                Err(e) => {
                    logln!("wm::kwin - apply failed ({}), trying X11 tools", e);
                    x11_attempt(targets, rects)
                }
            },
            BackendKind::X11(tools) => match tools.apply(targets, rects) {
                Ok(placed) => ApplyOutcome::Positioned(placed),
                Err(e) => {
                    logln!("wm::x11 - apply failed ({}), requesting restart relayout", e);
                    ApplyOutcome::RestartRequired
                }
            },
            BackendKind::Restart => ApplyOutcome::RestartRequired,
            #[cfg(test)]
            BackendKind::Recording(rec) => {
                rec.applied.push(
                    targets
                        .iter()
                        .zip(rects)
                        .map(|(target, rect)| (target.pid, *rect))
                        .collect(),
                );
                ApplyOutcome::Positioned(targets.len())
            }
        }
    }

    /// Undo any compositor-side state this engine set up.
    pub fn teardown(&mut self) {
        if let BackendKind::Kwin(kwin) = &mut self.backend
            && let Err(e) = kwin.teardown()
        {
            logln!("wm::kwin - teardown failed: {}", e);
        }
    }
}

fn x11_attempt(targets: &[WindowTarget], rects: &[Rect]) -> ApplyOutcome {
    if !X11Tools::is_available() {
        return ApplyOutcome::RestartRequired;
    }
    let mut tools = X11Tools::new();
    match tools.apply(targets, rects) {
        Ok(placed) => ApplyOutcome::Positioned(placed),
        Err(e) => {
            logln!("wm::x11 - fallback apply failed ({}), requesting restart relayout", e);
            ApplyOutcome::RestartRequired
        }
    }
}

#[cfg(test)]
impl LayoutEngine {
    fn recording() -> Self {
        Self {
            backend: BackendKind::Recording(RecordingBackend::default()),
        }
    }

    fn recorded(&self) -> &[Vec<(Option<u32>, Rect)>] {
        match &self.backend {
            BackendKind::Recording(rec) => &rec.applied,
            _ => &[],
        }
    }
}

fn kwin_process_running() -> bool {
    for name in ["kwin_wayland", "kwin_x11"] {
        if let Ok(output) = std::process::Command::new("pgrep").args(["-x", name]).output()
            && output.status.success()
        {
            return true;
        }
    }
    false
}
