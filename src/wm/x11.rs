//! Legacy X11 backend: positions windows with the external xdotool and
//! wmctrl command-line tools.

use crate::wm::layout::Rect;
use crate::wm::{WindowTarget, WmResult};
use crate::{debugln, logln};

use std::process::Command;

pub struct X11Tools {
    xdotool: String,
    wmctrl: String,
}

impl X11Tools {
    pub fn new() -> Self {
        Self {
            xdotool: "xdotool".to_string(),
            wmctrl: "wmctrl".to_string(),
        }
    }

    #[cfg(test)]
    fn with_tools(xdotool: &str, wmctrl: &str) -> Self {
        Self {
            xdotool: xdotool.to_string(),
            wmctrl: wmctrl.to_string(),
        }
    }

    pub fn is_available() -> bool {
        if std::env::var("DISPLAY").is_err() {
            return false;
        }
        tool_exists("xdotool") && tool_exists("wmctrl")
    }

    /// Position every target whose window can be found. Unmatched targets
    /// are skipped; a partial layout beats none at all. Errs only when the
    /// tools themselves cannot be run.
    pub fn apply(&mut self, targets: &[WindowTarget], rects: &[Rect]) -> WmResult<usize> {
        let mut placed = 0;

        for (target, rect) in targets.iter().zip(rects) {
            let Some(window_id) = self.find_window(target)? else {
                logln!(
                    "wm::x11 - no window matched '{}' (pid {:?}), leaving it unpositioned",
                    target.title_hint,
                    target.pid
                );
                continue;
            };

            self.prepare_window(&window_id)?;
            self.set_geometry(&window_id, rect)?;
            placed += 1;
        }

        Ok(placed)
    }

    /// Prefer matching by pid; the window title is only a fallback while
    /// process identity is still unresolved. A title match can grab the
    /// wrong instance's window, so a pid miss is always logged first.
    fn find_window(&self, target: &WindowTarget) -> WmResult<Option<String>> {
        if let Some(pid) = target.pid {
            if let Some(id) = self.xdotool_search(&["search", "--pid", &pid.to_string()])? {
                return Ok(Some(id));
            }
            logln!(
                "wm::x11 - pid {} matched no window, falling back to title '{}'",
                pid,
                target.title_hint
            );
        }
        self.xdotool_search(&["search", "--name", &target.title_hint])
    }

    fn xdotool_search(&self, args: &[&str]) -> WmResult<Option<String>> {
        let output = Command::new(&self.xdotool).args(args).output()?;
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string()))
    }

    /// Undo decorations, tiling and fullscreen state so the geometry set
    /// afterwards sticks.
    fn prepare_window(&self, window_id: &str) -> WmResult<()> {
        self.wmctrl(window_id, "remove,fullscreen")?;
        self.wmctrl(window_id, "remove,maximized_vert,maximized_horz")?;

        // Motif hints flag 2 with decorations 0 strips the frame.
        let status = Command::new("xprop")
            .args([
                "-id",
                window_id,
                "-f",
                "_MOTIF_WM_HINTS",
                "32c",
                "-set",
                "_MOTIF_WM_HINTS",
                "2, 0, 0, 0, 0",
            ])
            .status()?;
        if !status.success() {
            debugln!("wm::x11 - xprop could not strip decorations on {}", window_id);
        }
        Ok(())
    }

    fn wmctrl(&self, window_id: &str, state_change: &str) -> WmResult<()> {
        let status = Command::new(&self.wmctrl)
            .args(["-i", "-r", window_id, "-b", state_change])
            .status()?;
        if !status.success() {
            debugln!("wm::x11 - wmctrl -b {} failed on {}", state_change, window_id);
        }
        Ok(())
    }

    fn set_geometry(&self, window_id: &str, rect: &Rect) -> WmResult<()> {
        let status = Command::new(&self.xdotool)
            .args([
                "windowmove",
                window_id,
                &rect.x.to_string(),
                &rect.y.to_string(),
            ])
            .status()?;
        if !status.success() {
            return Err(format!("xdotool windowmove failed for {}", window_id).into());
        }

        let status = Command::new(&self.xdotool)
            .args([
                "windowsize",
                window_id,
                &rect.width.to_string(),
                &rect.height.to_string(),
            ])
            .status()?;
        if !status.success() {
            return Err(format!("xdotool windowsize failed for {}", window_id).into());
        }

        debugln!(
            "wm::x11 - {} -> {}x{}+{}+{}",
            window_id,
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );
        Ok(())
    }
}

impl Default for X11Tools {
    fn default() -> Self {
        Self::new()
    }
}

fn tool_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Stub xdotool: pid searches find nothing, name searches return a
    /// fixed window id.
    fn write_stub() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("splitcraft-x11-stub");
        std::fs::create_dir_all(&dir).unwrap();
        let stub = dir.join("xdotool");
        std::fs::write(
            &stub,
            "#!/bin/sh\nif [ \"$2\" = \"--pid\" ]; then exit 1; fi\necho 0x5500042\n",
        )
        .unwrap();
        let mut perms = std::fs::metadata(&stub).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&stub, perms).unwrap();
        stub
    }

    #[test]
    fn pid_miss_falls_back_to_title_search() {
        let stub = write_stub();
        let tools = X11Tools::with_tools(stub.to_str().unwrap(), "wmctrl");

        let target = WindowTarget {
            pid: Some(4242),
            title_hint: "Minecraft1".to_string(),
        };
        // The pid search misses (stub exits nonzero), so the title search
        // supplies the window id.
        assert_eq!(
            tools.find_window(&target).unwrap(),
            Some("0x5500042".to_string())
        );

        let unresolved = WindowTarget {
            pid: None,
            title_hint: "Minecraft2".to_string(),
        };
        assert_eq!(
            tools.find_window(&unresolved).unwrap(),
            Some("0x5500042".to_string())
        );
    }
}
