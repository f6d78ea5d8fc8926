//! KWin backend: positions windows through the compositor's D-Bus
//! scripting interface by generating and loading a one-shot script.

use crate::paths::PATH_TMP;
use crate::wm::layout::Rect;
use crate::wm::{WindowTarget, WmResult};
use crate::{debugln, logln};

use std::path::PathBuf;

const PLUGIN_NAME: &str = "splitcraft";

pub struct KwinScripting {
    script_loaded: bool,
}

impl KwinScripting {
    pub fn new() -> Self {
        Self {
            script_loaded: false,
        }
    }

    pub fn is_available() -> bool {
        if let Ok(conn) = zbus::blocking::Connection::session() {
            let proxy = zbus::blocking::Proxy::new(
                &conn,
                "org.kde.KWin",
                "/Scripting",
                "org.kde.kwin.Scripting",
            );
            return proxy.is_ok();
        }
        false
    }

    pub fn apply(&mut self, targets: &[WindowTarget], rects: &[Rect]) -> WmResult<usize> {
        let script = self.write_script(targets, rects)?;

        // A previous positioning script may still be registered.
        self.unload_script()?;
        self.load_script(script)?;

        // The script walks the whole window list itself; count every
        // target as handled once the compositor accepted it.
        Ok(targets.len())
    }

    pub fn teardown(&mut self) -> WmResult<()> {
        self.unload_script()
    }

    fn write_script(&self, targets: &[WindowTarget], rects: &[Rect]) -> WmResult<PathBuf> {
        let entries: Vec<serde_json::Value> = targets
            .iter()
            .zip(rects)
            .map(|(target, rect)| {
                serde_json::json!({
                    "pid": target.pid.map(|p| p as i64).unwrap_or(0),
                    "hint": target.title_hint,
                    "x": rect.x,
                    "y": rect.y,
                    "width": rect.width,
                    "height": rect.height,
                })
            })
            .collect();

        let script = format!(
            r#"var targets = {targets};

function windowList() {{
    return typeof workspace.windowList === "function"
        ? workspace.windowList()
        : workspace.clientList();
}}

function place() {{
    var clients = windowList();
    for (var i = 0; i < targets.length; i++) {{
        var t = targets[i];
        for (var j = 0; j < clients.length; j++) {{
            var c = clients[j];
            var caption = c.caption || "";
            var match = (t.pid > 0 && c.pid === t.pid)
                || (t.pid <= 0 && caption.indexOf(t.hint) !== -1);
            if (!match) {{
                continue;
            }}
            c.fullScreen = false;
            c.noBorder = true;
            if (c.tile !== undefined) {{
                c.tile = null;
            }}
            c.frameGeometry = {{ x: t.x, y: t.y, width: t.width, height: t.height }};
            break;
        }}
    }}
}}

place();
"#,
            targets = serde_json::Value::Array(entries)
        );

        std::fs::create_dir_all(&*PATH_TMP)?;
        let path = PATH_TMP.join("splitscreen.js");
        std::fs::write(&path, script)?;
        Ok(path)
    }

    fn load_script(&mut self, file: PathBuf) -> WmResult<()> {
        debugln!("wm::kwin - loading script {}", file.display());

        let conn = zbus::blocking::Connection::session()?;
        let proxy = zbus::blocking::Proxy::new(
            &conn,
            "org.kde.KWin",
            "/Scripting",
            "org.kde.kwin.Scripting",
        )?;

        let _: i32 = proxy.call("loadScript", &(file.to_string_lossy(), PLUGIN_NAME))?;
        let _: () = proxy.call("start", &())?;

        self.script_loaded = true;
        logln!("wm::kwin - positioning script started");
        Ok(())
    }

    fn unload_script(&mut self) -> WmResult<()> {
        if !self.script_loaded {
            return Ok(());
        }

        let conn = zbus::blocking::Connection::session()?;
        let proxy = zbus::blocking::Proxy::new(
            &conn,
            "org.kde.KWin",
            "/Scripting",
            "org.kde.kwin.Scripting",
        )?;

        let _: bool = proxy.call("unloadScript", &(PLUGIN_NAME,))?;
        self.script_loaded = false;

        debugln!("wm::kwin - positioning script unloaded");
        Ok(())
    }
}

impl Default for KwinScripting {
    fn default() -> Self {
        Self::new()
    }
}
