use crate::logln;
use crate::paths::{PATH_DATA, PATH_LOCAL_SHARE};

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Launch for the controller count seen at startup and never rescale.
    Static,
    /// Grow and shrink the session as controllers come and go.
    #[default]
    Dynamic,
}

/// Main orchestrator configuration, stored as `settings.json` in the data dir.
///
/// The timing knobs are empirical tuning values, not invariants; they depend
/// on hardware and display-backend characteristics, so they are kept
/// user-editable rather than baked in.
#[derive(Serialize, Deserialize, Clone)]
pub struct SplitcraftConfig {
    #[serde(default)]
    pub mode: SessionMode,
    /// Launcher binary invoked per slot. Resolved against PATH at startup.
    #[serde(default = "default_launch_command")]
    pub launch_command: String,
    /// Arguments for the launcher. `{instance}` expands to the instance
    /// directory name, `{instance_dir}` to its full path and `{profile}`
    /// to the slot's profile identity.
    #[serde(default = "default_launch_args")]
    pub launch_args: Vec<String>,
    /// Instance directories in slot order, at most four.
    #[serde(default = "default_instances")]
    pub instances: Vec<String>,
    /// Profile identity per slot.
    #[serde(default = "default_profiles")]
    pub profiles: Vec<String>,
    /// Layout directive file written under `<instance_dir>/config/` before
    /// every launch.
    #[serde(default = "default_layout_file")]
    pub layout_file: String,
    /// How long an instance with no identifiable process is still
    /// optimistically treated as starting up.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    /// Pause between sequential launches to avoid resource contention.
    #[serde(default = "default_inter_launch_delay_secs")]
    pub inter_launch_delay_secs: u64,
    /// Pause after launches before windows are positioned.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    /// Controller re-scan interval when no udev watch is available.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_launch_command() -> String {
    "pollymc".to_string()
}

fn default_launch_args() -> Vec<String> {
    vec![
        "--launch".to_string(),
        "{instance}".to_string(),
        "--profile".to_string(),
        "{profile}".to_string(),
    ]
}

fn default_instances() -> Vec<String> {
    (1..=4)
        .map(|n| {
            PATH_LOCAL_SHARE
                .join(format!("PollyMC/instances/Minecraft{}", n))
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn default_profiles() -> Vec<String> {
    (1..=4).map(|n| format!("Player{}", n)).collect()
}

fn default_layout_file() -> String {
    "window-layout.txt".to_string()
}

fn default_grace_secs() -> u64 {
    60
}

fn default_inter_launch_delay_secs() -> u64 {
    10
}

fn default_settle_delay_secs() -> u64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl Default for SplitcraftConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            launch_command: default_launch_command(),
            launch_args: default_launch_args(),
            instances: default_instances(),
            profiles: default_profiles(),
            layout_file: default_layout_file(),
            grace_secs: default_grace_secs(),
            inter_launch_delay_secs: default_inter_launch_delay_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

pub fn load_cfg() -> SplitcraftConfig {
    let path = PATH_DATA.join("settings.json");

    if let Ok(file) = File::open(&path) {
        if let Ok(config) = serde_json::from_reader::<_, SplitcraftConfig>(BufReader::new(file)) {
            return config;
        }
        logln!("config - settings.json unreadable, using defaults");
        return SplitcraftConfig::default();
    }

    // First run: write the defaults out so they can be edited.
    let config = SplitcraftConfig::default();
    if let Err(e) = save_cfg(&config) {
        logln!("config - could not write default settings: {}", e);
    }
    config
}

pub fn save_cfg(config: &SplitcraftConfig) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(&*PATH_DATA)?;
    let file = File::create(PATH_DATA.join("settings.json"))?;
    serde_json::to_writer_pretty(file, config)?;
    Ok(())
}
