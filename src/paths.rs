use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;

pub static PATH_HOME: LazyLock<PathBuf> =
    LazyLock::new(|| PathBuf::from(env::var("HOME").unwrap()));

pub static PATH_LOCAL_SHARE: LazyLock<PathBuf> = LazyLock::new(|| PATH_HOME.join(".local/share"));

pub static PATH_DATA: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Ok(xdg_data_home) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home).join("splitcraft");
    }
    PATH_LOCAL_SHARE.join("splitcraft")
});

pub static PATH_LOGS: LazyLock<PathBuf> = LazyLock::new(|| PATH_DATA.join("logs"));

pub static PATH_TMP: LazyLock<PathBuf> = LazyLock::new(|| PATH_DATA.join("tmp"));
