use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FUNCAGENT_DIR: &str = ".funcagent";
pub const CONFIG_FILE: &str = ".funcagent/config.yaml";
pub const BENCHMARK_HISTORY_FILE: &str = ".funcagent/benchmarks/history.json";

pub const LOCAL_SETTINGS_FILE: &str = "local.settings.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn local_settings_path(project: &Path) -> PathBuf {
    project.join(LOCAL_SETTINGS_FILE)
}

/// Resolve a configured path against the project root unless it is absolute.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}
