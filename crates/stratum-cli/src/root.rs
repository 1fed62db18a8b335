use std::path::{Path, PathBuf};

/// Resolve the directory whose `config/` tree is read.
///
/// Priority:
/// 1. `--config-dir` flag / `STRATUM_CONFIG_DIR` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `config/defaults.json` or `config/environment/`
/// 3. Fall back to `cwd`
pub fn resolve_config_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_config_root(&cwd).unwrap_or(cwd)
}

fn find_config_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| is_config_root(dir))
        .map(Path::to_path_buf)
}

fn is_config_root(dir: &Path) -> bool {
    let config = dir.join("config");
    config.join("defaults.json").is_file() || config.join("environment").is_dir()
}
