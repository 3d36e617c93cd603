//! Configuration vault – reads/writes `~/.gravitas/config.toml`.

use gravitas_reasoner::ReasonerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Physics backend choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// `rapier3d` rigid-body simulation.
    #[default]
    Rapier,
    /// Deterministic point-mass backend.
    Sim,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Rapier => write!(f, "rapier"),
            EngineKind::Sim => write!(f, "sim"),
        }
    }
}

/// Persisted configuration stored in `~/.gravitas/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineKind,

    /// Reasoner tunables, the `[reasoner]` table.
    #[serde(default)]
    pub reasoner: ReasonerConfig,
}

/// Return the path to `~/.gravitas/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gravitas").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
/// Environment overrides are applied to a loaded file only.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load `path` or fall back to defaults, then validate.
pub fn resolve(path: &Path) -> Result<Config, String> {
    let cfg = match load_from(path)? {
        Some(cfg) => cfg,
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    };
    cfg.reasoner.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

/// Apply `GRAVITAS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GRAVITAS_ASSETS` | `reasoner.resource_folder` (path-list syntax) |
/// | `GRAVITAS_FREQUENCY` | `reasoner.reasoning_frequency` |
/// | `GRAVITAS_WORLD` | `reasoner.input_world` |
/// | `GRAVITAS_INFER_ACTIONS` | `reasoner.infer_actions` |
/// | `GRAVITAS_ENGINE` | `engine` (`rapier` or `sim`) |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(v) = std::env::var_os("GRAVITAS_ASSETS") {
        let folders: Vec<PathBuf> = std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect();
        if !folders.is_empty() {
            cfg.reasoner.resource_folder = folders;
        }
    }
    if let Ok(v) = std::env::var("GRAVITAS_FREQUENCY")
        && let Ok(hz) = v.parse::<f32>()
    {
        cfg.reasoner.reasoning_frequency = hz;
    }
    if let Ok(v) = std::env::var("GRAVITAS_WORLD")
        && !v.is_empty()
    {
        cfg.reasoner.input_world = v;
    }
    if let Ok(v) = std::env::var("GRAVITAS_INFER_ACTIONS")
        && let Ok(flag) = v.parse::<bool>()
    {
        cfg.reasoner.infer_actions = flag;
    }
    if let Ok(v) = std::env::var("GRAVITAS_ENGINE") {
        match v.as_str() {
            "rapier" => cfg.engine = EngineKind::Rapier,
            "sim" => cfg.engine = EngineKind::Sim,
            _ => {}
        }
    }
}

/// Save the config to `path`, creating its directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every test that touches GRAVITAS_* variables runs under this lock.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_mode = std::fs::metadata(path.parent().unwrap()).expect("dir metadata").permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn roundtrip_default_config() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.reasoner.micro_steps(), 24);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "engine = \"sim\"\n[reasoner]\nvisualize = true\n").unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.engine, EngineKind::Sim);
        assert!(cfg.reasoner.visualize);
        assert_eq!(cfg.reasoner.input_world, "robot/env");
    }

    #[test]
    fn config_path_points_to_gravitas_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".gravitas"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn resolve_rejects_invalid_values() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[reasoner]\ntime_step = -1.0\n").unwrap();
        let err = resolve(&path).unwrap_err();
        assert!(err.contains("time_step"), "{err}");
    }

    #[test]
    fn env_overrides_apply() {
        let _env = ENV_LOCK.lock().unwrap();
        // SAFETY: guarded by ENV_LOCK; no other thread reads these variables.
        unsafe {
            std::env::set_var("GRAVITAS_FREQUENCY", "5");
            std::env::set_var("GRAVITAS_WORLD", "lab/table");
            std::env::set_var("GRAVITAS_INFER_ACTIONS", "false");
            std::env::set_var("GRAVITAS_ENGINE", "sim");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        unsafe {
            std::env::remove_var("GRAVITAS_FREQUENCY");
            std::env::remove_var("GRAVITAS_WORLD");
            std::env::remove_var("GRAVITAS_INFER_ACTIONS");
            std::env::remove_var("GRAVITAS_ENGINE");
        }
        assert_eq!(cfg.reasoner.reasoning_frequency, 5.0);
        assert_eq!(cfg.reasoner.output_world(), "lab/table_stable");
        assert!(!cfg.reasoner.infer_actions);
        assert_eq!(cfg.engine, EngineKind::Sim);
    }

    #[test]
    fn env_overrides_ignore_invalid_values() {
        let _env = ENV_LOCK.lock().unwrap();
        // SAFETY: guarded by ENV_LOCK.
        unsafe {
            std::env::set_var("GRAVITAS_FREQUENCY", "fast");
            std::env::set_var("GRAVITAS_ENGINE", "bullet");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        unsafe {
            std::env::remove_var("GRAVITAS_FREQUENCY");
            std::env::remove_var("GRAVITAS_ENGINE");
        }
        assert_eq!(cfg, Config::default());
    }

    #[cfg(unix)]
    #[test]
    fn assets_override_splits_path_list() {
        let _env = ENV_LOCK.lock().unwrap();
        // SAFETY: guarded by ENV_LOCK.
        unsafe { std::env::set_var("GRAVITAS_ASSETS", "/opt/shapes:/home/me/shapes") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        unsafe { std::env::remove_var("GRAVITAS_ASSETS") };
        assert_eq!(
            cfg.reasoner.resource_folder,
            vec![PathBuf::from("/opt/shapes"), PathBuf::from("/home/me/shapes")]
        );
    }
}
