use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use sceneconfig::SceneConfig;

pub const ENV_CONFIG: &str = "PBRGRID_CONFIG";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "pbrgrid";
const APPLICATION: &str = "pbrgrid";
const CONFIG_FILE: &str = "scene.toml";

/// Where the effective scene configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// `--config` or the environment variable.
    Explicit(PathBuf),
    /// The per-user config directory.
    UserDefault(PathBuf),
    Builtin,
}

/// Default per-user config file, when the platform has a config directory.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION).map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Loads the scene from the explicit path, else the user config file when it
/// exists, else the built-in scene.
///
/// An explicit path must exist; a missing user default is not an error.
pub fn load_scene(explicit: Option<&Path>, user_default: Option<PathBuf>) -> Result<(SceneConfig, ConfigOrigin)> {
    if let Some(path) = explicit {
        let config = SceneConfig::load(path)
            .with_context(|| format!("failed to load scene configuration {}", path.display()))?;
        return Ok((config, ConfigOrigin::Explicit(path.to_path_buf())));
    }

    if let Some(path) = user_default.filter(|path| path.is_file()) {
        let config = SceneConfig::load(&path)
            .with_context(|| format!("failed to load scene configuration {}", path.display()))?;
        return Ok((config, ConfigOrigin::UserDefault(path)));
    }

    Ok((SceneConfig::builtin(), ConfigOrigin::Builtin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let user = dir.path().join("user.toml");
        fs::write(&explicit, "[grid]\nrows = 2\n").unwrap();
        fs::write(&user, "[grid]\nrows = 3\n").unwrap();

        let (config, origin) = load_scene(Some(&explicit), Some(user)).unwrap();
        assert_eq!(config.grid.rows, 2);
        assert_eq!(origin, ConfigOrigin::Explicit(explicit));
    }

    #[test]
    fn falls_back_to_user_file_then_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");

        let (config, origin) = load_scene(None, Some(user.clone())).unwrap();
        assert_eq!(config, SceneConfig::builtin());
        assert_eq!(origin, ConfigOrigin::Builtin);

        fs::write(&user, "[grid]\ncolumns = 7\n").unwrap();
        let (config, origin) = load_scene(None, Some(user.clone())).unwrap();
        assert_eq!(config.grid.columns, 7);
        assert_eq!(origin, ConfigOrigin::UserDefault(user));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_scene(Some(&dir.path().join("absent.toml")), None).is_err());
    }
}
