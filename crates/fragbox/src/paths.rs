use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG: &str = "FRAGBOX_CONFIG";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "fragbox";
const APPLICATION: &str = "fragbox";
const CONFIG_FILE: &str = "config.toml";

/// Where the configuration file lives when `--config` is not given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Named by `FRAGBOX_CONFIG`; must exist.
    Environment(PathBuf),
    /// The per-user default; optional.
    UserDefault(PathBuf),
}

impl ConfigLocation {
    pub fn discover() -> Result<Self> {
        if let Some(value) = env::var_os(ENV_CONFIG).filter(|value| !value.is_empty()) {
            return Ok(Self::Environment(PathBuf::from(value)));
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self::UserDefault(project_dirs.config_dir().join(CONFIG_FILE)))
    }

    /// The file to load, or `None` when the optional default is absent.
    pub fn existing(&self) -> Option<PathBuf> {
        match self {
            Self::Environment(path) => Some(path.clone()),
            Self::UserDefault(path) => path.is_file().then(|| path.clone()),
        }
    }
}
