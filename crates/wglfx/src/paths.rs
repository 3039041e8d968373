use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "WGLFX_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "wgl-toolkit";
const APPLICATION: &str = "wglfx";

pub const SCENE_FILE: &str = "scene.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn scene_file(&self) -> PathBuf {
        self.config_dir.join(SCENE_FILE)
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_file_lives_in_the_config_dir() {
        let paths = AppPaths {
            config_dir: PathBuf::from("/tmp/wglfx"),
        };
        assert_eq!(paths.scene_file(), PathBuf::from("/tmp/wglfx/scene.toml"));
    }
}
