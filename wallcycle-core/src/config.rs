use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_ENV: &str = "WALLCYCLE_CONFIG_DIR";
pub const WALLPAPER_DIR_ENV: &str = "WALLCYCLE_WALLPAPER_DIR";

const SETTINGS_FILE: &str = "settings.json";
const COLLECTION_FILE: &str = "wallpapers.json";
const WALLPAPER_SUBDIR: &str = "WallCycle";

/// On-disk locations used by wallcycle.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub wallpaper_dir: PathBuf,
    pub settings_file: PathBuf,
    pub collection_file: PathBuf,
}

impl Config {
    /// Resolves the per-user locations, honouring the environment overrides.
    pub fn new() -> Result<Self> {
        let config_dir = match env_dir(CONFIG_DIR_ENV) {
            Some(dir) => dir,
            None => ProjectDirs::from("com", "wallcycle", "wallcycle")
                .context("Failed to get project directories")?
                .config_dir()
                .to_path_buf(),
        };

        let wallpaper_dir = match env_dir(WALLPAPER_DIR_ENV) {
            Some(dir) => dir,
            None => default_wallpaper_dir()?,
        };

        Self::with_dirs(config_dir, wallpaper_dir)
    }

    /// Builds a config rooted at explicit directories, creating them if needed.
    pub fn with_dirs(config_dir: impl Into<PathBuf>, wallpaper_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        let wallpaper_dir = wallpaper_dir.into();

        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir {}", config_dir.display()))?;
        fs::create_dir_all(&wallpaper_dir)
            .with_context(|| format!("Failed to create wallpaper dir {}", wallpaper_dir.display()))?;

        Ok(Config {
            settings_file: config_dir.join(SETTINGS_FILE),
            collection_file: config_dir.join(COLLECTION_FILE),
            config_dir,
            wallpaper_dir,
        })
    }

    pub fn wallpaper_dir(&self) -> &Path {
        &self.wallpaper_dir
    }
}

fn env_dir(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn default_wallpaper_dir() -> Result<PathBuf> {
    if let Some(pictures) = UserDirs::new().and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf)) {
        return Ok(pictures.join(WALLPAPER_SUBDIR));
    }

    let base = BaseDirs::new().context("Failed to get home directory")?;
    Ok(base.home_dir().join("Pictures").join(WALLPAPER_SUBDIR))
}

/// User-configurable settings, persisted as `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auto_change_enabled: bool,
    pub change_interval_hours: u32,
    pub download_sources: Vec<String>,
    pub max_wallpapers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_change_enabled: true,
            change_interval_hours: 1,
            max_wallpapers: 20,
            download_sources: default_sources(),
        }
    }
}

impl Settings {
    /// Checks per-field constraints. Cross-field consistency is not checked.
    pub fn validate(&self) -> Result<(), String> {
        if self.change_interval_hours < 1 {
            return Err("change_interval_hours must be at least 1".to_string());
        }
        if self.max_wallpapers < 1 {
            return Err("max_wallpapers must be at least 1".to_string());
        }
        Ok(())
    }

    /// Clamps out-of-range values from a hand-edited document.
    pub fn sanitized(mut self) -> Self {
        if self.validate().is_err() {
            log::warn!("Settings file has out-of-range values, clamping to 1");
            self.change_interval_hours = self.change_interval_hours.max(1);
            self.max_wallpapers = self.max_wallpapers.max(1);
        }
        self
    }

    pub fn change_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.change_interval_hours) * 60 * 60)
    }
}

fn default_sources() -> Vec<String> {
    [
        // 4K
        "https://source.unsplash.com/3840x2160/landscape",
        "https://source.unsplash.com/3840x2160/nature",
        "https://source.unsplash.com/3840x2160/mountain",
        "https://source.unsplash.com/3840x2160/forest",
        "https://source.unsplash.com/3840x2160/ocean",
        // 2K
        "https://source.unsplash.com/2560x1440/architecture",
        "https://source.unsplash.com/2560x1440/city",
        "https://source.unsplash.com/2560x1440/space",
        "https://picsum.photos/3840/2160",
        "https://picsum.photos/2560/1440",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
