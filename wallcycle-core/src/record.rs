use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata about one downloaded wallpaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallpaperRecord {
    pub id: String,
    pub filename: String,
    #[serde(rename = "filepath")]
    pub path: PathBuf,
    #[serde(rename = "download_date")]
    pub acquired_at: DateTime<Utc>,
    pub source_url: String,
    #[serde(rename = "file_size")]
    pub size_bytes: u64,
}

impl WallpaperRecord {
    /// Builds a record for a file acquired from `source_url` at `acquired_at`.
    pub fn new(id: String, dir: &Path, acquired_at: DateTime<Utc>, source_url: &str, size_bytes: u64) -> Self {
        let filename = wallpaper_filename(&id, acquired_at);
        Self {
            path: dir.join(&filename),
            filename,
            id,
            acquired_at,
            source_url: source_url.to_string(),
            size_bytes,
        }
    }

    /// `file://` reference usable by a webview or image widget.
    pub fn local_url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    pub fn view(&self) -> WallpaperView {
        WallpaperView {
            local_url: self.local_url(),
            record: self.clone(),
        }
    }
}

/// A record paired with its display reference, materialized at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WallpaperView {
    #[serde(flatten)]
    pub record: WallpaperRecord,
    pub local_url: String,
}

/// Persisted collection document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CollectionDocument {
    #[serde(default)]
    pub wallpapers: Vec<WallpaperRecord>,
}

pub const FILENAME_PREFIX: &str = "wallpaper_";

/// 128 random bits as lower-case hex.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn wallpaper_filename(id: &str, acquired_at: DateTime<Utc>) -> String {
    let fragment: String = id.chars().take(8).collect();
    format!("{}{}_{}.jpg", FILENAME_PREFIX, acquired_at.timestamp(), fragment)
}
