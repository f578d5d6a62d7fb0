//! File-backed document store for the settings and collection documents.
//!
//! Each document is a whole JSON file. Writes go to a temporary sibling
//! and are renamed over the target, so a reader only ever sees the previous
//! or the new document.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::{Config, Settings};
use crate::error::{Result, WallpaperError};
use crate::record::{CollectionDocument, WallpaperRecord};

#[derive(Debug, Clone)]
pub struct DocumentStore {
    settings_file: PathBuf,
    collection_file: PathBuf,
}

impl DocumentStore {
    pub fn new(config: &Config) -> Self {
        Self {
            settings_file: config.settings_file.clone(),
            collection_file: config.collection_file.clone(),
        }
    }

    /// `Ok(None)` when no settings have been saved yet.
    pub fn load_settings(&self) -> Result<Option<Settings>> {
        read_document(&self.settings_file)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        write_document(&self.settings_file, settings)
    }

    /// Records exactly as persisted; pruning is the collection manager's job.
    pub fn load_collection(&self) -> Result<Vec<WallpaperRecord>> {
        let document: Option<CollectionDocument> = read_document(&self.collection_file)?;
        Ok(document.map(|d| d.wallpapers).unwrap_or_default())
    }

    pub fn save_collection(&self, wallpapers: &[WallpaperRecord]) -> Result<()> {
        let document = CollectionDocument {
            wallpapers: wallpapers.to_vec(),
        };
        write_document(&self.collection_file, &document)
    }

    /// Renames an unreadable collection document to `<name>.corrupt` so the
    /// next save starts a fresh file instead of replacing it.
    pub fn set_aside_collection(&self) -> Result<PathBuf> {
        let mut aside = self.collection_file.clone().into_os_string();
        aside.push(".corrupt");
        let aside = PathBuf::from(aside);

        fs::rename(&self.collection_file, &aside)?;
        Ok(aside)
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| WallpaperError::Persistence(format!("{}: corrupt document: {}", path.display(), e)))
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let persistence = |e: &dyn std::fmt::Display| WallpaperError::Persistence(format!("{}: {}", path.display(), e));

    let json = serde_json::to_string_pretty(value).map_err(|e| persistence(&e))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| persistence(&e))?;
    tmp.write_all(json.as_bytes()).map_err(|e| persistence(&e))?;
    tmp.as_file().sync_all().map_err(|e| persistence(&e))?;
    tmp.persist(path).map_err(|e| persistence(&e.error))?;

    Ok(())
}
