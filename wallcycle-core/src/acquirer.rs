//! Downloads a candidate wallpaper from the first source that delivers one.

use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, WallpaperError};
use crate::fetch::HttpFetcher;
use crate::record::{generate_id, WallpaperRecord, FILENAME_PREFIX};

/// Payloads smaller than this are treated as error pages or placeholders.
pub const MIN_WALLPAPER_BYTES: u64 = 50_000;

pub struct Acquirer {
    fetcher: Arc<dyn HttpFetcher>,
    wallpaper_dir: PathBuf,
    min_bytes: u64,
}

impl Acquirer {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, wallpaper_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            wallpaper_dir: wallpaper_dir.into(),
            min_bytes: MIN_WALLPAPER_BYTES,
        }
    }

    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    /// Tries `sources` in order and returns the first successful download.
    pub fn acquire(&self, sources: &[String]) -> Result<WallpaperRecord> {
        for url in sources {
            match self.download(url) {
                Ok(record) => {
                    info!("Downloaded {} ({} bytes) from {}", record.filename, record.size_bytes, url);
                    return Ok(record);
                }
                Err(e) => warn!("{}", e),
            }
        }

        Err(WallpaperError::AllSourcesExhausted {
            attempted: sources.len(),
        })
    }

    fn download(&self, url: &str) -> Result<WallpaperRecord> {
        let unavailable = |reason: String| WallpaperError::SourceUnavailable {
            url: url.to_string(),
            reason,
        };

        let mut body = self.fetcher.fetch(url).map_err(unavailable)?;

        let record = WallpaperRecord::new(generate_id(), &self.wallpaper_dir, Utc::now(), url, 0);
        let size = match write_body(&mut body, &record.path) {
            Ok(size) => size,
            Err(e) => {
                discard(&record.path);
                return Err(unavailable(format!("failed to write {}: {}", record.filename, e)));
            }
        };

        if size < self.min_bytes {
            discard(&record.path);
            return Err(unavailable(format!("file too small: {} bytes", size)));
        }

        Ok(WallpaperRecord {
            size_bytes: size,
            ..record
        })
    }

    /// Deletes leftovers of abandoned downloads: our own undersized files
    /// that no record points at. Returns the number of files removed.
    pub fn sweep_orphans(&self, known: &[WallpaperRecord]) -> usize {
        let known: HashSet<&Path> = known.iter().map(|r| r.path.as_path()).collect();
        let entries = match fs::read_dir(&self.wallpaper_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot scan {}: {}", self.wallpaper_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            let ours = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(FILENAME_PREFIX))
                .unwrap_or(false);
            if !ours || known.contains(path.as_path()) {
                continue;
            }

            let undersized = entry
                .metadata()
                .map(|m| m.is_file() && m.len() < self.min_bytes)
                .unwrap_or(false);
            if undersized && fs::remove_file(&path).is_ok() {
                debug!("Removed orphaned partial download {}", path.display());
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Swept {} orphaned partial downloads", removed);
        }
        removed
    }
}

fn write_body(body: &mut dyn io::Read, path: &Path) -> io::Result<u64> {
    let mut out = BufWriter::new(File::create(path)?);
    let size = io::copy(body, &mut out)?;
    out.flush()?;
    Ok(size)
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove partial download {}: {}", path.display(), e);
        }
    }
}
