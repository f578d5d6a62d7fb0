//! The ordered, size-bounded wallpaper collection and its on-disk mirror.

use log::{error, info, warn};
use std::fs;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::WallpaperError;
use crate::record::{WallpaperRecord, WallpaperView};
use crate::store::DocumentStore;

/// Owns the in-memory collection. Every mutation holds the lock across the
/// file deletions and the document write, so readers never see the list and
/// the managed directory disagree.
pub struct CollectionManager {
    records: Mutex<Vec<WallpaperRecord>>,
    store: DocumentStore,
}

impl CollectionManager {
    /// Reads the persisted collection, silently dropping records whose file
    /// has disappeared.
    pub fn load_from_disk(store: DocumentStore) -> Self {
        let persisted = match store.load_collection() {
            Ok(records) => records,
            Err(e @ WallpaperError::Persistence(_)) => {
                match store.set_aside_collection() {
                    Ok(aside) => error!("{}; moved to {}, starting empty", e, aside.display()),
                    Err(rename) => error!("{}; could not move it aside: {}", e, rename),
                }
                Vec::new()
            }
            Err(e) => {
                error!("Failed to load wallpaper collection, starting empty: {}", e);
                Vec::new()
            }
        };

        let total = persisted.len();
        let mut records: Vec<WallpaperRecord> = persisted.into_iter().filter(|r| r.path.is_file()).collect();
        sort_newest_first(&mut records);

        let pruned = total - records.len();
        let manager = Self {
            records: Mutex::new(records),
            store,
        };

        if pruned > 0 {
            info!("Pruned {} wallpapers whose files are missing", pruned);
            manager.persist(&manager.list());
        }

        manager
    }

    /// Inserts `record`, then evicts the oldest entries beyond `max_wallpapers`.
    /// Returns the evicted records.
    pub fn add(&self, record: WallpaperRecord, max_wallpapers: usize) -> Vec<WallpaperRecord> {
        let mut records = self.lock();
        records.push(record);
        sort_newest_first(&mut records);

        let evicted = if records.len() > max_wallpapers {
            records.split_off(max_wallpapers)
        } else {
            Vec::new()
        };

        for old in &evicted {
            delete_file(old);
            info!("Evicted wallpaper {} ({})", old.id, old.filename);
        }

        self.persist(&records);
        evicted
    }

    /// Removes the record with `id`. Unknown ids are a no-op returning `None`.
    pub fn remove(&self, id: &str) -> Option<WallpaperRecord> {
        let mut records = self.lock();
        let index = records.iter().position(|r| r.id == id)?;
        let removed = records.remove(index);

        delete_file(&removed);
        self.persist(&records);
        Some(removed)
    }

    /// Newest-first snapshot.
    pub fn list(&self) -> Vec<WallpaperRecord> {
        self.lock().clone()
    }

    pub fn views(&self) -> Vec<WallpaperView> {
        self.lock().iter().map(WallpaperRecord::view).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WallpaperRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, records: &[WallpaperRecord]) {
        if let Err(e) = self.store.save_collection(records) {
            warn!("Collection changes will not survive a restart: {}", e);
        }
    }
}

fn sort_newest_first(records: &mut [WallpaperRecord]) {
    records.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));
}

/// Best effort: the record goes away even if its file cannot be deleted.
fn delete_file(record: &WallpaperRecord) {
    match fs::remove_file(&record.path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete {}: {}", record.path.display(), e),
    }
}
