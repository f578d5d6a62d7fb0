use std::sync::mpsc::Sender;

use crate::record::{WallpaperRecord, WallpaperView};

/// Receives change notifications from the wallpaper service.
///
/// Calls happen on whichever thread finished the operation, possibly the
/// rotation scheduler's.
pub trait WallpaperObserver: Send + Sync {
    fn wallpaper_changed(&self, record: &WallpaperRecord);
    fn collection_updated(&self, wallpapers: &[WallpaperView]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WallpaperEvent {
    WallpaperChanged(WallpaperRecord),
    CollectionUpdated(Vec<WallpaperView>),
}

/// Forwards events to a channel so a UI thread can drain them. A closed
/// receiver is ignored.
impl WallpaperObserver for Sender<WallpaperEvent> {
    fn wallpaper_changed(&self, record: &WallpaperRecord) {
        let _ = self.send(WallpaperEvent::WallpaperChanged(record.clone()));
    }

    fn collection_updated(&self, wallpapers: &[WallpaperView]) {
        let _ = self.send(WallpaperEvent::CollectionUpdated(wallpapers.to_vec()));
    }
}
