//! Wallpaper lifecycle management: downloads images from a ranked list of
//! sources, keeps a bounded newest-first collection on disk, applies
//! wallpapers to the desktop and rotates them in the background.

pub mod acquirer;
pub mod applier;
pub mod collection;
pub mod config;
pub mod error;
pub mod fetch;
pub mod observer;
pub mod record;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use crate::applier::{BackgroundSetter, ChainSetter, CommandSetter, WallpaperCrateSetter};
pub use crate::config::{Config, Settings};
pub use crate::error::{Result, WallpaperError};
pub use crate::fetch::{AttoFetcher, HttpFetcher};
pub use crate::observer::{WallpaperEvent, WallpaperObserver};
pub use crate::record::{WallpaperRecord, WallpaperView};
pub use crate::scheduler::{RotationScheduler, SchedulerHandle, TICK_INTERVAL};
pub use crate::service::WallpaperService;
