//! Error types shared by every wallcycle component.

use thiserror::Error;

/// Errors surfaced by the wallpaper lifecycle manager.
///
/// `SourceUnavailable` is only ever produced for a single source and is
/// recovered from by the acquirer; callers of the facade see
/// `AllSourcesExhausted` instead.
#[derive(Debug, Error)]
pub enum WallpaperError {
    /// One source failed: bad status, transport error or undersized payload.
    #[error("source {url} unavailable: {reason}")]
    SourceUnavailable { url: String, reason: String },
    /// Every configured source failed.
    #[error("all download sources failed ({attempted} tried)")]
    AllSourcesExhausted { attempted: usize },
    /// The platform could not set the desktop background.
    #[error("failed to set wallpaper: {0}")]
    ApplyFailed(String),
    /// A document could not be written to the persistent store.
    #[error("failed to persist {0}")]
    Persistence(String),
    /// The requested wallpaper or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Settings rejected before being applied.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    /// Another download-and-set cycle is running.
    #[error("a wallpaper change is already in progress")]
    CycleInProgress,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = WallpaperError> = std::result::Result<T, E>;
