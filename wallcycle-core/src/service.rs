//! The operations exposed to the presentation layer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::acquirer::Acquirer;
use crate::applier::{self, BackgroundSetter};
use crate::collection::CollectionManager;
use crate::config::{Config, Settings};
use crate::error::{Result, WallpaperError};
use crate::fetch::{AttoFetcher, HttpFetcher};
use crate::observer::WallpaperObserver;
use crate::record::{WallpaperRecord, WallpaperView};
use crate::store::DocumentStore;

/// Owns the settings, the collection and the single in-flight cycle.
///
/// Shared between the UI and the rotation scheduler behind an `Arc`.
pub struct WallpaperService {
    config: Config,
    store: DocumentStore,
    settings: Mutex<Settings>,
    collection: CollectionManager,
    acquirer: Acquirer,
    setter: Arc<dyn BackgroundSetter>,
    cycle: Mutex<()>,
    observers: Mutex<Vec<Arc<dyn WallpaperObserver>>>,
}

impl WallpaperService {
    /// Production wiring: attohttpc downloads and the platform setter chain.
    pub fn new(config: Config) -> Self {
        Self::with_services(config, Arc::new(AttoFetcher::default()), Arc::new(applier::platform_default()))
    }

    /// Loads settings and the collection, then sweeps abandoned downloads.
    pub fn with_services(config: Config, fetcher: Arc<dyn HttpFetcher>, setter: Arc<dyn BackgroundSetter>) -> Self {
        let store = DocumentStore::new(&config);
        let settings = load_settings(&store);
        let collection = CollectionManager::load_from_disk(store.clone());
        let acquirer = Acquirer::new(fetcher, &config.wallpaper_dir);
        acquirer.sweep_orphans(&collection.list());

        info!(
            "Loaded {} wallpapers from {}",
            collection.len(),
            config.collection_file.display()
        );

        Self {
            config,
            store,
            settings: Mutex::new(settings),
            collection,
            acquirer,
            setter,
            cycle: Mutex::new(()),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn WallpaperObserver>) {
        lock(&self.observers).push(observer);
    }

    /// Newest-first, each with its `file://` reference.
    pub fn list_wallpapers(&self) -> Vec<WallpaperView> {
        self.collection.views()
    }

    /// The image at `path` as a `data:` URI.
    pub fn wallpaper_preview(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => WallpaperError::NotFound(path.display().to_string()),
            _ => WallpaperError::Io(e),
        })?;

        Ok(format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes)))
    }

    pub fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    /// Replaces the settings and persists them. A lower retention cap takes
    /// effect on the next download, not here.
    ///
    /// If the write fails the new settings stay active for this process and
    /// the persistence error is returned.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.validate().map_err(WallpaperError::InvalidSettings)?;

        let mut current = lock(&self.settings);
        *current = settings;
        self.store.save_settings(&current).inspect_err(|e| {
            warn!("Settings will not survive a restart: {}", e);
        })
    }

    /// Downloads a new wallpaper, applies it and records it.
    ///
    /// Rejected with `CycleInProgress` while another cycle runs. When only
    /// the apply step fails the download is kept in the collection.
    pub fn download_and_set(&self) -> Result<WallpaperRecord> {
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(WallpaperError::CycleInProgress),
        };

        let sources = self.settings().download_sources;
        let record = self.acquirer.acquire(&sources)?;
        let applied = self.apply(&record.path);

        let max_wallpapers = self.settings().max_wallpapers;
        self.collection.add(record.clone(), max_wallpapers);

        match applied {
            Ok(()) => {
                info!("Wallpaper changed to {}", record.filename);
                self.notify(|o| o.wallpaper_changed(&record));
                Ok(record)
            }
            Err(e) => {
                warn!("Downloaded {} but could not apply it: {}", record.filename, e);
                let wallpapers = self.list_wallpapers();
                self.notify(|o| o.collection_updated(&wallpapers));
                Err(e)
            }
        }
    }

    /// Applies any existing file without touching the collection.
    pub fn set_wallpaper(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(WallpaperError::NotFound(path.display().to_string()));
        }
        self.apply(path)
    }

    /// Deletes a wallpaper and its file. Unknown ids succeed without effect.
    pub fn delete_wallpaper(&self, id: &str) -> Result<()> {
        if let Some(removed) = self.collection.remove(id) {
            info!("Deleted wallpaper {}", removed.filename);
            let wallpapers = self.list_wallpapers();
            self.notify(|o| o.collection_updated(&wallpapers));
        }
        Ok(())
    }

    pub fn wallpaper_directory(&self) -> &Path {
        self.config.wallpaper_dir()
    }

    pub fn open_wallpaper_directory(&self) -> Result<()> {
        open::that(self.wallpaper_directory()).map_err(|e| {
            error!("Could not open {}: {}", self.wallpaper_directory().display(), e);
            WallpaperError::Io(e)
        })
    }

    fn apply(&self, path: &Path) -> Result<()> {
        self.setter.set_background(path).map_err(|e| match e {
            WallpaperError::ApplyFailed(_) => e,
            other => WallpaperError::ApplyFailed(other.to_string()),
        })
    }

    fn notify(&self, event: impl Fn(&dyn WallpaperObserver)) {
        let observers = lock(&self.observers).clone();
        for observer in &observers {
            event(observer.as_ref());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Saved settings, or defaults. Defaults are written on first start; a
/// corrupt document is left in place for the user to inspect.
fn load_settings(store: &DocumentStore) -> Settings {
    match store.load_settings() {
        Ok(Some(settings)) => settings.sanitized(),
        Ok(None) => {
            let settings = Settings::default();
            if let Err(e) = store.save_settings(&settings) {
                warn!("Could not write default settings: {}", e);
            }
            settings
        }
        Err(e) => {
            error!("Using default settings: {}", e);
            Settings::default()
        }
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::WallpaperEvent;
    use crate::testing::{FakeFetcher, RecordingSetter};
    use std::sync::mpsc;
    use std::thread;

    const GOOD: &str = "https://good.example/img";

    struct Fixture {
        _tmp: tempfile::TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let config = Config::with_dirs(tmp.path().join("cfg"), tmp.path().join("pics")).unwrap();
            Self { _tmp: tmp, config }
        }

        fn service(&self, fetcher: FakeFetcher, setter: Arc<RecordingSetter>) -> WallpaperService {
            WallpaperService::with_services(self.config.clone(), Arc::new(fetcher), setter)
        }

        fn files(&self) -> usize {
            fs::read_dir(&self.config.wallpaper_dir).unwrap().count()
        }
    }

    fn settings(sources: &[&str], max_wallpapers: usize) -> Settings {
        Settings {
            download_sources: sources.iter().map(|s| s.to_string()).collect(),
            max_wallpapers,
            ..Settings::default()
        }
    }

    #[test]
    fn test_first_start_writes_default_settings() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default(), Arc::default());

        assert_eq!(service.settings(), Settings::default());
        assert!(fx.config.settings_file.is_file());
    }

    #[test]
    fn test_update_settings_persists() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default(), Arc::default());
        let wanted = settings(&[GOOD], 3);

        service.update_settings(wanted.clone()).unwrap();

        assert_eq!(service.settings(), wanted);
        let reloaded = fx.service(FakeFetcher::default(), Arc::default());
        assert_eq!(reloaded.settings(), wanted);
    }

    #[test]
    fn test_unwritable_store_keeps_working_in_memory() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default().with(GOOD, Ok(60_000)), Arc::default());
        for document in [&fx.config.settings_file, &fx.config.collection_file] {
            let _ = fs::remove_file(document);
            fs::create_dir(document).unwrap();
        }
        let wanted = settings(&[GOOD], 1);

        let err = service.update_settings(wanted.clone()).unwrap_err();

        assert!(matches!(err, WallpaperError::Persistence(_)));
        assert_eq!(service.settings(), wanted);

        service.download_and_set().unwrap();
        let latest = service.download_and_set().unwrap();

        let wallpapers = service.list_wallpapers();
        assert_eq!(wallpapers.len(), 1);
        assert_eq!(wallpapers[0].record, latest);
        assert!(fx.config.collection_file.is_dir());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default(), Arc::default());

        let err = service.update_settings(settings(&[GOOD], 0)).unwrap_err();

        assert!(matches!(err, WallpaperError::InvalidSettings(_)));
        assert_eq!(service.settings(), Settings::default());
    }

    #[test]
    fn test_download_and_set_records_and_notifies() {
        let fx = Fixture::new();
        let setter = Arc::new(RecordingSetter::default());
        let service = fx.service(FakeFetcher::default().with(GOOD, Ok(60_000)), setter.clone());
        service.update_settings(settings(&[GOOD], 5)).unwrap();
        let (tx, rx) = mpsc::channel();
        service.subscribe(Arc::new(tx));

        let record = service.download_and_set().unwrap();

        assert_eq!(setter.applied(), vec![record.path.clone()]);
        assert_eq!(service.list_wallpapers()[0].record, record);
        assert_eq!(rx.try_recv().unwrap(), WallpaperEvent::WallpaperChanged(record));
    }

    #[test]
    fn test_all_sources_failing_leaves_nothing() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default().with(GOOD, Ok(100)), Arc::default());
        service.update_settings(settings(&[GOOD, "https://missing"], 5)).unwrap();

        let err = service.download_and_set().unwrap_err();

        assert!(matches!(err, WallpaperError::AllSourcesExhausted { attempted: 2 }));
        assert!(service.list_wallpapers().is_empty());
        assert_eq!(fx.files(), 0);
    }

    #[test]
    fn test_apply_failure_keeps_download() {
        let fx = Fixture::new();
        let service = fx.service(
            FakeFetcher::default().with(GOOD, Ok(60_000)),
            Arc::new(RecordingSetter::failing()),
        );
        service.update_settings(settings(&[GOOD], 5)).unwrap();
        let (tx, rx) = mpsc::channel();
        service.subscribe(Arc::new(tx));

        let err = service.download_and_set().unwrap_err();

        assert!(matches!(err, WallpaperError::ApplyFailed(_)));
        let wallpapers = service.list_wallpapers();
        assert_eq!(wallpapers.len(), 1);
        assert!(wallpapers[0].record.path.is_file());
        assert_eq!(rx.try_recv().unwrap(), WallpaperEvent::CollectionUpdated(wallpapers));
    }

    #[test]
    fn test_retention_cap_of_one_keeps_latest() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default().with(GOOD, Ok(60_000)), Arc::default());
        service.update_settings(settings(&[GOOD], 1)).unwrap();

        let first = service.download_and_set().unwrap();
        let second = service.download_and_set().unwrap();

        let wallpapers = service.list_wallpapers();
        assert_eq!(wallpapers.len(), 1);
        assert_eq!(wallpapers[0].record.id, second.id);
        assert!(!first.path.exists());
        assert_eq!(fx.files(), 1);
    }

    #[test]
    fn test_concurrent_cycle_is_rejected() {
        let fx = Fixture::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let fetcher = FakeFetcher::default()
            .with(GOOD, Ok(60_000))
            .gated(entered_tx, release_rx);
        let service = Arc::new(fx.service(fetcher, Arc::default()));
        service.update_settings(settings(&[GOOD], 5)).unwrap();

        let background = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.download_and_set())
        };
        entered_rx.recv().unwrap();

        let second = service.download_and_set();
        release_tx.send(()).unwrap();
        let first = background.join().unwrap();

        assert!(matches!(second, Err(WallpaperError::CycleInProgress)));
        assert!(first.is_ok());
        assert_eq!(service.list_wallpapers().len(), 1);
        assert_eq!(fx.files(), 1);
    }

    #[test]
    fn test_delete_is_idempotent_and_notifies_once() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default().with(GOOD, Ok(60_000)), Arc::default());
        service.update_settings(settings(&[GOOD], 5)).unwrap();
        let record = service.download_and_set().unwrap();
        let (tx, rx) = mpsc::channel();
        service.subscribe(Arc::new(tx));

        service.delete_wallpaper(&record.id).unwrap();
        service.delete_wallpaper(&record.id).unwrap();

        assert!(service.list_wallpapers().is_empty());
        assert!(!record.path.exists());
        assert_eq!(rx.try_recv().unwrap(), WallpaperEvent::CollectionUpdated(Vec::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_set_wallpaper_requires_existing_file() {
        let fx = Fixture::new();
        let setter = Arc::new(RecordingSetter::default());
        let service = fx.service(FakeFetcher::default(), setter.clone());

        let missing = fx.config.wallpaper_dir.join("nope.jpg");
        assert!(matches!(service.set_wallpaper(&missing), Err(WallpaperError::NotFound(_))));

        let present = fx.config.wallpaper_dir.join("mine.png");
        fs::write(&present, b"png").unwrap();
        service.set_wallpaper(&present).unwrap();
        assert_eq!(setter.applied(), vec![present]);
        assert!(service.list_wallpapers().is_empty());
    }

    #[test]
    fn test_preview_data_uri() {
        let fx = Fixture::new();
        let service = fx.service(FakeFetcher::default(), Arc::default());
        let path = fx.config.wallpaper_dir.join("pic.PNG");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(service.wallpaper_preview(&path).unwrap(), "data:image/png;base64,YWJj");

        let missing = fx.config.wallpaper_dir.join("gone.jpg");
        assert!(matches!(service.wallpaper_preview(&missing), Err(WallpaperError::NotFound(_))));
    }

    #[test]
    fn test_startup_sweeps_orphaned_partials() {
        let fx = Fixture::new();
        let orphan = fx.config.wallpaper_dir.join("wallpaper_1_deadbeef.jpg");
        fs::write(&orphan, [0u8; 100]).unwrap();

        let service = fx.service(FakeFetcher::default(), Arc::default());

        assert!(!orphan.exists());
        assert_eq!(service.wallpaper_directory(), fx.config.wallpaper_dir.as_path());
    }
}
