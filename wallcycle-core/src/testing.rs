//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::applier::BackgroundSetter;
use crate::error::{Result, WallpaperError};
use crate::fetch::HttpFetcher;

/// Blocks a fetch until the test releases it.
pub(crate) struct Gate {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

/// Serves canned bodies and remembers every URL it was asked for.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    bodies: HashMap<String, std::result::Result<usize, String>>,
    contacted: Mutex<Vec<String>>,
    gate: Option<Gate>,
}

impl FakeFetcher {
    /// `Ok(len)` serves `len` bytes, `Err(reason)` fails the fetch.
    pub(crate) fn with(mut self, url: &str, body: std::result::Result<usize, &str>) -> Self {
        self.bodies.insert(url.to_string(), body.map_err(|e| e.to_string()));
        self
    }

    pub(crate) fn gated(mut self, entered: Sender<()>, release: Receiver<()>) -> Self {
        self.gate = Some(Gate {
            entered: Mutex::new(entered),
            release: Mutex::new(release),
        });
        self
    }

    pub(crate) fn contacted(&self) -> Vec<String> {
        self.contacted.lock().unwrap().clone()
    }
}

impl HttpFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> std::result::Result<Box<dyn Read>, String> {
        self.contacted.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.gate {
            let _ = gate.entered.lock().unwrap().send(());
            let _ = gate.release.lock().unwrap().recv();
        }
        match self.bodies.get(url) {
            Some(Ok(len)) => Ok(Box::new(Cursor::new(vec![7u8; *len]))),
            Some(Err(reason)) => Err(reason.clone()),
            None => Err("HTTP 404".to_string()),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSetter {
    pub(crate) fail: bool,
    delay: Duration,
    applied: Mutex<Vec<PathBuf>>,
}

impl RecordingSetter {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Takes `delay` to apply, like a desktop command that is slow to return.
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn applied(&self) -> Vec<PathBuf> {
        self.applied.lock().unwrap().clone()
    }
}

impl BackgroundSetter for RecordingSetter {
    fn name(&self) -> &str {
        "recording"
    }

    fn set_background(&self, path: &Path) -> Result<()> {
        self.applied.lock().unwrap().push(path.to_path_buf());
        thread::sleep(self.delay);
        if self.fail {
            Err(WallpaperError::ApplyFailed("desktop refused".to_string()))
        } else {
            Ok(())
        }
    }
}
