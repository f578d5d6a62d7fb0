//! Background rotation: one download-and-set cycle per elapsed interval.
//!
//! The loop wakes on a fixed tick, independent of the configured interval,
//! and only talks to the [`WallpaperService`] through its public operations.

use log::{debug, info, warn};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::record::WallpaperRecord;
use crate::service::WallpaperService;

pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    /// Disabled, or the interval has not elapsed yet.
    Idle,
    /// Enabled and the interval has elapsed.
    Due,
}

#[derive(Debug)]
pub enum TickOutcome {
    Idle,
    Changed(WallpaperRecord),
    Failed(String),
}

pub struct RotationScheduler {
    service: Arc<WallpaperService>,
    /// `None` until the first cycle when rotation should start right away.
    last_change: Option<Instant>,
}

impl RotationScheduler {
    /// The first rotation happens one full interval from now.
    pub fn new(service: Arc<WallpaperService>) -> Self {
        Self::starting_at(service, Instant::now())
    }

    pub fn starting_at(service: Arc<WallpaperService>, last_change: Instant) -> Self {
        Self {
            service,
            last_change: Some(last_change),
        }
    }

    /// The first tick with auto change enabled runs a cycle.
    pub fn due_immediately(service: Arc<WallpaperService>) -> Self {
        Self {
            service,
            last_change: None,
        }
    }

    pub fn state(&self, now: Instant) -> RotationState {
        let settings = self.service.settings();
        let elapsed_enough = match self.last_change {
            Some(last_change) => now.saturating_duration_since(last_change) >= settings.change_interval(),
            None => true,
        };

        if settings.auto_change_enabled && elapsed_enough {
            RotationState::Due
        } else {
            RotationState::Idle
        }
    }

    /// Evaluates the state at `now` and runs at most one cycle. The timer is
    /// reset to the moment the cycle finished, whether or not it succeeded.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state(now) == RotationState::Idle {
            debug!("Rotation idle");
            return TickOutcome::Idle;
        }

        info!("Auto-changing wallpaper");
        let started = Instant::now();
        let outcome = match self.service.download_and_set() {
            Ok(record) => TickOutcome::Changed(record),
            Err(e) => {
                warn!("Auto-change failed: {}", e);
                TickOutcome::Failed(e.to_string())
            }
        };
        self.last_change = Some(now + started.elapsed());
        outcome
    }

    /// Runs the tick loop on a dedicated thread until the handle is stopped
    /// or dropped.
    pub fn spawn(mut self, tick_every: Duration) -> io::Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("wallcycle-rotation".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(tick_every) {
                    Err(RecvTimeoutError::Timeout) => {
                        self.tick(Instant::now());
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(SchedulerHandle {
            stop_tx,
            join: Some(join),
        })
    }
}

pub struct SchedulerHandle {
    stop_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Wakes the loop and waits for it to exit. An in-flight cycle is
    /// allowed to finish first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("Rotation thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
