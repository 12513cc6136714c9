//! Shared control state between the public API and the worker task:
//! the pause flag, the stop token, and the progress cell behind
//! `status`. The flag mutex and the notify are the only
//! synchronisation primitives the worker ever touches.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

use tw_domain::{CancelToken, Error, Result};

/// Snapshot returned by `status`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResolutionStatus {
    pub running: bool,
    pub paused: bool,
    pub stop_requested: bool,
    pub round: u32,
    pub turn: usize,
}

#[derive(Default)]
struct Progress {
    running: bool,
    paused: bool,
    round: u32,
    turn: usize,
}

/// Control surface shared by the handle and the worker.
pub(crate) struct ControlCenter {
    progress: Mutex<Progress>,
    notify: Notify,
    cancel: CancelToken,
}

impl ControlCenter {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(Progress {
                running: true,
                ..Progress::default()
            }),
            notify: Notify::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn pause(&self) {
        self.progress.lock().paused = true;
        self.notify.notify_waiters();
    }

    pub fn resume(&self) {
        self.progress.lock().paused = false;
        self.notify.notify_waiters();
    }

    /// Idempotent. Also wakes a pause wait so the worker can observe
    /// the stop.
    pub fn request_stop(&self) {
        self.cancel.cancel();
        self.notify.notify_waiters();
    }

    pub fn set_progress(&self, round: u32, turn: usize) {
        let mut progress = self.progress.lock();
        progress.round = round;
        progress.turn = turn;
    }

    pub fn set_finished(&self) {
        self.progress.lock().running = false;
    }

    pub fn status(&self) -> ResolutionStatus {
        let progress = self.progress.lock();
        ResolutionStatus {
            running: progress.running,
            paused: progress.paused,
            stop_requested: self.cancel.is_cancelled(),
            round: progress.round,
            turn: progress.turn,
        }
    }

    /// Suspension point: returns once unpaused, or `Cancelled` when a
    /// stop has been requested. The notified future is created before
    /// the flag check so a wake between check and await is never lost.
    pub async fn wait_ready(&self) -> Result<()> {
        loop {
            let notified = self.notify.notified();
            {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if !self.progress.lock().paused {
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Quick stop check for non-waiting suspension points.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
