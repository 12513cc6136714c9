//! Public lifecycle API: `start`, `pause`, `resume`, `stop`, `status`.
//! One engine owns at most one live resolution; the worker runs on its
//! own task and the observer is fed through the dispatcher, never from
//! the caller's thread.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use tw_domain::{DiceRoller, EncounterState, EngineConfig, Error, Result};
use tw_oracle::{Oracle, OracleGateway};
use tw_rules::executor::RulesConfig;

use crate::control::{ControlCenter, ResolutionStatus};
use crate::observer::{spawn_dispatcher, EventBus, Observer};
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Run to a terminal condition without stopping.
    Continuous,
    /// Self-pause after every committed turn; `resume` releases one
    /// more turn.
    Step,
}

/// Opaque handle to a started resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionHandle {
    id: Uuid,
}

struct ActiveResolution {
    id: Uuid,
    control: Arc<ControlCenter>,
    worker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
    stop_grace: Duration,
}

/// Owns the resolution lifecycle. At most one resolution is live at a
/// time; a second `start` while one runs returns `AlreadyRunning`.
pub struct ResolutionEngine {
    active: Mutex<Option<ActiveResolution>>,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionEngine {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// Spawn the resolution worker. Must be called from within a tokio
    /// runtime.
    pub fn start(
        &self,
        encounter: EncounterState,
        roller: Arc<dyn DiceRoller>,
        oracle: Arc<dyn Oracle>,
        observer: Arc<dyn Observer>,
        mode: ResolutionMode,
        config: EngineConfig,
    ) -> Result<ResolutionHandle> {
        let mut active = self.active.lock();
        if let Some(existing) = active.as_ref() {
            if existing.control.status().running {
                return Err(Error::AlreadyRunning);
            }
        }

        let id = Uuid::new_v4();
        let control = Arc::new(ControlCenter::new());
        let (bus, rx) = EventBus::new(config.event_channel_capacity);
        let dispatcher = spawn_dispatcher(rx, observer, config.drop_oldest_on_observer_lag);
        let rules_config = RulesConfig {
            critical_range: config.critical_range.clone(),
            monster_unconscious_max_hp: config.monster_unconscious_max_hp,
        };
        let stop_grace = Duration::from_millis(config.stop_grace_ms);

        let worker = Worker {
            encounter,
            roller,
            oracle,
            gateway: OracleGateway::new(),
            bus,
            control: control.clone(),
            config,
            rules_config,
            mode,
            resolution_id: id,
        };
        let span = tracing::info_span!("resolution", id = %id);
        let worker = tokio::spawn(worker.run().instrument(span));

        *active = Some(ActiveResolution {
            id,
            control,
            worker: Some(worker),
            dispatcher: Some(dispatcher),
            stop_grace,
        });
        Ok(ResolutionHandle { id })
    }

    pub fn pause(&self, handle: ResolutionHandle) -> Result<()> {
        let active = self.active.lock();
        let resolution = active
            .as_ref()
            .filter(|a| a.id == handle.id)
            .ok_or(Error::NotRunning)?;
        if !resolution.control.status().running {
            return Err(Error::NotRunning);
        }
        resolution.control.pause();
        Ok(())
    }

    pub fn resume(&self, handle: ResolutionHandle) -> Result<()> {
        let active = self.active.lock();
        let resolution = active
            .as_ref()
            .filter(|a| a.id == handle.id)
            .ok_or(Error::NotRunning)?;
        if !resolution.control.status().running {
            return Err(Error::NotRunning);
        }
        resolution.control.resume();
        Ok(())
    }

    pub fn status(&self, handle: ResolutionHandle) -> Result<ResolutionStatus> {
        let active = self.active.lock();
        let resolution = active
            .as_ref()
            .filter(|a| a.id == handle.id)
            .ok_or(Error::NotRunning)?;
        Ok(resolution.control.status())
    }

    /// Request a stop and wait for the worker to exit. The wait is
    /// bounded by the configured grace period, after which the worker
    /// task is aborted; the transaction snapshot guarantees the last
    /// committed state is consistent either way. Idempotent.
    pub async fn stop(&self, handle: ResolutionHandle) -> Result<()> {
        let (control, worker, dispatcher, grace) = {
            let mut active = self.active.lock();
            let resolution = active
                .as_mut()
                .filter(|a| a.id == handle.id)
                .ok_or(Error::NotRunning)?;
            (
                resolution.control.clone(),
                resolution.worker.take(),
                resolution.dispatcher.take(),
                resolution.stop_grace,
            )
        };

        control.request_stop();

        if let Some(mut worker) = worker {
            if tokio::time::timeout(grace, &mut worker).await.is_err() {
                tracing::warn!("worker missed the stop grace period; aborting the task");
                worker.abort();
                let _ = worker.await;
            }
        }
        // The worker dropped its event sender; the dispatcher drains
        // the channel and exits, so every published event was seen.
        if let Some(dispatcher) = dispatcher {
            let _ = tokio::time::timeout(grace, dispatcher).await;
        }
        Ok(())
    }
}
