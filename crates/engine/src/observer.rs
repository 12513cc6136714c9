//! Observer fan-out: the worker publishes into a bounded broadcast
//! channel and a dispatcher task drains it into the observer callback.
//! A slow observer loses the oldest pending updates and receives a
//! `lag` diagnostic instead of ever blocking the worker.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use tw_domain::EngineEvent;

/// Receives engine events on the dispatcher task, in turn order.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<EngineEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: EngineEvent) {
        // Send only fails with no receiver at all; the dispatcher task
        // outlives the worker, so a failure here means shutdown.
        let _ = self.tx.send(event);
    }
}

/// Drain the channel into the observer until it closes.
pub(crate) fn spawn_dispatcher(
    mut rx: broadcast::Receiver<EngineEvent>,
    observer: Arc<dyn Observer>,
    emit_lag: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => observer.on_event(event),
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    tracing::warn!(dropped, "observer lagging; dropped oldest events");
                    if emit_lag {
                        observer.on_event(EngineEvent::Lag {
                            dropped_events: dropped,
                        });
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
