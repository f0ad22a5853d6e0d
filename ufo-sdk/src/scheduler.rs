//! Timed-effect expiry
//!
//! Spawns a thread with its own tokio runtime. Each scheduled layer gets a
//! sleep task; when it fires, the layer is expired by generation so a timer
//! that outlived its layer changes nothing.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;

use ufo_client::DeviceClient;
use ufo_codec::CLEAR_QUERY;
use ufo_state::{EventKind, Expiry, StateManager};

use crate::dispatch::{Dispatcher, OK_CLEARED, OK_RESTORED};
use crate::error::{Result, SdkError};

/// Commands sent from [`UfoSystem`](crate::UfoSystem) to the timer thread
#[derive(Debug)]
pub enum Command {
    /// Expire the layer with `generation` after `delay`
    Schedule {
        generation: u64,
        effect: String,
        delay: Duration,
    },
    /// Stop the worker; pending timers are dropped
    Shutdown,
}

/// Restores the display when a timed layer runs out
#[derive(Clone)]
pub(crate) struct ExpiryHandler {
    manager: Arc<StateManager>,
    dispatcher: Dispatcher,
}

impl ExpiryHandler {
    pub(crate) fn new(manager: Arc<StateManager>, client: Arc<dyn DeviceClient>) -> Self {
        let dispatcher = Dispatcher::new(client, manager.events().clone());
        Self {
            manager,
            dispatcher,
        }
    }

    /// Expire `generation` and bring the device in line with the stack
    ///
    /// Returns `false` when the layer was already gone.
    pub(crate) fn expire(&self, generation: u64, effect: &str) -> bool {
        match self.manager.expire_effect(generation) {
            Expiry::Stale => {
                tracing::debug!("Timer for '{}' fired after its layer was removed", effect);
                return false;
            }
            Expiry::Restore(entry) => {
                if let Err(e) = self.dispatcher.play(&entry.pattern, OK_RESTORED) {
                    tracing::warn!("Failed to restore '{}' after '{}': {}", entry.name, effect, e);
                } else {
                    self.manager.apply_query(&entry.pattern);
                }
                self.manager.events().publish(EventKind::EffectResumed {
                    effect: entry.name,
                    stack_depth: self.manager.effect_stack_depth(),
                });
            }
            Expiry::Clear => {
                if let Err(e) = self.dispatcher.send(CLEAR_QUERY, OK_CLEARED, |c| c.clear()) {
                    tracing::warn!("Failed to clear device after '{}': {}", effect, e);
                }
                self.manager.mirror_clear();
            }
        }

        tracing::info!("Effect '{}' completed", effect);
        self.manager.events().publish(EventKind::EffectCompleted {
            effect: effect.to_string(),
            stack_depth: self.manager.effect_stack_depth(),
        });
        true
    }
}

/// Handle to the background timer thread
///
/// Dropping it shuts the worker down.
pub struct EffectScheduler {
    command_tx: mpsc::UnboundedSender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl EffectScheduler {
    pub(crate) fn spawn(handler: ExpiryHandler) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name("ufo-effect-timer".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!("Failed to create tokio runtime for effect timers: {}", e);
                        return;
                    }
                };

                rt.block_on(run_timer_loop(handler, command_rx));
            })
            .map_err(|e| SdkError::Scheduler(format!("failed to spawn timer thread: {}", e)))?;

        Ok(Self {
            command_tx,
            worker: Some(worker),
        })
    }

    /// Expire the layer carrying `generation` once `delay` has passed
    pub fn schedule(&self, generation: u64, effect: impl Into<String>, delay: Duration) -> Result<()> {
        self.command_tx
            .send(Command::Schedule {
                generation,
                effect: effect.into(),
                delay,
            })
            .map_err(|_| SdkError::Scheduler("effect timer is not running".to_string()))
    }

    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }
}

impl Drop for EffectScheduler {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

async fn run_timer_loop(handler: ExpiryHandler, mut command_rx: mpsc::UnboundedReceiver<Command>) {
    tracing::info!("Effect timer started");

    while let Some(command) = command_rx.recv().await {
        match command {
            Command::Schedule {
                generation,
                effect,
                delay,
            } => {
                tracing::debug!(
                    "Scheduling expiry of '{}' (generation {}) in {:?}",
                    effect,
                    generation,
                    delay
                );
                let handler = handler.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // device requests block, keep them off the timer thread
                    let result = tokio::task::spawn_blocking(move || {
                        handler.expire(generation, &effect);
                    })
                    .await;
                    if let Err(e) = result {
                        tracing::error!("Expiry task for generation {} failed: {}", generation, e);
                    }
                });
            }
            Command::Shutdown => {
                tracing::info!("Effect timer received shutdown command");
                break;
            }
        }
    }

    tracing::info!("Effect timer shut down");
}
