//! UfoSystem - main entry point for the SDK
//!
//! Ties the device client, shadow state, effect stack, catalog and effect
//! timers together behind one synchronous API. Every operation validates its
//! request before anything is sent, and the shadow is only updated after the
//! device accepted the command.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use ufo_client::{DeviceClient, UfoClient};
use ufo_codec::CLEAR_QUERY;
use ufo_effects::{Effect, EffectStore};
use ufo_state::{
    EffectContext, Event, EventBroadcaster, EventKind, LedState, StateManager, CONFIG_EFFECT_NAME,
};

use crate::config::UfoConfig;
use crate::dispatch::{Dispatcher, OK};
use crate::error::{Result, SdkError};
use crate::request::{
    AddEffect, ConfigureLighting, DeleteEffect, PlayEffect, SendRawApi, SetBrightness, SetLogo,
    SetRingPattern, UpdateEffect,
};
use crate::scheduler::{EffectScheduler, ExpiryHandler};

/// A multi-field configuration that reached the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightingApplied {
    /// Combined query that was sent
    pub query: String,
    /// Generation of the pushed `__config__` layer
    pub generation: u64,
    /// `0` when the configuration stays until replaced
    pub duration_ms: u64,
}

/// A catalog effect that is now on top of the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectPlayed {
    pub effect: Effect,
    pub duration_ms: u64,
    pub generation: u64,
    pub stack_depth: usize,
}

/// What a manual stop did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The stack was empty; nothing was sent
    NothingRunning,
    /// A lower layer is showing again
    Resumed {
        stopped: String,
        resumed: String,
        stack_depth: usize,
    },
    /// The last layer was removed and the device cleared
    Cleared { stopped: String },
}

/// Main system entry point
///
/// UfoSystem is fully synchronous; effect timers run on a background thread.
///
/// # Example
///
/// ```rust,ignore
/// use ufo_sdk::{PlayEffect, SetBrightness, UfoConfig, UfoSystem};
///
/// fn main() -> Result<(), ufo_sdk::SdkError> {
///     let system = UfoSystem::new(UfoConfig::from_env())?;
///
///     system.set_brightness(&SetBrightness::new(128))?;
///
///     // Layer a timed effect over whatever is showing
///     let played = system.play_effect(&PlayEffect::new("policeLights").with_duration(5000))?;
///     println!("{} layers deep", played.stack_depth);
///
///     // Stop it early; the previous display comes back
///     system.stop_effect()?;
///     Ok(())
/// }
/// ```
pub struct UfoSystem {
    config: UfoConfig,

    /// Shadow state and effect stack
    state_manager: Arc<StateManager>,

    dispatcher: Dispatcher,

    effects: EffectStore,

    scheduler: EffectScheduler,
}

impl UfoSystem {
    /// Connect to the configured device and open the effect catalog
    pub fn new(config: UfoConfig) -> Result<Self> {
        config.validate()?;
        let client = UfoClient::new(config.client_config());
        let effects = EffectStore::open(&config.effects_path)?;
        Self::with_client(config, Arc::new(client), effects)
    }

    /// [`new`](Self::new) with settings taken from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(UfoConfig::from_env())
    }

    /// Build a system around an existing client and catalog
    pub fn with_client(
        config: UfoConfig,
        client: Arc<dyn DeviceClient>,
        effects: EffectStore,
    ) -> Result<Self> {
        config.validate()?;

        let state_manager = Arc::new(
            StateManager::new(EventBroadcaster::new(config.event_buffer_size))
                .with_stack_depth_warning(config.stack_depth_warning),
        );
        let dispatcher = Dispatcher::new(Arc::clone(&client), state_manager.events().clone());
        let scheduler =
            EffectScheduler::spawn(ExpiryHandler::new(Arc::clone(&state_manager), client))?;

        tracing::info!(
            "UFO system ready ({} effects in catalog)",
            effects.len()
        );

        Ok(Self {
            config,
            state_manager,
            dispatcher,
            effects,
            scheduler,
        })
    }

    pub fn config(&self) -> &UfoConfig {
        &self.config
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    pub fn effects(&self) -> &EffectStore {
        &self.effects
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.state_manager.subscribe()
    }

    // ========================================================================
    // Display
    // ========================================================================

    pub fn set_brightness(&self, request: &SetBrightness) -> Result<()> {
        let level = request.validate()?;
        self.dispatcher
            .send(&format!("dim={}", level), OK, |c| c.set_brightness(level))?;
        self.state_manager.update_brightness(level);
        Ok(())
    }

    pub fn set_logo(&self, request: &SetLogo) -> Result<()> {
        let logo = request.validate()?;
        self.dispatcher
            .send(&logo.to_query(), OK, |c| c.set_logo(&logo.value))?;
        self.state_manager.update_logo(logo.on);
        Ok(())
    }

    /// Replace one ring's pattern and animation
    pub fn set_ring_pattern(&self, request: &SetRingPattern) -> Result<()> {
        let command = request.validate()?;
        let query = command.to_query();
        self.dispatcher
            .send(&query, OK, |c| c.set_ring_pattern(&command))?;
        self.state_manager.apply_ring_command(command.ring, &query);
        Ok(())
    }

    /// Apply brightness, rings and logo in one device request
    ///
    /// The resulting display is pushed as a synthetic `__config__` layer so
    /// a later stop or expiry can return to it. Returns `None` when the
    /// request configured nothing.
    pub fn configure_lighting(&self, request: &ConfigureLighting) -> Result<Option<LightingApplied>> {
        let plan = request.validate()?;
        if plan.is_empty() {
            tracing::debug!("No lighting configuration provided");
            return Ok(None);
        }

        let query = plan.to_query();
        self.dispatcher
            .send(&query, OK, |c| c.send_raw_query(&query).map(|_| ()))?;

        if let Some(level) = plan.brightness {
            self.state_manager.update_brightness(level);
        }
        for ring in &plan.rings {
            let ring_query = ring.command.to_query();
            self.state_manager.apply_ring_command(ring.command.ring, &ring_query);
            if ring.morph.is_some() {
                self.state_manager.update_morph(ring.command.ring, ring.morph);
            }
        }
        if let Some(logo) = &plan.logo {
            self.state_manager.update_logo(logo.on);
        }

        let context = if plan.duration_ms > 0 {
            EffectContext::timed(plan.duration_ms).synthetic()
        } else {
            EffectContext::perpetual().synthetic()
        };
        let generation = self.state_manager.push_effect(
            CONFIG_EFFECT_NAME,
            self.state_manager.build_state_query(),
            context,
        );

        if context.is_timed() {
            self.scheduler.schedule(
                generation,
                CONFIG_EFFECT_NAME,
                Duration::from_millis(plan.duration_ms),
            )?;
        }

        Ok(Some(LightingApplied {
            query,
            generation,
            duration_ms: plan.duration_ms,
        }))
    }

    /// Send a query verbatim and return the device's response
    pub fn send_raw_api(&self, request: &SendRawApi) -> Result<String> {
        let query = request.validate()?;
        let body = self.dispatcher.send_raw(query)?;
        self.state_manager.apply_query(query);
        Ok(body)
    }

    /// Copy of the shadow state
    pub fn get_led_state(&self) -> LedState {
        self.state_manager.snapshot()
    }

    pub fn get_led_state_json(&self) -> Result<String> {
        Ok(self.state_manager.to_json()?)
    }

    // ========================================================================
    // Effects
    // ========================================================================

    /// Play a catalog effect on top of the current display
    ///
    /// Timed effects expire on their own and the layer below comes back.
    pub fn play_effect(&self, request: &PlayEffect) -> Result<EffectPlayed> {
        let (name, duration) = request.validate()?;
        let effect = self
            .effects
            .get(name)
            .ok_or_else(|| SdkError::EffectNotFound(name.to_string()))?;
        let duration_ms = duration.unwrap_or(effect.duration);

        self.dispatcher.play(&effect.pattern, OK)?;
        self.state_manager.apply_query(&effect.pattern);

        let context = if effect.perpetual {
            EffectContext::perpetual()
        } else {
            EffectContext::timed(duration_ms)
        };
        let generation = self
            .state_manager
            .push_effect(effect.name.as_str(), effect.pattern.as_str(), context);
        let stack_depth = self.state_manager.effect_stack_depth();

        self.state_manager.events().publish(EventKind::EffectStarted {
            effect: effect.name.clone(),
            duration_ms,
            pattern: effect.pattern.clone(),
            stack_depth,
        });

        if context.is_timed() {
            self.scheduler
                .schedule(generation, effect.name.as_str(), Duration::from_millis(duration_ms))?;
        }

        tracing::info!("Playing effect '{}' (depth {})", effect.name, stack_depth);
        Ok(EffectPlayed {
            effect,
            duration_ms,
            generation,
            stack_depth,
        })
    }

    /// Remove the top layer and show what was underneath
    ///
    /// When nothing is underneath, the device is cleared and the shadow
    /// reset.
    pub fn stop_effect(&self) -> Result<StopOutcome> {
        let Some(popped) = self.state_manager.take_effect() else {
            return Ok(StopOutcome::NothingRunning);
        };
        let stopped = popped.removed.name;

        let outcome = match popped.restore {
            Some(entry) => {
                self.dispatcher.play(&entry.pattern, OK)?;
                self.state_manager.apply_query(&entry.pattern);

                let stack_depth = self.state_manager.effect_stack_depth();
                self.state_manager.events().publish(EventKind::EffectResumed {
                    effect: entry.name.clone(),
                    stack_depth,
                });
                StopOutcome::Resumed {
                    stopped: stopped.clone(),
                    resumed: entry.name,
                    stack_depth,
                }
            }
            None => {
                self.dispatcher.send(CLEAR_QUERY, OK, |c| c.clear())?;
                self.state_manager.mirror_clear();
                StopOutcome::Cleared {
                    stopped: stopped.clone(),
                }
            }
        };

        self.state_manager.events().publish(EventKind::EffectStopped {
            effect: stopped,
            manual: true,
            stack_depth: self.state_manager.effect_stack_depth(),
        });
        Ok(outcome)
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub fn list_effects(&self) -> Vec<Effect> {
        self.effects.list()
    }

    pub fn add_effect(&self, request: &AddEffect) -> Result<Effect> {
        let effect = request.validate()?;
        if self.effects.get(&effect.name).is_some() {
            return Err(SdkError::Validation(format!(
                "Effect '{}' already exists. Use updateEffect to modify it.",
                effect.name
            )));
        }

        self.effects.add(effect.clone())?;
        self.effects
            .get(&effect.name)
            .ok_or(SdkError::EffectNotFound(effect.name))
    }

    pub fn update_effect(&self, request: &UpdateEffect) -> Result<Effect> {
        let name = request.name()?;
        let existing = self.effects.get(name).ok_or_else(|| {
            SdkError::Validation(format!(
                "Effect '{}' not found. Use addEffect to create it first.",
                name
            ))
        })?;

        let updated = request.apply_to(existing)?;
        self.effects.update(updated.clone())?;
        self.effects
            .get(&updated.name)
            .ok_or(SdkError::EffectNotFound(updated.name))
    }

    /// Delete a custom effect; seed effects are protected
    pub fn delete_effect(&self, request: &DeleteEffect) -> Result<Effect> {
        let name = request.validate()?;
        Ok(self.effects.delete(name)?)
    }
}
