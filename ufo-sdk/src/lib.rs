//! UFO SDK
//!
//! Drive the UFO LED device with a shadow state that remembers what the
//! device is showing and an effect stack that can unwind to earlier
//! displays.
//!
//! The crate wires together:
//! - `ufo-client` for the device HTTP API
//! - `ufo-state` for the shadow state, effect stack and events
//! - `ufo-effects` for the persisted effect catalog
//!
//! and exposes the tool operations a front end calls through
//! [`UfoSystem`], each taking a typed, validated request.
//!
//! Logging is off until the host calls [`init_logging`] or
//! [`init_logging_from_env`] (`UFO_LOG_MODE=development|debug`).

mod config;
mod dispatch;
mod error;
pub mod request;
mod scheduler;
mod system;

pub use config::{UfoConfig, DEVICE_HOST_ENV, EFFECTS_FILE_ENV};
pub use error::{Result, SdkError};
pub use request::{
    AddEffect, ConfigureLighting, DeleteEffect, LightingPlan, LogoCommand, LogoConfig,
    MorphRequest, PlayEffect, RingConfig, RingPlan, SendRawApi, SetBrightness, SetLogo,
    SetRingPattern, UpdateEffect,
};
pub use scheduler::{Command, EffectScheduler};
pub use system::{EffectPlayed, LightingApplied, StopOutcome, UfoSystem};

// Re-export the types that appear in this crate's API
pub use ufo_client::{ClientConfig, ClientError, DeviceClient, UfoClient};
pub use ufo_effects::{CatalogError, Effect, EffectStore};
pub use ufo_state::logging::{
    init_logging, init_logging_from_env, is_initialized, LoggingError, LoggingMode,
};
pub use ufo_state::{Event, EventKind, LedState, StateManager};
