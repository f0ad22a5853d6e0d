//! UFO shadow state
//!
//! The UFO accepts fire-and-forget HTTP commands and never reports what it is
//! showing. This crate keeps the authoritative in-memory replica of the
//! display and a stack of effect layers that can be unwound to restore
//! earlier displays.
//!
//! # Architecture
//!
//! ```text
//! tool call ──► StateManager ──► EventBroadcaster ──► subscribers
//!                 │  LedState
//!                 │  EffectStack
//!                 └─► build_state_query() ──► device query string
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ufo_state::{EffectContext, StateManager, Expiry};
//!
//! let manager = StateManager::default();
//! manager.update_brightness(128);
//! manager.update_ring_segments("top", &["FF0000".into()], "000000");
//!
//! // Layer an alert on top of whatever is showing
//! let generation = manager.push_effect("alert", "top_init=1&top=0|15|FF0000", EffectContext::timed(5000));
//!
//! // Later, from the timer
//! match manager.expire_effect(generation) {
//!     Expiry::Restore(entry) => send(&entry.pattern),
//!     Expiry::Clear => send(ufo_codec::CLEAR_QUERY),
//!     Expiry::Stale => {}
//! }
//! ```

pub mod event;
pub mod logging;
pub mod manager;
pub mod model;
pub mod query;
pub mod stack;

pub use event::{Event, EventBroadcaster, EventKind, RingUpdate, DEFAULT_EVENT_BUFFER};
pub use manager::{StateManager, DEFAULT_STACK_DEPTH_WARNING};
pub use model::{LedState, RingColors, MAX_BRIGHTNESS};
pub use query::build_state_query;
pub use stack::{
    EffectContext, EffectEntry, EffectStack, Expiry, Popped, BASE_STATE_NAME, CONFIG_EFFECT_NAME,
};

// Re-export codec types that appear in this crate's API
pub use ufo_codec::{MorphConfig, Ring};
