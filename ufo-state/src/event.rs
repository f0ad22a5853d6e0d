//! Change notifications
//!
//! Events fan out through a `tokio::sync::broadcast` channel. Publishing never
//! blocks: with no subscribers the event is dropped, and a subscriber that
//! falls behind loses the oldest events (`RecvError::Lagged`).

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tokio::sync::broadcast;

use ufo_codec::{MorphConfig, Ring};

/// Default capacity of the event channel
pub const DEFAULT_EVENT_BUFFER: usize = 100;

// ============================================================================
// Event Types
// ============================================================================

/// A timestamped notification
///
/// Serializes as `{"type": "...", "data": {...}, "timestamp": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.name()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Render as a Server-Sent-Events frame
    pub fn to_sse_data(&self) -> String {
        format!("data: {}\n\n", self.to_json().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    /// Brightness changed to a new value
    DimChanged { level: u8 },

    /// Ring contents were written
    RingUpdate {
        ring: Ring,
        #[serde(flatten)]
        update: RingUpdate,
    },

    LogoChanged { on: bool },

    WhirlChanged { ring: Ring, ms: u32 },

    MorphChanged {
        ring: Ring,
        morph: Option<MorphConfig>,
    },

    /// A layer was pushed onto the effect stack
    EffectStarted {
        effect: String,
        duration_ms: u64,
        pattern: String,
        stack_depth: usize,
    },

    /// A layer was popped by an explicit stop
    EffectStopped {
        effect: String,
        manual: bool,
        stack_depth: usize,
    },

    /// A timed layer expired
    EffectCompleted { effect: String, stack_depth: usize },

    /// A lower layer is showing again after a pop
    EffectResumed { effect: String, stack_depth: usize },

    /// A query was sent to the device; `result` is `OK...` or `ERROR: ...`
    RawExecuted { query: String, result: String },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::DimChanged { .. } => "dim_changed",
            EventKind::RingUpdate { .. } => "ring_update",
            EventKind::LogoChanged { .. } => "logo_changed",
            EventKind::WhirlChanged { .. } => "whirl_changed",
            EventKind::MorphChanged { .. } => "morph_changed",
            EventKind::EffectStarted { .. } => "effect_started",
            EventKind::EffectStopped { .. } => "effect_stopped",
            EventKind::EffectCompleted { .. } => "effect_completed",
            EventKind::EffectResumed { .. } => "effect_resumed",
            EventKind::RawExecuted { .. } => "raw_executed",
        }
    }
}

/// Payload of a ring update
///
/// Carries the raw inputs that were applied, not the resulting ring, so
/// consumers replay the same rule the state store used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingUpdate {
    /// Background fill (if non-empty) then positional overlay
    Segments {
        segments: Vec<String>,
        background: String,
    },
    /// Full positional replacement
    Colors { colors: Vec<String> },
    /// Ring forced to black
    Reset,
}

impl Serialize for RingUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            RingUpdate::Segments {
                segments,
                background,
            } => {
                map.serialize_entry("segments", segments)?;
                map.serialize_entry("background", background)?;
            }
            RingUpdate::Colors { colors } => {
                map.serialize_entry("colors", colors)?;
            }
            RingUpdate::Reset => {
                map.serialize_entry("reset", &true)?;
            }
        }
        map.end()
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Cloneable handle to the event channel
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<Event>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, stamping it with the current time
    pub fn publish(&self, kind: EventKind) {
        // Err only means nobody is listening
        let _ = self.sender.send(Event::new(kind));
    }

    pub fn publish_raw_executed(&self, query: impl Into<String>, result: impl Into<String>) {
        self.publish(EventKind::RawExecuted {
            query: query.into(),
            result: result.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}
