//! Unit conversions between human time units and device encodings
//!
//! The device speaks in ticks and small integer speeds. Both conversions are
//! lossy and clamp instead of failing; range checks that matter to a human
//! belong to the caller.
//!
//! - **Morph**: `ticks = round(brightnessMs / 6.67)`,
//!   `speed = clamp(round(3333 / fadeMs), 1, 10)`
//! - **Whirl**: `device = clamp(round(256 - rotationMs / 15), 1, 510)`,
//!   with `0` meaning "no rotation"

use serde::{Deserialize, Serialize};

use crate::ring::LEDS_PER_RING;

/// Milliseconds per device morph tick (~150 ticks per second)
pub const MS_PER_TICK: f64 = 6.67;

/// Fade duration at speed 1 (200 frames at 60 fps)
pub const FADE_BASE_MS: f64 = 3333.0;

/// Slowest morph fade speed
pub const MIN_FADE_SPEED: u32 = 1;

/// Fastest morph fade speed
pub const MAX_FADE_SPEED: u32 = 10;

/// Whirl values are expressed relative to this ceiling
const WHIRL_BASE: f64 = 256.0;

/// Largest whirl value accepted by extended firmware
pub const MAX_WHIRL_DEVICE: u16 = 510;

/// Pulse animation settings in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MorphConfig {
    /// Time spent at full brightness
    pub brightness_ms: u32,
    /// Duration of the fade transition
    pub fade_ms: u32,
}

impl MorphConfig {
    pub fn new(brightness_ms: u32, fade_ms: u32) -> Self {
        Self {
            brightness_ms,
            fade_ms,
        }
    }

    /// Device `(ticks, speed)` pair for this config
    pub fn device_params(&self) -> (u32, u32) {
        let ticks = (f64::from(self.brightness_ms) / MS_PER_TICK).round() as u32;
        // fade_ms == 0 divides to +inf, which clamps to the fastest speed
        let speed = (FADE_BASE_MS / f64::from(self.fade_ms))
            .round()
            .clamp(f64::from(MIN_FADE_SPEED), f64::from(MAX_FADE_SPEED)) as u32;
        (ticks, speed)
    }

    /// Device morph value, `ticks|speed`
    pub fn to_device(&self) -> String {
        let (ticks, speed) = self.device_params();
        format!("{}|{}", ticks, speed)
    }
}

/// Convert a morph config to its device value
///
/// An absent config converts to an empty string.
pub fn convert_morph_to_device(config: Option<&MorphConfig>) -> String {
    config.map(MorphConfig::to_device).unwrap_or_default()
}

/// Convert a device morph value (`ticks|speed`) back to milliseconds
///
/// Returns `None` for an empty string, a malformed value, or a speed
/// outside `1..=10`.
pub fn convert_morph_from_device(spec: &str) -> Option<MorphConfig> {
    if spec.is_empty() {
        return None;
    }

    let mut parts = spec.split('|');
    let ticks = parts.next()?.trim().parse::<u32>().ok()?;
    let speed = parts.next()?.trim().parse::<u32>().ok()?;
    if parts.next().is_some() || !(MIN_FADE_SPEED..=MAX_FADE_SPEED).contains(&speed) {
        return None;
    }

    Some(MorphConfig {
        brightness_ms: (f64::from(ticks) * MS_PER_TICK) as u32,
        fade_ms: (FADE_BASE_MS / f64::from(speed)) as u32,
    })
}

/// Convert a full-rotation period to the device whirl value
///
/// `0` means no rotation and maps to `0`. Anything else maps to
/// `round(256 - rotation_ms / 15)` clamped to `1..=510`.
pub fn convert_whirl_to_device(rotation_ms: u32) -> u16 {
    if rotation_ms == 0 {
        return 0;
    }

    let step_delay_ms = f64::from(rotation_ms) / LEDS_PER_RING as f64;
    (WHIRL_BASE - step_delay_ms)
        .round()
        .clamp(1.0, f64::from(MAX_WHIRL_DEVICE)) as u16
}

/// Convert a device whirl value back to a full-rotation period
///
/// Values above 255 all map to the minimum step delay of 1 ms.
pub fn convert_device_whirl_to_ms(value: u16) -> u32 {
    if value == 0 {
        return 0;
    }

    let step_delay_ms = (WHIRL_BASE as i32 - i32::from(value)).max(1) as u32;
    step_delay_ms * LEDS_PER_RING as u32
}
