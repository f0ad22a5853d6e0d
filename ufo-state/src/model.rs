//! Shadow state model

use serde::{Deserialize, Serialize};

use ufo_codec::{MorphConfig, Ring, BLACK, LEDS_PER_RING};

/// Colors of one ring, indexed by physical LED position
pub type RingColors = [String; LEDS_PER_RING];

/// Full brightness, the level the device boots with
pub const MAX_BRIGHTNESS: u8 = 255;

/// A ring with every LED unlit
pub fn black_ring() -> RingColors {
    std::array::from_fn(|_| BLACK.to_string())
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// What the device is believed to be displaying
///
/// The device cannot be queried, so this record is the only source of truth
/// about its current display. Serializes with camelCase keys and the
/// brightness under `dim`, matching the device parameter name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedState {
    pub top: RingColors,
    pub bottom: RingColors,
    pub logo_on: bool,
    /// Name of the topmost effect layer, empty when none
    pub effect: String,
    #[serde(rename = "dim")]
    pub brightness: u8,
    /// Full rotation period, `0` when not rotating
    #[serde(default, skip_serializing_if = "is_zero")]
    pub top_whirl_ms: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bottom_whirl_ms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_morph: Option<MorphConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_morph: Option<MorphConfig>,
}

impl Default for LedState {
    fn default() -> Self {
        Self {
            top: black_ring(),
            bottom: black_ring(),
            logo_on: false,
            effect: String::new(),
            brightness: MAX_BRIGHTNESS,
            top_whirl_ms: 0,
            bottom_whirl_ms: 0,
            top_morph: None,
            bottom_morph: None,
        }
    }
}

impl LedState {
    pub fn ring(&self, ring: Ring) -> &RingColors {
        match ring {
            Ring::Top => &self.top,
            Ring::Bottom => &self.bottom,
        }
    }

    pub fn ring_mut(&mut self, ring: Ring) -> &mut RingColors {
        match ring {
            Ring::Top => &mut self.top,
            Ring::Bottom => &mut self.bottom,
        }
    }

    pub fn whirl_ms(&self, ring: Ring) -> u32 {
        match ring {
            Ring::Top => self.top_whirl_ms,
            Ring::Bottom => self.bottom_whirl_ms,
        }
    }

    pub fn whirl_ms_mut(&mut self, ring: Ring) -> &mut u32 {
        match ring {
            Ring::Top => &mut self.top_whirl_ms,
            Ring::Bottom => &mut self.bottom_whirl_ms,
        }
    }

    pub fn morph(&self, ring: Ring) -> Option<&MorphConfig> {
        match ring {
            Ring::Top => self.top_morph.as_ref(),
            Ring::Bottom => self.bottom_morph.as_ref(),
        }
    }

    pub fn morph_mut(&mut self, ring: Ring) -> &mut Option<MorphConfig> {
        match ring {
            Ring::Top => &mut self.top_morph,
            Ring::Bottom => &mut self.bottom_morph,
        }
    }
}
