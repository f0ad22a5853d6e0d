//! Ring identifiers and color helpers
//!
//! The UFO has two independent rings of [`LEDS_PER_RING`] addressable LEDs.
//! Colors travel as 6-digit RGB hex strings with no leading `#`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of addressable LEDs on each ring
pub const LEDS_PER_RING: usize = 15;

/// The all-zero color used for unlit LEDs
pub const BLACK: &str = "000000";

/// One of the two LED rings on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ring {
    Top,
    Bottom,
}

impl Ring {
    /// Both rings in wire order (top first)
    pub const ALL: [Ring; 2] = [Ring::Top, Ring::Bottom];

    /// Wire name of the ring, also used as the query key prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Ring::Top => "top",
            Ring::Bottom => "bottom",
        }
    }

    /// Query key for a ring parameter, e.g. `top_whirl`
    ///
    /// An empty suffix yields the bare ring key used for segments.
    pub fn key(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}_{}", self.as_str(), suffix)
        }
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a ring
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ring '{0}', expected 'top' or 'bottom'")]
pub struct RingParseError(pub String);

impl FromStr for Ring {
    type Err = RingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Ring::Top),
            "bottom" => Ok(Ring::Bottom),
            other => Err(RingParseError(other.to_string())),
        }
    }
}

impl TryFrom<&str> for Ring {
    type Error = RingParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<&String> for Ring {
    type Error = RingParseError;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Check that a color is exactly six hex digits
pub fn is_valid_hex_color(color: &str) -> bool {
    color.len() == 6 && color.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Whether a ring slot counts as unlit (empty or black)
pub fn is_unlit(color: &str) -> bool {
    color.is_empty() || color == BLACK
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_ring_names_round_trip() {
        for ring in Ring::ALL {
            assert_eq!(ring.as_str().parse::<Ring>(), Ok(ring));
        }
    }

    #[test]
    fn test_unknown_ring_is_rejected() {
        let err = "middle".parse::<Ring>().unwrap_err();
        assert_eq!(err, RingParseError("middle".to_string()));
        assert!(Ring::try_from("Top").is_err());
    }

    #[test]
    fn test_ring_keys() {
        assert_eq!(Ring::Top.key("whirl"), "top_whirl");
        assert_eq!(Ring::Bottom.key("init"), "bottom_init");
        assert_eq!(Ring::Bottom.key(""), "bottom");
    }

    #[rstest]
    #[case("FF0000", true)]
    #[case("00ff7a", true)]
    #[case("000000", true)]
    #[case("FF000", false)]
    #[case("FF00000", false)]
    #[case("GG0000", false)]
    #[case("#F0000", false)]
    #[case("", false)]
    fn test_hex_color_validation(#[case] color: &str, #[case] valid: bool) {
        assert_eq!(is_valid_hex_color(color), valid);
    }
}
