//! Serialize the shadow state into a single device query
//!
//! Field order is fixed so output can be compared against golden strings:
//! `dim`, then for top and bottom in turn `{ring}_init=1`, segments, whirl,
//! morph, and finally `logo`.

use ufo_codec::{convert_whirl_to_device, encode_segments, Ring};

use crate::model::LedState;

/// Build the query that makes the device match `state` exactly
pub fn build_state_query(state: &LedState) -> String {
    let mut parts = vec![format!("dim={}", state.brightness)];

    for ring in Ring::ALL {
        parts.push(format!("{}=1", ring.key("init")));

        let segments = encode_segments(state.ring(ring));
        if !segments.is_empty() {
            parts.push(format!("{}={}", ring.key(""), segments));
        }

        let whirl_ms = state.whirl_ms(ring);
        if whirl_ms > 0 {
            parts.push(format!("{}={}", ring.key("whirl"), convert_whirl_to_device(whirl_ms)));
        }

        if let Some(morph) = state.morph(ring) {
            parts.push(format!("{}={}", ring.key("morph"), morph.to_device()));
        }
    }

    parts.push(format!("logo={}", if state.logo_on { "on" } else { "off" }));
    parts.join("&")
}
