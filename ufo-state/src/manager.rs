//! Process-wide shadow state manager
//!
//! [`StateManager`] owns the [`LedState`] and the [`EffectStack`] behind a
//! single mutex, so snapshots and query building always see a consistent
//! joint view. None of its operations fail: writes addressed to an unknown
//! ring are dropped, malformed segment tokens are skipped, and conversions
//! clamp.
//!
//! Events are published while the lock is held. Publishing is a non-blocking
//! broadcast send, so a slow subscriber never stalls a mutation and events
//! are observed in mutation order.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use ufo_codec::{
    apply_segments, convert_device_whirl_to_ms, convert_morph_from_device, is_unlit, parse_query,
    parse_segment_string, parse_segment_tokens, parse_whirl_value, MorphConfig, Ring, Segment,
    BLACK, CLEAR_QUERY, LEDS_PER_RING,
};

use crate::event::{Event, EventBroadcaster, EventKind, RingUpdate};
use crate::model::{black_ring, LedState, RingColors};
use crate::query::build_state_query;
use crate::stack::{EffectContext, EffectEntry, EffectStack, Expiry, Popped};

/// Stack depth at which a push logs a warning
pub const DEFAULT_STACK_DEPTH_WARNING: usize = 32;

#[derive(Debug, Default)]
struct Inner {
    state: LedState,
    stack: EffectStack,
}

impl Inner {
    /// Keep `state.effect` in step with the top of the stack
    fn sync_effect(&mut self) {
        self.state.effect = self.stack.current_name().to_string();
    }
}

/// Thread-safe owner of the shadow state and effect stack
#[derive(Debug)]
pub struct StateManager {
    inner: Mutex<Inner>,
    events: EventBroadcaster,
    depth_warning: usize,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(EventBroadcaster::default())
    }
}

fn resolve_ring<R>(ring: R) -> Option<Ring>
where
    R: TryInto<Ring>,
    R::Error: fmt::Display,
{
    match ring.try_into() {
        Ok(ring) => Some(ring),
        Err(e) => {
            tracing::debug!("Ignoring ring update: {}", e);
            None
        }
    }
}

/// Fill with `background` if non-empty, then overlay non-empty `colors` by position
fn overlay_ring(target: &mut RingColors, colors: &[String], background: &str) {
    if !background.is_empty() {
        for slot in target.iter_mut() {
            slot.clear();
            slot.push_str(background);
        }
    }

    for (slot, color) in target.iter_mut().zip(colors) {
        if !color.is_empty() {
            slot.clone_from(color);
        }
    }
}

impl StateManager {
    pub fn new(events: EventBroadcaster) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            events,
            depth_warning: DEFAULT_STACK_DEPTH_WARNING,
        }
    }

    /// Log a warning whenever a push brings the stack to at least `depth`
    pub fn with_stack_depth_warning(mut self, depth: usize) -> Self {
        self.depth_warning = depth;
        self
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ========================================================================
    // State Store
    // ========================================================================

    /// Deep copy of the current state
    pub fn snapshot(&self) -> LedState {
        self.inner.lock().state.clone()
    }

    /// Set brightness, publishing only when the level actually changes
    pub fn update_brightness(&self, level: u8) {
        let mut inner = self.inner.lock();
        if inner.state.brightness != level {
            inner.state.brightness = level;
            self.events.publish(EventKind::DimChanged { level });
        }
    }

    pub fn update_logo(&self, on: bool) {
        let mut inner = self.inner.lock();
        inner.state.logo_on = on;
        self.events.publish(EventKind::LogoChanged { on });
    }

    /// Set a ring's rotation period; `0` stops rotation
    pub fn update_whirl<R>(&self, ring: R, ms: u32)
    where
        R: TryInto<Ring>,
        R::Error: fmt::Display,
    {
        let Some(ring) = resolve_ring(ring) else {
            return;
        };

        let mut inner = self.inner.lock();
        *inner.state.whirl_ms_mut(ring) = ms;
        self.events.publish(EventKind::WhirlChanged { ring, ms });
    }

    /// Set or clear a ring's morph animation
    pub fn update_morph<R>(&self, ring: R, morph: Option<MorphConfig>)
    where
        R: TryInto<Ring>,
        R::Error: fmt::Display,
    {
        let Some(ring) = resolve_ring(ring) else {
            return;
        };

        let mut inner = self.inner.lock();
        *inner.state.morph_mut(ring) = morph;
        self.events.publish(EventKind::MorphChanged { ring, morph });
    }

    /// Fill a ring with `background` (when non-empty) and overlay `colors`
    ///
    /// Entries of `colors` that are empty leave the slot untouched; entries
    /// past the end of the ring are ignored. The published event carries the
    /// inputs, not the resulting ring.
    pub fn update_ring_segments<R>(&self, ring: R, colors: &[String], background: &str)
    where
        R: TryInto<Ring>,
        R::Error: fmt::Display,
    {
        let Some(ring) = resolve_ring(ring) else {
            return;
        };

        let mut inner = self.inner.lock();
        self.write_ring_segments(&mut inner.state, ring, colors, background);
    }

    fn write_ring_segments(&self, state: &mut LedState, ring: Ring, colors: &[String], background: &str) {
        overlay_ring(state.ring_mut(ring), colors, background);
        self.events.publish(EventKind::RingUpdate {
            ring,
            update: RingUpdate::Segments {
                segments: colors.to_vec(),
                background: background.to_string(),
            },
        });
    }

    /// Replace a whole ring by position
    ///
    /// Empty entries and positions past the end of `colors` become black.
    pub fn update_ring_colors<R>(&self, ring: R, colors: &[String])
    where
        R: TryInto<Ring>,
        R::Error: fmt::Display,
    {
        let Some(ring) = resolve_ring(ring) else {
            return;
        };

        let mut inner = self.inner.lock();
        let target = inner.state.ring_mut(ring);
        for (i, slot) in target.iter_mut().enumerate() {
            *slot = match colors.get(i) {
                Some(color) if !color.is_empty() => color.clone(),
                _ => BLACK.to_string(),
            };
        }

        self.events.publish(EventKind::RingUpdate {
            ring,
            update: RingUpdate::Colors {
                colors: colors.to_vec(),
            },
        });
    }

    /// Decode `start|count|COLOR` tokens over a background and apply them
    ///
    /// Malformed tokens are skipped; the rest still apply.
    pub fn apply_ring_segments<R, S>(&self, ring: R, tokens: &[S], background: &str)
    where
        R: TryInto<Ring>,
        R::Error: fmt::Display,
        S: AsRef<str>,
    {
        let Some(ring) = resolve_ring(ring) else {
            return;
        };

        let colors = decode_ring(&parse_segment_tokens(tokens), background);
        let mut inner = self.inner.lock();
        self.write_ring_segments(&mut inner.state, ring, &colors, background);
    }

    /// Mirror a device ring command into the shadow
    ///
    /// Understands `{ring}_init`, `{ring}` (segments), `{ring}_bg`,
    /// `{ring}_whirl` (device value, optional `|ccw`) and `{ring}_morph`
    /// (`ticks|speed`). An init stops whirl and morph unless the same query
    /// sets them again. Keys for the other ring and unrecognised keys are
    /// ignored, as are whirl and morph values that do not parse.
    pub fn apply_ring_command<R>(&self, ring: R, query: &str)
    where
        R: TryInto<Ring>,
        R::Error: fmt::Display,
    {
        let Some(ring) = resolve_ring(ring) else {
            return;
        };

        let pairs = parse_query(query);
        let mut inner = self.inner.lock();
        self.mirror_ring(&mut inner.state, ring, &pairs);
    }

    /// Mirror a full device query (brightness, both rings and logo)
    ///
    /// Applied under one lock, so snapshots never see half of it. Keys the
    /// shadow has no field for, such as `effect=rainbow`, are ignored.
    pub fn apply_query(&self, query: &str) {
        let pairs = parse_query(query);
        let mut inner = self.inner.lock();

        for (key, value) in &pairs {
            match *key {
                "dim" => match value.parse::<u8>() {
                    Ok(level) if inner.state.brightness != level => {
                        inner.state.brightness = level;
                        self.events.publish(EventKind::DimChanged { level });
                    }
                    Ok(_) => {}
                    Err(_) => tracing::debug!("Ignoring unparseable dim value '{}'", value),
                },
                "logo" => {
                    let on = logo_is_on(value);
                    inner.state.logo_on = on;
                    self.events.publish(EventKind::LogoChanged { on });
                }
                _ => {}
            }
        }

        for ring in Ring::ALL {
            self.mirror_ring(&mut inner.state, ring, &pairs);
        }
    }

    fn mirror_ring(&self, state: &mut LedState, ring: Ring, pairs: &[(&str, &str)]) {
        let (init_key, bg_key, whirl_key, morph_key) = (
            ring.key("init"),
            ring.key("bg"),
            ring.key("whirl"),
            ring.key("morph"),
        );

        let mut touched = false;
        let mut segments = Vec::new();
        let mut background = String::new();
        let mut whirl = None;
        let mut morph = None;

        for &(key, value) in pairs {
            if key == init_key {
                touched = true;
                whirl.get_or_insert(0);
                morph.get_or_insert(None);
            } else if key == ring.as_str() {
                touched = true;
                segments.extend(parse_segment_string(value));
            } else if key == bg_key {
                touched = true;
                background = value.to_string();
            } else if key == whirl_key {
                match parse_whirl_value(value) {
                    Some((device, _ccw)) => whirl = Some(convert_device_whirl_to_ms(device)),
                    None => tracing::debug!("Ignoring unparseable whirl value '{}'", value),
                }
            } else if key == morph_key {
                match convert_morph_from_device(value) {
                    Some(config) => morph = Some(Some(config)),
                    None => tracing::debug!("Ignoring unparseable morph value '{}'", value),
                }
            }
        }

        if touched {
            let colors = decode_ring(&segments, &background);
            self.write_ring_segments(state, ring, &colors, &background);
        }
        if let Some(ms) = whirl {
            *state.whirl_ms_mut(ring) = ms;
            self.events.publish(EventKind::WhirlChanged { ring, ms });
        }
        if let Some(morph) = morph {
            *state.morph_mut(ring) = morph;
            self.events.publish(EventKind::MorphChanged { ring, morph });
        }
    }

    /// Black out both rings, turn the logo off and clear the effect name
    ///
    /// Brightness, whirl and morph settings are kept.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state.top = black_ring();
        inner.state.bottom = black_ring();
        inner.state.logo_on = false;
        inner.state.effect.clear();

        for ring in Ring::ALL {
            self.events.publish(EventKind::RingUpdate {
                ring,
                update: RingUpdate::Reset,
            });
        }
    }

    /// Mirror a device clear
    ///
    /// Resets the display, then applies the clear query so the ring inits
    /// also stop whirl and morph.
    pub fn mirror_clear(&self) {
        self.reset();
        self.apply_query(CLEAR_QUERY);
    }

    /// Overwrite the effect name without touching the stack
    pub fn set_active_effect(&self, name: impl Into<String>) {
        self.inner.lock().state.effect = name.into();
    }

    pub fn clear_effect(&self) {
        self.inner.lock().state.effect.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.inner.lock().state)
    }

    /// Device query reproducing the current shadow state
    pub fn build_state_query(&self) -> String {
        build_state_query(&self.inner.lock().state)
    }

    // ========================================================================
    // Effect Stack
    // ========================================================================

    /// Push a layer, make it the current effect and return its generation
    pub fn push_effect(
        &self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        context: EffectContext,
    ) -> u64 {
        let mut inner = self.inner.lock();
        let generation = inner.stack.push(name.into(), pattern.into(), context);
        inner.sync_effect();

        let depth = inner.stack.depth();
        tracing::debug!(
            "Pushed effect '{}' (generation {}, depth {})",
            inner.state.effect,
            generation,
            depth
        );
        if depth >= self.depth_warning {
            tracing::warn!(
                "Effect stack depth is {}; pushes are not being matched by pops",
                depth
            );
        }

        generation
    }

    /// Remove the top layer and return the entry to restore
    ///
    /// `None` means nothing is left to restore and the device should be
    /// cleared. See [`EffectStack::pop`].
    pub fn pop_effect(&self) -> Option<EffectEntry> {
        let mut inner = self.inner.lock();
        let restored = inner.stack.pop();
        inner.sync_effect();

        tracing::debug!(
            "Popped effect, depth {} (restoring {:?})",
            inner.stack.depth(),
            restored.as_ref().map(|e| e.name.as_str())
        );
        restored
    }

    /// Remove the top layer, reporting both it and the entry to restore
    ///
    /// `None` when the stack was already empty.
    pub fn take_effect(&self) -> Option<Popped> {
        let mut inner = self.inner.lock();
        let popped = inner.stack.pop_layer()?;
        inner.sync_effect();

        tracing::debug!(
            "Removed effect '{}', depth {}",
            popped.removed.name,
            inner.stack.depth()
        );
        Some(popped)
    }

    /// Pop only if the top layer still carries `generation`
    ///
    /// Used by timers so that an expiry scheduled for a layer that was
    /// already stopped cannot remove an unrelated layer.
    pub fn expire_effect(&self, generation: u64) -> Expiry {
        let mut inner = self.inner.lock();
        let expiry = inner.stack.expire(generation);
        if expiry == Expiry::Stale {
            tracing::debug!("Expiry for generation {} is stale", generation);
        } else {
            inner.sync_effect();
        }
        expiry
    }

    pub fn current_effect(&self) -> Option<EffectEntry> {
        self.inner.lock().stack.peek().cloned()
    }

    pub fn effect_stack_depth(&self) -> usize {
        self.inner.lock().stack.depth()
    }

    /// Set the pattern restored after the last layer pops; empty disables it
    pub fn set_base_state(&self, pattern: impl Into<String>) {
        self.inner.lock().stack.set_base_state(pattern.into());
    }

    pub fn base_state(&self) -> String {
        self.inner.lock().stack.base_state().to_string()
    }
}

/// `on`, or any pattern with a lit segment, means the logo is on
fn logo_is_on(value: &str) -> bool {
    match value {
        "on" => true,
        "off" => false,
        pattern => pattern.split('|').any(|color| !is_unlit(color)),
    }
}

fn decode_ring(segments: &[Segment], background: &str) -> Vec<String> {
    let fill = if background.is_empty() { BLACK } else { background };
    let mut colors = vec![fill.to_string(); LEDS_PER_RING];
    apply_segments(&mut colors, segments);
    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use proptest::prelude::*;
    use ufo_codec::is_valid_hex_color;

    use crate::stack::{BASE_STATE_NAME, CONFIG_EFFECT_NAME};

    fn strings(colors: &[&str]) -> Vec<String> {
        colors.iter().map(|c| c.to_string()).collect()
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event.kind);
        }
        events
    }

    #[test]
    fn test_repeated_brightness_publishes_once() {
        let manager = StateManager::default();
        let mut rx = manager.subscribe();

        manager.update_brightness(128);
        manager.update_brightness(128);

        assert_eq!(drain(&mut rx), vec![EventKind::DimChanged { level: 128 }]);
        assert_eq!(manager.snapshot().brightness, 128);
    }

    #[test]
    fn test_unchanged_brightness_is_silent() {
        let manager = StateManager::default();
        let mut rx = manager.subscribe();
        manager.update_brightness(255);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_ring_segments_background_then_overlay() {
        let manager = StateManager::default();
        let mut rx = manager.subscribe();

        manager.update_ring_segments(Ring::Top, &strings(&["FF0000", "", "00FF00"]), "202020");

        let state = manager.snapshot();
        assert_eq!(state.top[0], "FF0000");
        assert_eq!(state.top[1], "202020");
        assert_eq!(state.top[2], "00FF00");
        assert!(state.top[3..].iter().all(|c| c == "202020"));
        assert!(state.bottom.iter().all(|c| c == BLACK));

        assert_eq!(
            drain(&mut rx),
            vec![EventKind::RingUpdate {
                ring: Ring::Top,
                update: RingUpdate::Segments {
                    segments: strings(&["FF0000", "", "00FF00"]),
                    background: "202020".to_string(),
                },
            }]
        );
    }

    #[test]
    fn test_ring_segments_without_background_keeps_existing() {
        let manager = StateManager::default();
        manager.update_ring_segments("bottom", &strings(&["AAAAAA"; 15]), "");
        manager.update_ring_segments("bottom", &strings(&["", "BBBBBB"]), "");

        let state = manager.snapshot();
        assert_eq!(state.bottom[0], "AAAAAA");
        assert_eq!(state.bottom[1], "BBBBBB");
        assert_eq!(state.bottom[14], "AAAAAA");
    }

    #[test]
    fn test_unknown_ring_is_ignored() {
        let manager = StateManager::default();
        let mut rx = manager.subscribe();
        let before = manager.snapshot();

        manager.update_ring_segments("middle", &strings(&["FF0000"]), "FFFFFF");
        manager.update_whirl("left", 1000);
        manager.update_morph("", Some(MorphConfig::new(1000, 500)));
        manager.update_ring_colors(&"TOP".to_string(), &strings(&["FF0000"]));

        assert_eq!(manager.snapshot(), before);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_update_ring_colors_pads_with_black() {
        let manager = StateManager::default();
        manager.update_ring_segments(Ring::Top, &[], "FFFFFF");
        manager.update_ring_colors(Ring::Top, &strings(&["FF0000", "", "00FF00"]));

        let top = manager.snapshot().top;
        assert_eq!(top[0], "FF0000");
        assert_eq!(top[1], BLACK);
        assert_eq!(top[2], "00FF00");
        assert!(top[3..].iter().all(|c| c == BLACK));
    }

    #[test]
    fn test_apply_ring_segments_skips_malformed_tokens() {
        let manager = StateManager::default();
        manager.apply_ring_segments(Ring::Top, &["0|3|FF0000", "bogus", "12|10|0000FF"], "");

        let top = manager.snapshot().top;
        assert!(top[..3].iter().all(|c| c == "FF0000"));
        assert!(top[3..12].iter().all(|c| c == BLACK));
        assert!(top[12..].iter().all(|c| c == "0000FF"));
    }

    #[test]
    fn test_apply_ring_command() {
        let manager = StateManager::default();
        manager.apply_ring_command(
            "bottom",
            "bottom_init=1&bottom=0|5|FF0000|10|3|00FF00&bottom_bg=202020&bottom_whirl=189|ccw&bottom_morph=150|10&top=0|15|FFFFFF",
        );

        let state = manager.snapshot();
        assert!(state.bottom[..5].iter().all(|c| c == "FF0000"));
        assert!(state.bottom[5..10].iter().all(|c| c == "202020"));
        assert!(state.bottom[10..13].iter().all(|c| c == "00FF00"));
        assert!(state.bottom[13..].iter().all(|c| c == "202020"));
        assert_eq!(state.bottom_whirl_ms, 1005);
        assert_eq!(state.bottom_morph, Some(MorphConfig::new(1000, 333)));
        assert!(state.top.iter().all(|c| c == BLACK));
    }

    #[test]
    fn test_apply_ring_command_ignores_bad_animation_values() {
        let manager = StateManager::default();
        manager.update_whirl(Ring::Top, 3000);
        manager.apply_ring_command(Ring::Top, "top_whirl=fast&top_morph=1000|500");

        let state = manager.snapshot();
        assert_eq!(state.top_whirl_ms, 3000);
        assert_eq!(state.top_morph, None);
    }

    #[test]
    fn test_ring_init_stops_animation() {
        let manager = StateManager::default();
        manager.update_whirl(Ring::Top, 3000);
        manager.update_morph(Ring::Top, Some(MorphConfig::new(1000, 500)));
        manager.update_whirl(Ring::Bottom, 3000);

        manager.apply_ring_command(Ring::Top, "top_init=1&top=0|15|FF0000");

        let state = manager.snapshot();
        assert_eq!(state.top_whirl_ms, 0);
        assert_eq!(state.top_morph, None);
        assert_eq!(state.bottom_whirl_ms, 3000);
    }

    #[test]
    fn test_mirror_clear_stops_animation() {
        let manager = StateManager::default();
        manager.update_brightness(90);
        manager.apply_ring_command(Ring::Top, "top_init=1&top=0|15|FF0000&top_whirl=189");
        manager.update_morph(Ring::Bottom, Some(MorphConfig::new(1000, 500)));
        manager.set_active_effect("red");

        manager.mirror_clear();

        let state = manager.snapshot();
        assert!(state.top.iter().all(|c| c == BLACK));
        assert_eq!(state.top_whirl_ms, 0);
        assert_eq!(state.bottom_morph, None);
        assert!(!state.logo_on);
        assert_eq!(state.effect, "");
        assert_eq!(state.brightness, 90);
        assert_eq!(
            manager.build_state_query(),
            "dim=90&top_init=1&bottom_init=1&logo=off"
        );
    }

    #[test]
    fn test_apply_query_mirrors_every_field() {
        let manager = StateManager::default();
        manager.apply_query(
            "dim=80&top_init=1&top=0|15|FF0000&top_whirl=189&bottom_init=1&bottom_bg=0000FF&logo=on",
        );

        let state = manager.snapshot();
        assert_eq!(state.brightness, 80);
        assert!(state.top.iter().all(|c| c == "FF0000"));
        assert_eq!(state.top_whirl_ms, 1005);
        assert!(state.bottom.iter().all(|c| c == "0000FF"));
        assert!(state.logo_on);
    }

    #[test]
    fn test_apply_query_round_trips_state_query() {
        let source = StateManager::default();
        source.update_brightness(90);
        source.update_ring_segments(Ring::Top, &strings(&["FF0000", "", "00FF00"]), "101010");
        source.update_whirl(Ring::Bottom, 1005);
        source.update_logo(true);

        let mirror = StateManager::default();
        mirror.update_ring_segments(Ring::Bottom, &[], "FFFFFF");
        mirror.apply_query(&source.build_state_query());

        assert_eq!(mirror.snapshot(), source.snapshot());
    }

    #[rstest::rstest]
    #[case("on", true)]
    #[case("off", false)]
    #[case("000000|000000|000000|000000", false)]
    #[case("FF0000|000000|FF0000|000000", true)]
    fn test_apply_query_logo(#[case] value: &str, #[case] on: bool) {
        let manager = StateManager::default();
        manager.update_logo(!on);
        manager.apply_query(&format!("logo={}", value));
        assert_eq!(manager.snapshot().logo_on, on);
    }

    #[test]
    fn test_apply_query_ignores_unknown_keys() {
        let manager = StateManager::default();
        let before = manager.snapshot();
        manager.apply_query("effect=rainbow&dim=loud");
        assert_eq!(manager.snapshot(), before);
    }

    #[test]
    fn test_reset_keeps_brightness() {
        let manager = StateManager::default();
        manager.update_brightness(42);
        manager.update_logo(true);
        manager.update_ring_segments(Ring::Top, &[], "FF0000");
        manager.push_effect("rainbow", "top=0|15|FF0000", EffectContext::perpetual());
        let mut rx = manager.subscribe();

        manager.reset();

        let state = manager.snapshot();
        assert_eq!(state, LedState {
            brightness: 42,
            ..LedState::default()
        });
        assert_eq!(
            drain(&mut rx),
            vec![
                EventKind::RingUpdate { ring: Ring::Top, update: RingUpdate::Reset },
                EventKind::RingUpdate { ring: Ring::Bottom, update: RingUpdate::Reset },
            ]
        );
    }

    #[test]
    fn test_to_json() {
        let manager = StateManager::default();
        manager.update_logo(true);
        manager.set_active_effect("pulse");

        let value: serde_json::Value = serde_json::from_str(&manager.to_json().unwrap()).unwrap();
        assert_eq!(value["logoOn"], true);
        assert_eq!(value["effect"], "pulse");
        assert_eq!(value["dim"], 255);

        manager.clear_effect();
        assert_eq!(manager.snapshot().effect, "");
    }

    #[test]
    fn test_same_inputs_same_query() {
        let build = || {
            let manager = StateManager::default();
            manager.update_ring_segments(Ring::Top, &strings(&["FF0000", "FF0000", "00FF00"]), "");
            manager.update_ring_segments(Ring::Bottom, &[], "0000FF");
            manager.update_whirl(Ring::Bottom, 1000);
            manager.build_state_query()
        };

        let query = build();
        assert_eq!(query, build());
        assert_eq!(
            query,
            "dim=255&top_init=1&top=0|2|FF0000|2|1|00FF00&bottom_init=1&bottom=0|15|0000FF&bottom_whirl=189&logo=off"
        );
    }

    #[test]
    fn test_push_sets_current_effect() {
        let manager = StateManager::default();
        manager.push_effect("rainbow", "p1", EffectContext::perpetual());

        assert_eq!(manager.snapshot().effect, "rainbow");
        assert_eq!(manager.effect_stack_depth(), 1);
        assert_eq!(manager.current_effect().map(|e| e.pattern), Some("p1".to_string()));
    }

    #[test]
    fn test_layered_unwind_through_synthetic_layers() {
        let manager = StateManager::default();
        manager.push_effect("X", "patternX", EffectContext::perpetual());
        manager.push_effect(CONFIG_EFFECT_NAME, "patternY", EffectContext::default().synthetic());
        manager.push_effect(CONFIG_EFFECT_NAME, "patternZ", EffectContext::default().synthetic());
        manager.push_effect("A", "patternA", EffectContext::timed(5000));
        assert_eq!(manager.effect_stack_depth(), 4);

        assert_eq!(manager.pop_effect().unwrap().pattern, "patternZ");
        assert_eq!(manager.snapshot().effect, CONFIG_EFFECT_NAME);
        assert_eq!(manager.pop_effect().unwrap().pattern, "patternY");
        assert_eq!(manager.pop_effect().unwrap().name, "X");
        assert_eq!(manager.snapshot().effect, "X");
        assert_eq!(manager.effect_stack_depth(), 1);
    }

    #[test]
    fn test_pop_last_without_base_state() {
        let manager = StateManager::default();
        manager.push_effect("X", "patternX", EffectContext::perpetual());

        assert_eq!(manager.pop_effect(), None);
        assert_eq!(manager.snapshot().effect, "");
        assert_eq!(manager.pop_effect(), None);
    }

    #[test]
    fn test_pop_last_with_base_state() {
        let manager = StateManager::default();
        manager.set_base_state("dim=50&logo=on");
        assert_eq!(manager.base_state(), "dim=50&logo=on");
        manager.push_effect("X", "patternX", EffectContext::perpetual());

        let entry = manager.pop_effect().unwrap();
        assert_eq!(entry.name, BASE_STATE_NAME);
        assert_eq!(entry.pattern, "dim=50&logo=on");
        assert!(entry.context.synthetic && entry.context.is_base);
        assert_eq!(manager.snapshot().effect, "");
    }

    #[test]
    fn test_take_effect_reports_removed_layer() {
        let manager = StateManager::default();
        assert_eq!(manager.take_effect(), None);

        manager.push_effect("X", "patternX", EffectContext::perpetual());
        manager.push_effect("A", "patternA", EffectContext::timed(1000));

        let popped = manager.take_effect().unwrap();
        assert_eq!(popped.removed.name, "A");
        assert_eq!(popped.restore.unwrap().pattern, "patternX");
        assert_eq!(manager.snapshot().effect, "X");
    }

    #[test]
    fn test_stale_expiry_leaves_stack_alone() {
        let manager = StateManager::default();
        manager.push_effect("X", "patternX", EffectContext::perpetual());
        let timed = manager.push_effect("A", "patternA", EffectContext::timed(5000));

        manager.pop_effect();
        manager.push_effect("B", "patternB", EffectContext::perpetual());

        assert_eq!(manager.expire_effect(timed), Expiry::Stale);
        assert_eq!(manager.effect_stack_depth(), 2);
        assert_eq!(manager.snapshot().effect, "B");
    }

    #[test]
    fn test_matching_expiry_restores() {
        let manager = StateManager::default();
        manager.push_effect("X", "patternX", EffectContext::perpetual());
        let timed = manager.push_effect("A", "patternA", EffectContext::timed(5000));

        match manager.expire_effect(timed) {
            Expiry::Restore(entry) => assert_eq!(entry.pattern, "patternX"),
            other => panic!("unexpected expiry {:?}", other),
        }
        assert_eq!(manager.snapshot().effect, "X");
    }

    #[test]
    fn test_deep_stack_still_pushes() {
        let manager = StateManager::default().with_stack_depth_warning(2);
        for i in 0..5 {
            manager.push_effect(format!("e{}", i), "", EffectContext::perpetual());
        }
        assert_eq!(manager.effect_stack_depth(), 5);
    }

    #[test]
    fn test_concurrent_writers_keep_state_consistent() {
        let manager = Arc::new(StateManager::default());
        let colors = ["FF0000", "00FF00", "0000FF", "FFFFFF"];

        let handles: Vec<_> = colors
            .iter()
            .enumerate()
            .map(|(i, color)| {
                let manager = Arc::clone(&manager);
                let color = color.to_string();
                thread::spawn(move || {
                    for n in 0..200 {
                        let ring = if n % 2 == 0 { Ring::Top } else { Ring::Bottom };
                        manager.update_ring_segments(ring, &vec![String::new(); 3], &color);
                        manager.push_effect(format!("t{}", i), color.clone(), EffectContext::perpetual());
                        manager.pop_effect();
                        let state = manager.snapshot();
                        // a background fill is atomic, so a ring never mixes colors
                        assert!(state.top.iter().all(|c| c == &state.top[0]));
                        assert!(state.bottom.iter().all(|c| c == &state.bottom[0]));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.effect_stack_depth(), 0);
        assert_eq!(manager.snapshot().effect, "");
    }

    proptest! {
        #[test]
        fn prop_rings_always_hold_fifteen_valid_colors(
            updates in proptest::collection::vec(
                (
                    any::<bool>(),
                    proptest::collection::vec(
                        prop_oneof![Just(String::new()), "[0-9A-F]{6}"],
                        0..20,
                    ),
                    prop_oneof![Just(String::new()), "[0-9A-F]{6}"],
                ),
                0..10,
            )
        ) {
            let manager = StateManager::default();
            for (top, colors, background) in &updates {
                let ring = if *top { Ring::Top } else { Ring::Bottom };
                manager.update_ring_segments(ring, colors, background);
            }

            let state = manager.snapshot();
            for ring in [&state.top, &state.bottom] {
                prop_assert_eq!(ring.len(), LEDS_PER_RING);
                prop_assert!(ring.iter().all(|c| is_valid_hex_color(c)));
            }
        }
    }
}
