//! Typed tool requests
//!
//! Each request deserializes from the camelCase JSON arguments a tool call
//! carries and is validated before anything reaches the device or the
//! shadow state. Fields are optional at the serde level so that a missing
//! argument produces the same user-facing message as an invalid one.

use serde::Deserialize;

use ufo_codec::{is_valid_hex_color, MorphConfig, Ring, RingCommand, MAX_WHIRL_DEVICE};
use ufo_effects::{validate_name, Effect};

use crate::error::{Result, SdkError};

/// Longest duration a caller may request for an effect
pub const MAX_EFFECT_DURATION_MS: i64 = 3_600_000;

/// Longest duration accepted when adding an effect, in seconds
pub const MAX_NEW_EFFECT_DURATION_SECS: i64 = 3600;

/// Configuration durations below this are read as seconds
pub const SECONDS_THRESHOLD: i64 = 50;

const MIN_FADE_MS: i64 = 100;
const MAX_FADE_MS: i64 = 10_000;

/// Logo value that turns every logo LED off
pub const LOGO_OFF_PATTERN: &str = "000000|000000|000000|000000";

/// Substrings rejected in raw queries, matched case-insensitively
const SUSPICIOUS_PATTERNS: [&str; 10] = [
    "<script",
    "</script",
    "javascript:",
    "data:",
    "vbscript:",
    "../",
    "..\\",
    "file://",
    "ftp://",
    "\0",
];

fn require_name(name: &Option<String>) -> Result<&str> {
    match name.as_deref() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(SdkError::validation(
            "'name' parameter is required and must be a non-empty string",
        )),
    }
}

/// Brightness levels span the full `u8` range
fn device_brightness(level: i64, message: &str) -> Result<u8> {
    u8::try_from(level).map_err(|_| SdkError::validation(message))
}

/// `INDEX|COUNT|RRGGBB`; only the shape and color are checked here
pub fn is_valid_segment_format(segment: &str) -> bool {
    let parts: Vec<&str> = segment.split('|').collect();
    parts.len() == 3 && is_valid_hex_color(parts[2])
}

fn is_valid_morph_spec(spec: &str) -> bool {
    spec.split('|').count() == 2
}

/// True when `query` contains a substring commonly used for injection
pub fn is_suspicious_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    SUSPICIOUS_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

// ============================================================================
// Display requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBrightness {
    #[serde(default)]
    pub level: Option<i64>,
}

impl SetBrightness {
    pub fn new(level: i64) -> Self {
        Self { level: Some(level) }
    }

    pub fn validate(&self) -> Result<u8> {
        let level = self
            .level
            .ok_or_else(|| SdkError::validation("'level' parameter is required"))?;
        device_brightness(level, "brightness level must be between 0 and 255")
    }
}

/// A validated logo change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoCommand {
    pub on: bool,
    /// Value of the device `logo` parameter
    pub value: String,
}

impl LogoCommand {
    pub fn off() -> Self {
        Self {
            on: false,
            value: LOGO_OFF_PATTERN.to_string(),
        }
    }

    /// Two colors alternate, one color fills, none uses the device default
    pub fn on(color1: Option<&str>, color2: Option<&str>) -> Self {
        let value = match (color1, color2) {
            (Some(c1), Some(c2)) => format!("{c1}|{c2}|{c1}|{c2}"),
            (Some(color), None) | (None, Some(color)) => color.to_string(),
            (None, None) => "on".to_string(),
        };
        Self { on: true, value }
    }

    pub fn to_query(&self) -> String {
        format!("logo={}", self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLogo {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub color1: Option<String>,
    #[serde(default)]
    pub color2: Option<String>,
}

impl SetLogo {
    pub fn on() -> Self {
        Self {
            state: Some("on".to_string()),
            ..Default::default()
        }
    }

    pub fn off() -> Self {
        Self {
            state: Some("off".to_string()),
            ..Default::default()
        }
    }

    pub fn with_colors(mut self, color1: impl Into<String>, color2: impl Into<String>) -> Self {
        self.color1 = Some(color1.into());
        self.color2 = Some(color2.into());
        self
    }

    pub fn validate(&self) -> Result<LogoCommand> {
        let state = self
            .state
            .as_deref()
            .ok_or_else(|| SdkError::validation("'state' parameter is required"))?;

        match state {
            "off" => Ok(LogoCommand::off()),
            "on" => {
                let color1 = self.color1.as_deref().filter(|c| !c.is_empty());
                let color2 = self.color2.as_deref().filter(|c| !c.is_empty());
                if color1.is_some_and(|c| !is_valid_hex_color(c)) {
                    return Err(SdkError::validation(
                        "'color1' must be a valid 6-character hex color",
                    ));
                }
                if color2.is_some_and(|c| !is_valid_hex_color(c)) {
                    return Err(SdkError::validation(
                        "'color2' must be a valid 6-character hex color",
                    ));
                }
                Ok(LogoCommand::on(color1, color2))
            }
            _ => Err(SdkError::validation("'state' must be either 'on' or 'off'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRingPattern {
    #[serde(default)]
    pub ring: Option<String>,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub background: Option<String>,
    /// Device whirl value, 0..=510
    #[serde(default)]
    pub whirl_ms: Option<i64>,
    #[serde(default)]
    pub counter_clockwise: bool,
    /// Device morph value, `STAY|SPEED`
    #[serde(default, rename = "morph", alias = "morphSpec")]
    pub morph_spec: Option<String>,
}

impl SetRingPattern {
    pub fn new(ring: impl Into<String>) -> Self {
        Self {
            ring: Some(ring.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<RingCommand> {
        let ring: Ring = self
            .ring
            .as_deref()
            .ok_or_else(|| SdkError::validation("'ring' parameter is required"))?
            .parse()
            .map_err(|_| SdkError::validation("'ring' must be either 'top' or 'bottom'"))?;

        if let Some(i) = self.segments.iter().position(|s| !is_valid_segment_format(s)) {
            return Err(SdkError::Validation(format!(
                "invalid segment format at index {}. Expected format: 'LED_INDEX|COUNT|RRGGBB'",
                i
            )));
        }

        let mut command = RingCommand::new(ring).segments(self.segments.iter().cloned());

        if let Some(bg) = self.background.as_deref().filter(|bg| !bg.is_empty()) {
            if !is_valid_hex_color(bg) {
                return Err(SdkError::validation(
                    "'background' must be a valid hex color (RRGGBB format)",
                ));
            }
            command = command.background(bg);
        }

        if let Some(whirl) = self.whirl_ms {
            let whirl = u16::try_from(whirl)
                .ok()
                .filter(|w| *w <= MAX_WHIRL_DEVICE)
                .ok_or_else(|| SdkError::validation("'whirlMs' must be between 0 and 510"))?;
            command = command.whirl(whirl, self.counter_clockwise);
        }

        if let Some(spec) = self.morph_spec.as_deref().filter(|s| !s.is_empty()) {
            if !is_valid_morph_spec(spec) {
                return Err(SdkError::validation(
                    "'morphSpec' must be in format 'STAY|SPEED' (e.g., '1000|500')",
                ));
            }
            command = command.morph(spec);
        }

        Ok(command)
    }
}

// ============================================================================
// Multi-field configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MorphRequest {
    pub brightness_ms: i64,
    pub fade_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingConfig {
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub background: Option<String>,
    /// Device whirl value, 0..=510
    #[serde(default)]
    pub whirl: Option<i64>,
    #[serde(default)]
    pub counter_clockwise: bool,
    #[serde(default)]
    pub morph: Option<MorphRequest>,
}

impl RingConfig {
    fn validate(&self, ring: Ring) -> std::result::Result<RingPlan, String> {
        if let Some(seg) = self.segments.iter().find(|s| !is_valid_segment_format(s)) {
            return Err(format!("invalid segment format: {}", seg));
        }
        let mut command = RingCommand::new(ring).segments(self.segments.iter().cloned());

        if let Some(bg) = &self.background {
            if !is_valid_hex_color(bg) {
                return Err(format!("invalid background color: {}", bg));
            }
            command = command.background(bg.as_str());
        }

        if let Some(whirl) = self.whirl {
            let whirl = u16::try_from(whirl)
                .ok()
                .filter(|w| *w <= MAX_WHIRL_DEVICE)
                .ok_or_else(|| "whirl must be between 0 and 510".to_string())?;
            command = command.whirl(whirl, self.counter_clockwise);
        }

        let morph = match self.morph {
            Some(morph) => {
                let brightness_ms = u32::try_from(morph.brightness_ms)
                    .map_err(|_| "brightnessMs must be non-negative".to_string())?;
                if !(MIN_FADE_MS..=MAX_FADE_MS).contains(&morph.fade_ms) {
                    return Err("fadeMs must be between 100 and 10000".to_string());
                }
                let config = MorphConfig::new(brightness_ms, morph.fade_ms as u32);
                command = command.morph(config.to_device());
                Some(config)
            }
            None => None,
        };

        Ok(RingPlan { command, morph })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoConfig {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub color1: Option<String>,
    #[serde(default)]
    pub color2: Option<String>,
}

impl LogoConfig {
    /// `None` when the config neither names a state nor gives a color
    fn validate(&self) -> std::result::Result<Option<LogoCommand>, String> {
        let color1 = self.color1.as_deref().filter(|c| !c.is_empty());
        let color2 = self.color2.as_deref().filter(|c| !c.is_empty());

        if self.state.as_deref() == Some("off") {
            return Ok(Some(LogoCommand::off()));
        }
        if self.state.as_deref() != Some("on") && color1.is_none() && color2.is_none() {
            return Ok(None);
        }

        if let Some(c) = color1.filter(|c| !is_valid_hex_color(c)) {
            return Err(format!("invalid color1: {}", c));
        }
        if let Some(c) = color2.filter(|c| !is_valid_hex_color(c)) {
            return Err(format!("invalid color2: {}", c));
        }
        Ok(Some(LogoCommand::on(color1, color2)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureLighting {
    #[serde(default)]
    pub top: Option<RingConfig>,
    #[serde(default)]
    pub bottom: Option<RingConfig>,
    #[serde(default)]
    pub logo: Option<LogoConfig>,
    #[serde(default)]
    pub brightness: Option<i64>,
    /// Milliseconds, or seconds when below 50
    #[serde(default)]
    pub duration: Option<i64>,
}

/// One validated ring of a [`LightingPlan`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingPlan {
    pub command: RingCommand,
    /// Exact morph timing, kept alongside the lossy device value
    pub morph: Option<MorphConfig>,
}

/// A validated [`ConfigureLighting`] request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightingPlan {
    pub brightness: Option<u8>,
    pub rings: Vec<RingPlan>,
    pub logo: Option<LogoCommand>,
    /// `0` leaves the configuration in place until something replaces it
    pub duration_ms: u64,
}

impl LightingPlan {
    pub fn is_empty(&self) -> bool {
        self.brightness.is_none() && self.rings.is_empty() && self.logo.is_none()
    }

    /// All parts combined into one device query
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(level) = self.brightness {
            parts.push(format!("dim={}", level));
        }
        for ring in &self.rings {
            parts.push(ring.command.to_query());
        }
        if let Some(logo) = &self.logo {
            parts.push(logo.to_query());
        }
        parts.join("&")
    }
}

impl ConfigureLighting {
    pub fn validate(&self) -> Result<LightingPlan> {
        let mut plan = LightingPlan::default();

        if let Some(level) = self.brightness {
            plan.brightness = Some(device_brightness(level, "brightness must be between 0 and 255")?);
        }

        for (ring, config) in [(Ring::Top, &self.top), (Ring::Bottom, &self.bottom)] {
            if let Some(config) = config {
                let ring_plan = config.validate(ring).map_err(|e| {
                    SdkError::Validation(format!("Error in {} ring config: {}", ring, e))
                })?;
                plan.rings.push(ring_plan);
            }
        }

        if let Some(logo) = &self.logo {
            plan.logo = logo
                .validate()
                .map_err(|e| SdkError::Validation(format!("Error in logo config: {}", e)))?;
        }

        plan.duration_ms = match self.duration {
            Some(d) if d > 0 && d < SECONDS_THRESHOLD => d as u64 * 1000,
            Some(d) if d > 0 => d as u64,
            _ => 0,
        };

        Ok(plan)
    }
}

// ============================================================================
// Effect requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayEffect {
    #[serde(default)]
    pub name: Option<String>,
    /// Overrides the catalog duration, in milliseconds
    #[serde(default)]
    pub duration: Option<i64>,
}

impl PlayEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// Effect name and optional duration override
    pub fn validate(&self) -> Result<(&str, Option<u64>)> {
        let name = require_name(&self.name)?;
        let duration = match self.duration {
            Some(d) if (0..=MAX_EFFECT_DURATION_MS).contains(&d) => Some(d as u64),
            Some(_) => {
                return Err(SdkError::validation(
                    "'duration' must be between 0 and 3600000 milliseconds (1 hour)",
                ))
            }
            None => None,
        };
        Ok((name, duration))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRawApi {
    #[serde(default)]
    pub query: Option<String>,
}

impl SendRawApi {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }

    pub fn validate(&self) -> Result<&str> {
        let query = match self.query.as_deref() {
            Some(query) if !query.is_empty() => query,
            _ => return Err(SdkError::validation("'query' parameter is required")),
        };
        if is_suspicious_query(query) {
            return Err(SdkError::validation(
                "Query contains potentially unsafe characters",
            ));
        }
        Ok(query)
    }
}

// ============================================================================
// Catalog requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEffect {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Seconds, `0` for the catalog default
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub perpetual: bool,
}

impl AddEffect {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<Effect> {
        let name = require_name(&self.name)?;
        validate_name(name)?;

        let description = self.description.as_deref().filter(|d| !d.is_empty()).ok_or_else(|| {
            SdkError::validation("'description' parameter is required and must be a non-empty string")
        })?;
        let pattern = self.pattern.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| {
            SdkError::validation("'pattern' parameter is required and must be a non-empty string")
        })?;

        let seconds = self.duration.unwrap_or(0);
        if !(0..=MAX_NEW_EFFECT_DURATION_SECS).contains(&seconds) {
            return Err(SdkError::validation(
                "'duration' must be between 0 and 3600 seconds",
            ));
        }

        let effect = Effect::new(name, description, pattern, seconds as u64 * 1000);
        Ok(if self.perpetual { effect.perpetual() } else { effect })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEffect {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Milliseconds
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub perpetual: Option<bool>,
}

impl UpdateEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn name(&self) -> Result<&str> {
        require_name(&self.name)
    }

    /// Merge the provided fields into `existing`
    pub fn apply_to(&self, mut existing: Effect) -> Result<Effect> {
        if let Some(description) = &self.description {
            if description.is_empty() {
                return Err(SdkError::validation(
                    "'description' must be a non-empty string when provided",
                ));
            }
            existing.description.clone_from(description);
        }

        if let Some(pattern) = &self.pattern {
            if pattern.is_empty() {
                return Err(SdkError::validation(
                    "'pattern' must be a non-empty string when provided",
                ));
            }
            existing.pattern.clone_from(pattern);
        }

        if let Some(duration) = self.duration {
            if !(0..=MAX_EFFECT_DURATION_MS).contains(&duration) {
                return Err(SdkError::validation(
                    "'duration' must be between 0 and 3600000 milliseconds (1 hour)",
                ));
            }
            existing.duration = duration as u64;
        }

        if let Some(perpetual) = self.perpetual {
            existing.perpetual = perpetual;
        }

        if self.description.is_none()
            && self.pattern.is_none()
            && self.duration.is_none()
            && self.perpetual.is_none()
        {
            return Err(SdkError::validation(
                "No updates provided. Specify at least one of: description, pattern, or duration",
            ));
        }

        Ok(existing)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEffect {
    #[serde(default)]
    pub name: Option<String>,
}

impl DeleteEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    pub fn validate(&self) -> Result<&str> {
        require_name(&self.name)
    }
}
