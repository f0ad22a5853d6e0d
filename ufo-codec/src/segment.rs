//! Run-length segment codec for ring colors
//!
//! A ring is sent to the device as a list of `start|count|COLOR` segments
//! joined by `|`, for example `0|3|FF0000|3|2|00FF00`. Unlit slots are never
//! encoded; the device clears the ring first (`{ring}_init=1`).
//!
//! Decoding is deliberately tolerant: a token that does not parse as three
//! well-formed fields is skipped and the rest of the update still applies.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::ring::{is_unlit, is_valid_hex_color, LEDS_PER_RING};

/// A contiguous run of same-colored LEDs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub count: usize,
    pub color: String,
}

impl Segment {
    pub fn new(start: usize, count: usize, color: impl Into<String>) -> Self {
        Self {
            start,
            count,
            color: color.into(),
        }
    }

    /// Write this segment's color into `dest`, clipped to the slice bounds
    pub fn apply(&self, dest: &mut [String]) {
        let end = self.start.saturating_add(self.count).min(dest.len());
        if self.start >= end {
            return;
        }
        for slot in &mut dest[self.start..end] {
            slot.clone_from(&self.color);
        }
    }

    fn from_fields(start: &str, count: &str, color: &str) -> Result<Self, SegmentParseError> {
        let start = start
            .trim()
            .parse::<usize>()
            .map_err(|_| SegmentParseError::InvalidStart(start.to_string()))?;
        let count = count
            .trim()
            .parse::<usize>()
            .map_err(|_| SegmentParseError::InvalidCount(count.to_string()))?;
        let color = color.trim();
        if !is_valid_hex_color(color) {
            return Err(SegmentParseError::InvalidColor(color.to_string()));
        }

        Ok(Self::new(start, count, color))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.start, self.count, self.color.to_ascii_uppercase())
    }
}

/// Why a segment token was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentParseError {
    #[error("expected 'start|count|RRGGBB', got '{0}'")]
    Format(String),

    #[error("invalid segment start '{0}'")]
    InvalidStart(String),

    #[error("invalid segment count '{0}'")]
    InvalidCount(String),

    #[error("invalid segment color '{0}'")]
    InvalidColor(String),
}

impl FromStr for Segment {
    type Err = SegmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('|').collect();
        match fields.as_slice() {
            [start, count, color] => Segment::from_fields(start, count, color),
            _ => Err(SegmentParseError::Format(s.to_string())),
        }
    }
}

/// Encode a ring into its minimal segment string
///
/// Scans left to right, skipping unlit slots, and emits one segment per
/// maximal run of identical color strings. Runs compare exactly, so
/// `ff0000` next to `FF0000` yields two segments; colors are upper-cased
/// only when written to the wire.
pub fn encode_segments(colors: &[String]) -> String {
    let mut segments = Vec::new();
    let len = colors.len().min(LEDS_PER_RING);

    let mut i = 0;
    while i < len {
        let color = &colors[i];
        if is_unlit(color) {
            i += 1;
            continue;
        }

        let run = colors[i..len]
            .iter()
            .take_while(|c| *c == color)
            .count();
        segments.push(Segment::new(i, run, color.as_str()).to_string());
        i += run;
    }

    segments.join("|")
}

/// Parse individual `start|count|COLOR` tokens, skipping malformed ones
pub fn parse_segment_tokens<S: AsRef<str>>(tokens: &[S]) -> Vec<Segment> {
    tokens
        .iter()
        .filter_map(|token| token.as_ref().parse::<Segment>().ok())
        .collect()
}

/// Parse a pipe-joined wire segment string, skipping malformed triples
///
/// `0|3|FF0000|3|2|00FF00` yields two segments. Trailing fields that do not
/// form a full triple are ignored.
pub fn parse_segment_string(value: &str) -> Vec<Segment> {
    if value.is_empty() {
        return Vec::new();
    }

    let fields: Vec<&str> = value.split('|').collect();
    fields
        .chunks_exact(3)
        .filter_map(|chunk| Segment::from_fields(chunk[0], chunk[1], chunk[2]).ok())
        .collect()
}

/// Write segments into a destination ring in order
pub fn apply_segments<'a>(dest: &mut [String], segments: impl IntoIterator<Item = &'a Segment>) {
    for segment in segments {
        segment.apply(dest);
    }
}
