//! Device query strings
//!
//! The device takes `key=value` pairs joined by `&`. Values carry raw `|`
//! separators and are never percent-encoded.

use crate::ring::Ring;

/// Suffix appended to a whirl value for counter-clockwise rotation
pub const CCW_SUFFIX: &str = "|ccw";

/// Query that blanks both rings and turns the logo off
pub const CLEAR_QUERY: &str = "top_init=1&bottom_init=1&logo=off";

/// Split a query string into `(key, value)` pairs in order
///
/// Pairs without `=` are returned with an empty value. A leading `?` or `/`
/// is ignored.
pub fn parse_query(query: &str) -> Vec<(&str, &str)> {
    strip_query_prefix(query)
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect()
}

/// Remove a single leading `?` or `/` from a query
pub fn strip_query_prefix(query: &str) -> &str {
    query
        .strip_prefix('?')
        .or_else(|| query.strip_prefix('/'))
        .unwrap_or(query)
}

/// Split a whirl value into the device speed and a counter-clockwise flag
///
/// `"200|ccw"` yields `Some((200, true))`; a non-numeric speed yields `None`.
pub fn parse_whirl_value(value: &str) -> Option<(u16, bool)> {
    let (speed, ccw) = match value.strip_suffix(CCW_SUFFIX) {
        Some(speed) => (speed, true),
        None => (value, false),
    };
    speed.trim().parse().ok().map(|speed| (speed, ccw))
}

/// Builder for a single ring command
///
/// Produces keys in the order the device firmware documents them:
/// init, segments, background, whirl, morph.
///
/// ```rust,ignore
/// let query = RingCommand::new(Ring::Top)
///     .segments(["0|5|FF0000"])
///     .background("202020")
///     .whirl(200, true)
///     .to_query();
/// assert_eq!(query, "top_init=1&top=0|5|FF0000&top_bg=202020&top_whirl=200|ccw");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingCommand {
    pub ring: Ring,
    pub segments: Vec<String>,
    pub background: Option<String>,
    pub whirl: u16,
    pub counter_clockwise: bool,
    pub morph: Option<String>,
}

impl RingCommand {
    pub fn new(ring: Ring) -> Self {
        Self {
            ring,
            segments: Vec::new(),
            background: None,
            whirl: 0,
            counter_clockwise: false,
            morph: None,
        }
    }

    pub fn segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn background(mut self, color: impl Into<String>) -> Self {
        self.background = Some(color.into());
        self
    }

    /// Device whirl value; `0` omits the parameter
    pub fn whirl(mut self, value: u16, counter_clockwise: bool) -> Self {
        self.whirl = value;
        self.counter_clockwise = counter_clockwise;
        self
    }

    /// Device morph value (`ticks|speed`)
    pub fn morph(mut self, value: impl Into<String>) -> Self {
        self.morph = Some(value.into());
        self
    }

    /// Render the command as device query pairs
    pub fn to_pairs(&self) -> Vec<String> {
        let ring = self.ring;
        let mut parts = vec![format!("{}=1", ring.key("init"))];

        let segments: Vec<&str> = self
            .segments
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if !segments.is_empty() {
            parts.push(format!("{}={}", ring.key(""), segments.join("|")));
        }

        if let Some(bg) = self.background.as_deref().filter(|bg| !bg.is_empty()) {
            parts.push(format!("{}={}", ring.key("bg"), bg));
        }

        if self.whirl > 0 {
            let suffix = if self.counter_clockwise { CCW_SUFFIX } else { "" };
            parts.push(format!("{}={}{}", ring.key("whirl"), self.whirl, suffix));
        }

        if let Some(morph) = self.morph.as_deref().filter(|m| !m.is_empty()) {
            parts.push(format!("{}={}", ring.key("morph"), morph));
        }

        parts
    }

    pub fn to_query(&self) -> String {
        self.to_pairs().join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_query_keeps_pipes() {
        let pairs = parse_query("?dim=128&top=0|3|FF0000&logo=on");
        assert_eq!(
            pairs,
            vec![("dim", "128"), ("top", "0|3|FF0000"), ("logo", "on")]
        );
    }

    #[test]
    fn test_parse_query_tolerates_bare_keys() {
        assert_eq!(parse_query("top_init&&dim=1"), vec![("top_init", ""), ("dim", "1")]);
        assert!(parse_query("").is_empty());
    }

    #[rstest]
    #[case("?dim=1", "dim=1")]
    #[case("/dim=1", "dim=1")]
    #[case("dim=1", "dim=1")]
    #[case("", "")]
    fn test_strip_query_prefix(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_query_prefix(input), expected);
    }

    #[rstest]
    #[case("200", Some((200, false)))]
    #[case("200|ccw", Some((200, true)))]
    #[case("fast", None)]
    fn test_parse_whirl_value(#[case] value: &str, #[case] expected: Option<(u16, bool)>) {
        assert_eq!(parse_whirl_value(value), expected);
    }

    #[test]
    fn test_ring_command_full() {
        let query = RingCommand::new(Ring::Top)
            .segments(["0|5|FF0000", "10|3|00FF00"])
            .background("202020")
            .whirl(200, true)
            .morph("150|3")
            .to_query();

        assert_eq!(
            query,
            "top_init=1&top=0|5|FF0000|10|3|00FF00&top_bg=202020&top_whirl=200|ccw&top_morph=150|3"
        );
    }

    #[test]
    fn test_ring_command_minimal() {
        assert_eq!(RingCommand::new(Ring::Bottom).to_query(), "bottom_init=1");
        assert_eq!(
            RingCommand::new(Ring::Bottom).whirl(0, true).background("").to_query(),
            "bottom_init=1"
        );
    }
}
