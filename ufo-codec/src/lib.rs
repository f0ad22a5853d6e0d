//! UFO wire-format codecs
//!
//! Pure, infallible building blocks shared by the shadow state engine and the
//! device client:
//!
//! - [`ring`]: ring identifiers and color helpers
//! - [`convert`]: millisecond <-> device tick conversions for morph and whirl
//! - [`segment`]: run-length `start|count|COLOR` segment encoding
//! - [`query`]: device query parsing and the [`RingCommand`] builder
//!
//! # Example
//!
//! ```rust,ignore
//! use ufo_codec::{encode_segments, convert_whirl_to_device};
//!
//! let ring = vec!["FF0000".to_string(); 15];
//! assert_eq!(encode_segments(&ring), "0|15|FF0000");
//! assert_eq!(convert_whirl_to_device(1000), 189);
//! ```

pub mod convert;
pub mod query;
pub mod ring;
pub mod segment;

pub use convert::{
    convert_device_whirl_to_ms, convert_morph_from_device, convert_morph_to_device,
    convert_whirl_to_device, MorphConfig, MAX_WHIRL_DEVICE,
};
pub use query::{parse_query, parse_whirl_value, strip_query_prefix, RingCommand, CLEAR_QUERY};
pub use ring::{is_unlit, is_valid_hex_color, Ring, RingParseError, BLACK, LEDS_PER_RING};
pub use segment::{
    apply_segments, encode_segments, parse_segment_string, parse_segment_tokens, Segment,
    SegmentParseError,
};
