//! Per-level descriptor parsing.
//!
//! For every pyramid level the decoder hands out a NUL-terminated string of
//! four positional `key=value` segments separated by `|`:
//!
//! ```text
//! width=40960|height=30720|boundWidth=64|boundHeight=32|
//! ```
//!
//! The key names are not stable across library versions, so only the position
//! of each segment matters: raw width, raw height, bound width, bound height.
//! The bound values are a crop margin baked into the format; the usable extent
//! of a level is the raw extent minus the bound.
//!
//! The descriptor may sit inside a larger buffer. Scanning stops at the first
//! NUL byte, and the fourth value may be closed by `|`, by the NUL or by the
//! end of the slice.

use crate::error::ParseError;

/// Byte separating segments.
pub const FIELD_DELIMITER: u8 = b'|';

/// Byte separating a key from its value.
pub const KEY_SEPARATOR: u8 = b'=';

/// Positional names of the four segments, used in error messages.
pub const FIELD_NAMES: [&str; 4] = ["raw width", "raw height", "bound width", "bound height"];

// =============================================================================
// LevelDescriptor
// =============================================================================

/// Parsed geometry of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelDescriptor {
    /// Raw width of the level before cropping
    pub raw_width: i64,

    /// Raw height of the level before cropping
    pub raw_height: i64,

    /// Horizontal crop margin
    pub bound_width: i64,

    /// Vertical crop margin
    pub bound_height: i64,

    width: u32,
    height: u32,
}

impl LevelDescriptor {
    /// Build a descriptor from its four raw values.
    ///
    /// Fails if a bound exceeds its raw extent or the result does not fit in
    /// `u32`.
    pub fn new(
        raw_width: i64,
        raw_height: i64,
        bound_width: i64,
        bound_height: i64,
    ) -> Result<Self, ParseError> {
        Ok(LevelDescriptor {
            raw_width,
            raw_height,
            bound_width,
            bound_height,
            width: cropped_extent(raw_width, bound_width)?,
            height: cropped_extent(raw_height, bound_height)?,
        })
    }

    /// Usable `(width, height)` of the level.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn cropped_extent(raw: i64, bound: i64) -> Result<u32, ParseError> {
    let extent = raw
        .checked_sub(bound)
        .filter(|extent| *extent >= 0)
        .ok_or(ParseError::NegativeExtent { raw, bound })?;
    u32::try_from(extent).map_err(|_| ParseError::ExtentOverflow { extent })
}

// =============================================================================
// Parser
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Inside a key, waiting for `=`
    Key { start: usize },

    /// Inside a value, waiting for `|`
    Value { start: usize },
}

/// Parse a level descriptor into its geometry.
///
/// # Errors
///
/// - [`ParseError::MissingField`] if fewer than four segments are present
/// - [`ParseError::MissingSeparator`] if a segment has no `=`
/// - [`ParseError::InvalidInteger`] if a value is not a base-10 integer
/// - [`ParseError::NegativeExtent`] if a bound exceeds its raw extent
pub fn parse_level_descriptor(bytes: &[u8]) -> Result<LevelDescriptor, ParseError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = &bytes[..end];

    let mut values = [0i64; 4];
    let mut found = 0;
    let mut state = State::Key { start: 0 };

    for (pos, &byte) in text.iter().enumerate() {
        match (state, byte) {
            (State::Key { .. }, KEY_SEPARATOR) => {
                state = State::Value { start: pos + 1 };
            }
            (State::Key { .. }, FIELD_DELIMITER) => {
                return Err(ParseError::MissingSeparator {
                    field: FIELD_NAMES[found],
                });
            }
            (State::Value { start }, FIELD_DELIMITER) => {
                values[found] = parse_value(found, &text[start..pos])?;
                found += 1;
                if found == values.len() {
                    break;
                }
                state = State::Key { start: pos + 1 };
            }
            _ => {}
        }
    }

    // The last segment may be terminated by NUL or the end of the slice.
    if found < values.len() {
        match state {
            State::Value { start } => {
                values[found] = parse_value(found, &text[start..])?;
                found += 1;
            }
            State::Key { start } if start < text.len() => {
                return Err(ParseError::MissingSeparator {
                    field: FIELD_NAMES[found],
                });
            }
            State::Key { .. } => {}
        }
    }

    if found < values.len() {
        return Err(ParseError::MissingField { found });
    }

    let [raw_width, raw_height, bound_width, bound_height] = values;
    LevelDescriptor::new(raw_width, raw_height, bound_width, bound_height)
}

fn parse_value(field: usize, raw: &[u8]) -> Result<i64, ParseError> {
    let invalid = || ParseError::InvalidInteger {
        field: FIELD_NAMES[field],
        value: String::from_utf8_lossy(raw).into_owned(),
    };

    std::str::from_utf8(raw)
        .map_err(|_| invalid())?
        .trim()
        .parse::<i64>()
        .map_err(|_| invalid())
}

// =============================================================================
// Tests
// =============================================================================
