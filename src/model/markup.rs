//! Per-superpixel markup state and the markup array.
//!
//! `MarkupState` is the single canonical tri-state enumeration shared by the
//! paint layer and the workflow store; on the wire it is the float set
//! `{0.0, 0.5, 1.0}`.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Wire value for `MarkupState::Absent`.
pub const ABSENT_VALUE: f64 = 0.0;
/// Wire value for `MarkupState::Possible`.
pub const POSSIBLE_VALUE: f64 = 0.5;
/// Wire value for `MarkupState::Definite`.
pub const DEFINITE_VALUE: f64 = 1.0;

/// Tri-state annotation value for one superpixel region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkupState {
    /// Feature is not present in this region
    #[default]
    Absent,
    /// Feature is possibly present in this region
    Possible,
    /// Feature is definitely present in this region
    Definite,
}

impl MarkupState {
    /// Wire value of this state.
    pub const fn value(self) -> f64 {
        match self {
            MarkupState::Absent => ABSENT_VALUE,
            MarkupState::Possible => POSSIBLE_VALUE,
            MarkupState::Definite => DEFINITE_VALUE,
        }
    }

    /// Parse a raw wire value.
    ///
    /// Only the exact values `0.0`, `0.5` and `1.0` are valid; anything else
    /// is rejected so it can never reach rendering.
    pub fn from_value(raw: f64) -> Result<Self, EngineError> {
        if raw == ABSENT_VALUE {
            Ok(MarkupState::Absent)
        } else if raw == POSSIBLE_VALUE {
            Ok(MarkupState::Possible)
        } else if raw == DEFINITE_VALUE {
            Ok(MarkupState::Definite)
        } else {
            Err(EngineError::invalid_input(format!(
                "{raw} is not a markup state (expected 0.0, 0.5 or 1.0)"
            )))
        }
    }

    /// Whether this state is a valid operator fill value (Possible or Definite).
    pub fn is_fill(self) -> bool {
        matches!(self, MarkupState::Possible | MarkupState::Definite)
    }

    /// Get the display name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            MarkupState::Absent => "Absent",
            MarkupState::Possible => "Possible",
            MarkupState::Definite => "Definite",
        }
    }
}

impl Serialize for MarkupState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for MarkupState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        MarkupState::from_value(raw).map_err(de::Error::custom)
    }
}

/// Ordered sequence of `MarkupState`, one entry per superpixel region.
///
/// The length is fixed to the segmentation's region count at creation; it is
/// never resized afterward. Serializes as a flat float sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupArray(Vec<MarkupState>);

impl MarkupArray {
    /// Create an array of `len` regions, all filled with `state`.
    pub fn filled(len: usize, state: MarkupState) -> Self {
        Self(vec![state; len])
    }

    /// Create an array of `len` regions, all `Absent`.
    pub fn absent(len: usize) -> Self {
        Self::filled(len, MarkupState::Absent)
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the array has no regions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<MarkupState> {
        self.0.get(index).copied()
    }

    /// Write `value` at `index`.
    ///
    /// Returns whether the stored value actually changed; an identical write
    /// is reported as unchanged so callers can skip redraws.
    pub fn set(&mut self, index: usize, value: MarkupState) -> Result<bool, EngineError> {
        let region_count = self.0.len();
        let slot = self.0.get_mut(index).ok_or_else(|| {
            EngineError::invalid_input(format!(
                "superpixel index {index} out of range (region count {region_count})"
            ))
        })?;
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    /// Iterate over all region values.
    pub fn iter(&self) -> impl Iterator<Item = MarkupState> + '_ {
        self.0.iter().copied()
    }

    /// Whether every region is `Absent`.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|s| *s == MarkupState::Absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(MarkupState::Absent.value(), 0.0);
        assert_eq!(MarkupState::Possible.value(), 0.5);
        assert_eq!(MarkupState::Definite.value(), 1.0);
    }

    #[test]
    fn test_from_value_roundtrip() {
        for state in [
            MarkupState::Absent,
            MarkupState::Possible,
            MarkupState::Definite,
        ] {
            assert_eq!(MarkupState::from_value(state.value()).unwrap(), state);
        }
    }

    #[test]
    fn test_from_value_rejects_unknown() {
        assert!(MarkupState::from_value(0.25).is_err());
        assert!(MarkupState::from_value(-1.0).is_err());
        assert!(MarkupState::from_value(f64::NAN).is_err());
    }

    #[test]
    fn test_absent_array_is_blank() {
        let array = MarkupArray::absent(100);
        assert_eq!(array.len(), 100);
        assert!(array.is_blank());
        assert!(array.iter().all(|s| s == MarkupState::Absent));
    }

    #[test]
    fn test_set_reports_change() {
        let mut array = MarkupArray::absent(4);
        assert!(array.set(2, MarkupState::Definite).unwrap());
        assert!(!array.set(2, MarkupState::Definite).unwrap());
        assert_eq!(array.get(2), Some(MarkupState::Definite));
    }

    #[test]
    fn test_set_out_of_range() {
        let mut array = MarkupArray::absent(4);
        assert!(array.set(4, MarkupState::Possible).is_err());
    }

    #[test]
    fn test_serializes_as_float_sequence() {
        let mut array = MarkupArray::absent(3);
        array.set(1, MarkupState::Possible).unwrap();
        array.set(2, MarkupState::Definite).unwrap();
        let json = serde_json::to_string(&array).unwrap();
        assert_eq!(json, "[0.0,0.5,1.0]");
    }

    #[test]
    fn test_deserialize_rejects_bad_value() {
        let result: Result<MarkupArray, _> = serde_json::from_str("[0.0,0.3]");
        assert!(result.is_err());
    }
}
