//! Tunable spacing parameters.
//!
//! Defaults come from `spacing::constants` and use the same logical units
//! as the glyph metrics in `graphics::constants`. Options can be loaded
//! from a JSON document; missing fields keep their defaults.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::model::{LUnits, TimeUnits};
use crate::spacing::constants::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacingOptions {
    /// Space before the prolog of the first column
    pub space_before_prolog: LUnits,
    /// Space between a barline and the first object of the next column
    pub space_after_barline: LUnits,
    /// Minimum clearance between two horizontally adjacent objects
    pub min_space_between_objects: LUnits,
    /// Gap after each prolog slot (clef, key, time)
    pub prolog_gap: LUnits,
    /// Space allotted to a quarter note
    pub quarter_space: LUnits,
    /// Exponent of the duration -> space mapping (1.0 is strictly linear)
    pub spacing_exponent: f64,
    /// Gap added before a column starting with a context change when the
    /// previous column has no barline
    pub column_separation: LUnits,
    /// Break penalty for a column ending in a visible barline
    pub penalty_visible_barline: f32,
    /// Break penalty for a column ending in a hidden barline
    pub penalty_hidden_barline: f32,
    /// Break penalty for a column without barline
    pub penalty_no_barline: f32,
    /// Cap on column length for content without barlines
    pub max_column_duration: Option<TimeUnits>,
    /// Count whole-measure rests as empty content
    pub full_measure_rest_is_empty: bool,
}

impl Default for SpacingOptions {
    fn default() -> Self {
        Self {
            space_before_prolog: SPACE_BEFORE_PROLOG,
            space_after_barline: SPACE_AFTER_BARLINE,
            min_space_between_objects: MIN_SPACE_BETWEEN_OBJECTS,
            prolog_gap: PROLOG_GAP,
            quarter_space: QUARTER_SPACE,
            spacing_exponent: SPACING_EXPONENT,
            column_separation: COLUMN_SEPARATION,
            penalty_visible_barline: PENALTY_VISIBLE_BARLINE,
            penalty_hidden_barline: PENALTY_HIDDEN_BARLINE,
            penalty_no_barline: PENALTY_NO_BARLINE,
            max_column_duration: None,
            full_measure_rest_is_empty: false,
        }
    }
}

impl SpacingOptions {
    /// Parse options from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        let options: SpacingOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let spaces = [
            ("space_before_prolog", self.space_before_prolog),
            ("space_after_barline", self.space_after_barline),
            ("min_space_between_objects", self.min_space_between_objects),
            ("prolog_gap", self.prolog_gap),
            ("column_separation", self.column_separation),
        ];
        for (name, value) in spaces {
            if !(value >= 0.0) {
                return Err(LayoutError::InvalidOptions(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if !(self.quarter_space > 0.0) {
            return Err(LayoutError::InvalidOptions(format!(
                "quarter_space must be positive, got {}",
                self.quarter_space
            )));
        }
        if !(self.spacing_exponent > 0.0 && self.spacing_exponent <= 1.0) {
            return Err(LayoutError::InvalidOptions(format!(
                "spacing_exponent must be in (0, 1], got {}",
                self.spacing_exponent
            )));
        }
        if let Some(d) = self.max_column_duration {
            if !(d > 0.0) {
                return Err(LayoutError::InvalidOptions(format!(
                    "max_column_duration must be positive, got {d}"
                )));
            }
        }
        Ok(())
    }

    /// Horizontal space for an event lasting `duration` quarter notes.
    pub fn space_for_duration(&self, duration: TimeUnits) -> LUnits {
        if duration <= 0.0 {
            return 0.0;
        }
        self.quarter_space * duration.powf(self.spacing_exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let opts = SpacingOptions::from_json(r#"{ "quarter_space": 40.0 }"#).unwrap();
        assert_eq!(opts.quarter_space, 40.0);
        assert_eq!(opts.space_after_barline, SpacingOptions::default().space_after_barline);
    }

    #[test]
    fn rejects_negative_space() {
        let err = SpacingOptions::from_json(r#"{ "prolog_gap": -1.0 }"#).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidOptions(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = SpacingOptions::from_json("{ quarter_space: }").unwrap_err();
        assert!(matches!(err, LayoutError::Json(_)));
    }

    #[test]
    fn longer_durations_get_more_space_but_less_than_linear() {
        let opts = SpacingOptions::default();
        let q = opts.space_for_duration(1.0);
        let h = opts.space_for_duration(2.0);
        assert_eq!(q, opts.quarter_space);
        assert!(h > q);
        assert!(h < 2.0 * q);
        assert_eq!(opts.space_for_duration(0.0), 0.0);
    }
}
