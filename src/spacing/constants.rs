//! Default spacing values (logical units), shared by `SpacingOptions`.

use crate::model::LUnits;

// ── Fixed spaces ─────────────────────────────────────────────────────

pub const SPACE_BEFORE_PROLOG: LUnits = 8.0;
pub const SPACE_AFTER_BARLINE: LUnits = 12.0;
pub const MIN_SPACE_BETWEEN_OBJECTS: LUnits = 4.0;
pub const PROLOG_GAP: LUnits = 6.0;
pub const COLUMN_SEPARATION: LUnits = 6.0;

// ── Proportional spacing ─────────────────────────────────────────────

/// Space for a quarter note
pub const QUARTER_SPACE: LUnits = 35.0;
/// 1.0 gives strictly linear spacing; smaller values compress long notes
pub const SPACING_EXPONENT: f64 = 0.6;

// ── Break penalties (lower is a better break point) ──────────────────

pub const PENALTY_VISIBLE_BARLINE: f32 = 0.0;
pub const PENALTY_HIDDEN_BARLINE: f32 = 0.5;
pub const PENALTY_NO_BARLINE: f32 = 1.0;

/// Prolog slots, in display order
pub const PROLOG_SLOT_CLEF: usize = 0;
pub const PROLOG_SLOT_KEY: usize = 1;
pub const PROLOG_SLOT_TIME: usize = 2;
pub const NUM_PROLOG_SLOTS: usize = 3;
