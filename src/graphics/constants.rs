//! Glyph metrics and staff geometry (all in logical units).

// ── Staff dimensions ────────────────────────────────────────────────
pub const STAFF_LINE_SPACING: f64 = 10.0; // distance between staff lines
pub const STAFF_HEIGHT: f64 = 40.0; // 5 lines, 4 spaces
pub const GRAND_STAFF_GAP: f64 = 60.0; // vertical gap between staves of one instrument
pub const PART_GAP: f64 = 80.0; // vertical gap between instruments

// ── Prolog glyphs ───────────────────────────────────────────────────
pub const CLEF_WIDTH: f64 = 24.0;
pub const CLEF_EXTENT_ABOVE: f64 = 12.0;
pub const CLEF_EXTENT_BELOW: f64 = 10.0;
pub const KEY_SIG_SHARP_SPACE: f64 = 10.0;
pub const KEY_SIG_FLAT_SPACE: f64 = 8.0;
pub const TIME_SIG_WIDTH: f64 = 18.0;

// ── Note dimensions ─────────────────────────────────────────────────
pub const NOTEHEAD_WIDTH: f64 = 11.0; // twice the notehead x-radius
pub const NOTEHEAD_HEIGHT: f64 = 8.0;
pub const STEM_LENGTH: f64 = 30.0;
pub const ACCIDENTAL_WIDTH: f64 = 8.0;
pub const ACCIDENTAL_GAP: f64 = 2.0;
pub const DOT_WIDTH: f64 = 5.0;
pub const GRACE_SCALE: f64 = 0.66;

// ── Rests ───────────────────────────────────────────────────────────
pub const REST_WIDTH: f64 = 10.0;
pub const REST_HEIGHT: f64 = 24.0;
pub const WHOLE_REST_WIDTH: f64 = 12.0;

// ── Barlines ────────────────────────────────────────────────────────
pub const BARLINE_WIDTH: f64 = 1.0;
pub const DOUBLE_BARLINE_WIDTH: f64 = 5.0;
pub const FINAL_BARLINE_WIDTH: f64 = 7.0;
pub const REPEAT_BARLINE_WIDTH: f64 = 13.0;

// ── Text ────────────────────────────────────────────────────────────
pub const DIRECTION_CHAR_WIDTH: f64 = 5.5;
pub const DIRECTION_HEIGHT: f64 = 12.0;
pub const DIRECTION_OFFSET_Y: f64 = -22.0; // above staff
