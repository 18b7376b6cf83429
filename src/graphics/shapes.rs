//! Shapes: the visual footprint of staff objects.
//!
//! Shapes live in a [`ShapesStorage`] arena and are referred to by
//! [`ShapeId`]. Releasing a shape twice, or reading it after release, is
//! harmless: the slot simply stays empty.

use crate::model::*;
use super::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Clef,
    Key,
    Time,
    Note,
    Rest,
    Barline,
    Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    /// Staff object this shape renders
    pub owner: ObjId,
    pub left: LUnits,
    pub top: LUnits,
    pub width: LUnits,
    pub height: LUnits,
    /// Distance from the left edge to the alignment point (the notehead
    /// for a note with an accidental, the left edge otherwise)
    pub anchor: LUnits,
}

impl Shape {
    pub fn right(&self) -> LUnits {
        self.left + self.width
    }

    pub fn bottom(&self) -> LUnits {
        self.top + self.height
    }

    /// Extent to the right of the alignment point.
    pub fn right_extent(&self) -> LUnits {
        (self.width - self.anchor).max(0.0)
    }

    pub fn shift(&mut self, dx: LUnits, dy: LUnits) {
        self.left += dx;
        self.top += dy;
    }
}

/// Arena owning every shape created while laying out one score.
#[derive(Debug, Default)]
pub struct ShapesStorage {
    slots: Vec<Option<Shape>>,
    live: usize,
}

impl ShapesStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, shape: Shape) -> ShapeId {
        self.slots.push(Some(shape));
        self.live += 1;
        ShapeId(self.slots.len() - 1)
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Drop a shape. Returns false if it was already released.
    pub fn release(&mut self, id: ShapeId) -> bool {
        match self.slots.get_mut(id.0).and_then(Option::take) {
            Some(_) => {
                self.live -= 1;
                true
            }
            None => false,
        }
    }

    /// Number of shapes not yet released.
    pub fn num_live(&self) -> usize {
        self.live
    }
}

/// What a shapes creator knows about the place of an object.
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub instr: usize,
    pub staff: usize,
    /// Clef in effect on the staff, if any was seen yet
    pub clef: Option<&'a Clef>,
    /// Top line of the staff
    pub staff_top: LUnits,
    /// Provisional x position
    pub x: LUnits,
}

/// Service computing the footprint of a staff object.
pub trait ShapesCreator {
    /// Shape for `obj`, or `None` when the object draws nothing.
    fn create_staffobj_shape(&mut self, obj: &StaffObj, ctx: &ShapeContext<'_>) -> Option<Shape>;
}

/// Shapes creator built on fixed glyph metrics.
#[derive(Debug, Default, Clone)]
pub struct DefaultShapesCreator;

impl ShapesCreator for DefaultShapesCreator {
    fn create_staffobj_shape(&mut self, obj: &StaffObj, ctx: &ShapeContext<'_>) -> Option<Shape> {
        if !obj.visible {
            return None;
        }
        let staff_top = ctx.staff_top;
        let (kind, width, top, height, anchor) = match &obj.kind {
            StaffObjKind::Clef(_) => (
                ShapeKind::Clef,
                CLEF_WIDTH,
                staff_top - CLEF_EXTENT_ABOVE,
                STAFF_HEIGHT + CLEF_EXTENT_ABOVE + CLEF_EXTENT_BELOW,
                0.0,
            ),
            StaffObjKind::Key(key) => {
                let w = key_sig_width(key);
                if w <= 0.0 {
                    return None;
                }
                (ShapeKind::Key, w, staff_top - STAFF_LINE_SPACING, STAFF_HEIGHT + STAFF_LINE_SPACING, 0.0)
            }
            StaffObjKind::Time(_) => (ShapeKind::Time, TIME_SIG_WIDTH, staff_top, STAFF_HEIGHT, 0.0),
            StaffObjKind::Note(note) => return Some(note_shape(obj.id, note, ctx)),
            StaffObjKind::Rest(rest) => {
                let w = if rest.full_measure { WHOLE_REST_WIDTH } else { REST_WIDTH };
                (ShapeKind::Rest, w, staff_top + (STAFF_HEIGHT - REST_HEIGHT) / 2.0, REST_HEIGHT, 0.0)
            }
            StaffObjKind::Barline(barline) => {
                let w = match barline.style {
                    BarlineStyle::Hidden => return None,
                    BarlineStyle::Regular => BARLINE_WIDTH,
                    BarlineStyle::Double => DOUBLE_BARLINE_WIDTH,
                    BarlineStyle::Final => FINAL_BARLINE_WIDTH,
                    BarlineStyle::StartRepeat | BarlineStyle::EndRepeat => REPEAT_BARLINE_WIDTH,
                };
                (ShapeKind::Barline, w, staff_top, STAFF_HEIGHT, 0.0)
            }
            StaffObjKind::Direction(dir) => (
                ShapeKind::Direction,
                dir.words.chars().count() as f64 * DIRECTION_CHAR_WIDTH,
                staff_top + DIRECTION_OFFSET_Y,
                DIRECTION_HEIGHT,
                0.0,
            ),
            StaffObjKind::GoFwd { .. } | StaffObjKind::SystemBreak => return None,
        };
        Some(Shape { kind, owner: obj.id, left: ctx.x, top, width, height, anchor })
    }
}

fn note_shape(owner: ObjId, note: &Note, ctx: &ShapeContext<'_>) -> Shape {
    let scale = if note.grace { GRACE_SCALE } else { 1.0 };
    let head_w = NOTEHEAD_WIDTH * scale;
    let head_h = NOTEHEAD_HEIGHT * scale;
    let stem = STEM_LENGTH * scale;

    let anchor = if note.accidental { (ACCIDENTAL_WIDTH + ACCIDENTAL_GAP) * scale } else { 0.0 };
    let width = anchor + head_w + note.dots as f64 * DOT_WIDTH * scale;

    let y = ctx.staff_top + pitch_to_staff_y(&note.pitch, ctx.clef);
    let head_top = y - head_h / 2.0;
    let has_stem = !matches!(note.note_type.as_deref(), Some("whole") | Some("breve"));
    // stems go up for notes below the middle line
    let (top, height) = match (has_stem, y > ctx.staff_top + STAFF_HEIGHT / 2.0) {
        (false, _) => (head_top, head_h),
        (true, true) => (head_top - stem, head_h + stem),
        (true, false) => (head_top, head_h + stem),
    };

    Shape {
        kind: ShapeKind::Note,
        owner,
        left: ctx.x - anchor,
        top,
        width,
        height,
        anchor,
    }
}

/// Width of a key signature glyph group.
pub fn key_sig_width(key: &KeySignature) -> LUnits {
    if key.fifths > 0 {
        key.fifths as f64 * KEY_SIG_SHARP_SPACE
    } else {
        key.fifths.unsigned_abs() as f64 * KEY_SIG_FLAT_SPACE
    }
}

/// Vertical offset of a pitch from the top staff line.
pub fn pitch_to_staff_y(pitch: &Pitch, clef: Option<&Clef>) -> LUnits {
    let (ref_position, line, octave_change) = match clef {
        Some(c) => {
            let reference = match c.sign {
                ClefSign::F => 3 * 7 + 3, // F3
                ClefSign::C => 4 * 7,     // C4
                ClefSign::G | ClefSign::Percussion => 4 * 7 + 4, // G4
            };
            (reference, c.line, c.octave_change)
        }
        None => (4 * 7 + 4, 2, 0),
    };
    let ref_y = (5 - line) as f64 * STAFF_LINE_SPACING;
    let staff_steps = pitch.diatonic_position() - (ref_position + octave_change * 7);
    ref_y - staff_steps as f64 * (STAFF_LINE_SPACING / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(clef: Option<&Clef>) -> ShapeContext<'_> {
        ShapeContext { instr: 0, staff: 0, clef, staff_top: 100.0, x: 50.0 }
    }

    fn note(step: char, octave: i32, accidental: bool) -> StaffObj {
        StaffObj {
            id: ObjId(7),
            kind: StaffObjKind::Note(Note {
                pitch: Pitch { step, octave, alter: 0 },
                duration: 1.0,
                grace: false,
                chord: false,
                dots: 0,
                accidental,
                note_type: Some("quarter".into()),
            }),
            staff: 0,
            voice: 1,
            time: 0.0,
            visible: true,
        }
    }

    #[test]
    fn storage_release_is_idempotent() {
        let mut storage = ShapesStorage::new();
        let shape = Shape {
            kind: ShapeKind::Rest,
            owner: ObjId(1),
            left: 0.0,
            top: 0.0,
            width: 10.0,
            height: 10.0,
            anchor: 0.0,
        };
        let id = storage.add(shape);
        assert_eq!(storage.num_live(), 1);
        assert!(storage.release(id));
        assert!(!storage.release(id));
        assert!(storage.get(id).is_none());
        assert_eq!(storage.num_live(), 0);
    }

    #[test]
    fn treble_clef_positions() {
        let treble = Clef { sign: ClefSign::G, line: 2, octave_change: 0 };
        // G4 sits on the second line from the bottom
        let g4 = Pitch { step: 'G', octave: 4, alter: 0 };
        assert_eq!(pitch_to_staff_y(&g4, Some(&treble)), 30.0);
        // F5 is the top line
        let f5 = Pitch { step: 'F', octave: 5, alter: 0 };
        assert_eq!(pitch_to_staff_y(&f5, Some(&treble)), 0.0);
    }

    #[test]
    fn bass_clef_positions() {
        let bass = Clef { sign: ClefSign::F, line: 4, octave_change: 0 };
        let f3 = Pitch { step: 'F', octave: 3, alter: 0 };
        assert_eq!(pitch_to_staff_y(&f3, Some(&bass)), 10.0);
    }

    #[test]
    fn accidental_moves_anchor() {
        let mut creator = DefaultShapesCreator;
        let plain = creator.create_staffobj_shape(&note('C', 5, false), &ctx(None)).unwrap();
        let sharp = creator.create_staffobj_shape(&note('C', 5, true), &ctx(None)).unwrap();
        assert_eq!(plain.anchor, 0.0);
        assert!(sharp.anchor > 0.0);
        assert_eq!(sharp.right_extent(), plain.right_extent());
        assert_eq!(sharp.left + sharp.anchor, 50.0);
    }

    #[test]
    fn invisible_objects_have_no_shape() {
        let mut creator = DefaultShapesCreator;
        let mut obj = note('C', 5, false);
        obj.visible = false;
        assert!(creator.create_staffobj_shape(&obj, &ctx(None)).is_none());
        obj.visible = true;
        obj.kind = StaffObjKind::Key(KeySignature { fifths: 0 });
        assert!(creator.create_staffobj_shape(&obj, &ctx(None)).is_none());
        obj.kind = StaffObjKind::Barline(Barline { style: BarlineStyle::Hidden });
        assert!(creator.create_staffobj_shape(&obj, &ctx(None)).is_none());
    }

    #[test]
    fn key_widths() {
        assert_eq!(key_sig_width(&KeySignature { fifths: 3 }), 30.0);
        assert_eq!(key_sig_width(&KeySignature { fifths: -2 }), 16.0);
        assert_eq!(key_sig_width(&KeySignature { fifths: 0 }), 0.0);
    }
}
