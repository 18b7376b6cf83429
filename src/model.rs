//! Logical score model consumed by the column builder.
//!
//! A score is a list of instruments, each holding its measures as flat
//! lists of staff objects. Object times are relative to the start of
//! their measure; the cursor turns them into absolute times.

use serde::{Deserialize, Serialize};

/// Logical horizontal/vertical units.
pub type LUnits = f64;

/// Musical time, in quarter notes (a quarter note is 1.0).
pub type TimeUnits = f64;

/// Tolerance used whenever two times are compared.
pub const TIME_EPSILON: TimeUnits = 1e-4;

/// True when `a` and `b` denote the same instant.
pub fn is_equal_time(a: TimeUnits, b: TimeUnits) -> bool {
    (a - b).abs() < TIME_EPSILON
}

/// True when `a` is strictly later than `b`.
pub fn is_greater_time(a: TimeUnits, b: TimeUnits) -> bool {
    a - b >= TIME_EPSILON
}

/// Identifier of a staff object, unique within a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjId(pub u32);

/// A complete score, as produced by the analysis layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Instruments (parts), top to bottom
    pub instruments: Vec<Instrument>,
}

/// One instrument (MusicXML part).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    /// Part identifier (e.g., "P1")
    pub id: String,
    /// Display name
    pub name: String,
    /// Number of staves (2 for a piano grand staff)
    pub num_staves: usize,
    /// Ordered list of measures
    pub measures: Vec<MeasureContent>,
}

/// The content of one measure of one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureContent {
    /// Measure number as written in the source
    pub number: i32,
    /// A new system was requested before this measure
    pub new_system: bool,
    /// Staff objects in source order
    pub objects: Vec<StaffObj>,
}

/// A staff object: anything placed on a staff at a given time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffObj {
    pub id: ObjId,
    pub kind: StaffObjKind,
    /// Staff index inside the instrument (0-based)
    pub staff: usize,
    /// Voice number (1-based, as in MusicXML)
    pub voice: u32,
    /// Time relative to the start of the containing measure
    pub time: TimeUnits,
    /// Hidden objects keep their timing but have no footprint
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StaffObjKind {
    Clef(Clef),
    Key(KeySignature),
    Time(TimeSignature),
    Note(Note),
    Rest(Rest),
    Barline(Barline),
    Direction(Direction),
    /// Explicit spacer advancing a voice without drawing anything
    GoFwd { duration: TimeUnits },
    /// Forced system break after the current position
    SystemBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClefSign {
    G,
    F,
    C,
    Percussion,
}

/// Clef definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clef {
    pub sign: ClefSign,
    /// Staff line the clef sits on (1 = bottom line)
    pub line: i32,
    /// Octave transposition (e.g., -1 for a tenor guitar clef)
    pub octave_change: i32,
}

/// Key signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i32,
}

/// Time signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: i32,
    pub beat_type: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    /// Note name: A..G
    pub step: char,
    /// Octave number (middle C = C4)
    pub octave: i32,
    pub alter: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: Pitch,
    /// Duration in quarter notes (0 for grace notes)
    pub duration: TimeUnits,
    pub grace: bool,
    /// Shares its onset with the previous note of the same voice
    pub chord: bool,
    pub dots: u32,
    pub accidental: bool,
    /// Notated type ("quarter", "half", ...), if known
    pub note_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub duration: TimeUnits,
    /// Whole-measure rest ("rest measure=yes")
    pub full_measure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarlineStyle {
    Regular,
    Double,
    Final,
    StartRepeat,
    EndRepeat,
    /// Present for timing purposes but not drawn
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barline {
    pub style: BarlineStyle,
}

impl Barline {
    pub fn is_visible(&self) -> bool {
        self.style != BarlineStyle::Hidden
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    pub words: String,
}

impl StaffObjKind {
    /// Objects that may form the prolog at the start of a column.
    pub fn is_prolog_candidate(&self) -> bool {
        matches!(self, StaffObjKind::Clef(_) | StaffObjKind::Key(_) | StaffObjKind::Time(_))
    }

    /// Notes and rests: objects that sit on the time grid.
    pub fn is_timed(&self) -> bool {
        matches!(self, StaffObjKind::Note(_) | StaffObjKind::Rest(_))
    }

    pub fn is_barline(&self) -> bool {
        matches!(self, StaffObjKind::Barline(_))
    }

    pub fn is_grace(&self) -> bool {
        matches!(self, StaffObjKind::Note(n) if n.grace)
    }

    pub fn is_full_measure_rest(&self) -> bool {
        matches!(self, StaffObjKind::Rest(r) if r.full_measure)
    }

    /// Musical duration consumed by the object.
    pub fn duration(&self) -> TimeUnits {
        match self {
            StaffObjKind::Note(n) if n.grace => 0.0,
            StaffObjKind::Note(n) => n.duration,
            StaffObjKind::Rest(r) => r.duration,
            StaffObjKind::GoFwd { duration } => *duration,
            _ => 0.0,
        }
    }

    /// Short label used in traces and dumps.
    pub fn name(&self) -> &'static str {
        match self {
            StaffObjKind::Clef(_) => "clef",
            StaffObjKind::Key(_) => "key",
            StaffObjKind::Time(_) => "time",
            StaffObjKind::Note(n) if n.grace => "grace",
            StaffObjKind::Note(_) => "note",
            StaffObjKind::Rest(_) => "rest",
            StaffObjKind::Barline(_) => "barline",
            StaffObjKind::Direction(_) => "direction",
            StaffObjKind::GoFwd { .. } => "go-fwd",
            StaffObjKind::SystemBreak => "system-break",
        }
    }
}

impl Score {
    /// Create a new empty score.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of measures of the longest instrument.
    pub fn measure_count(&self) -> usize {
        self.instruments.iter().map(|i| i.measures.len()).max().unwrap_or(0)
    }

    /// Total number of staff objects in the score.
    pub fn num_staffobjs(&self) -> usize {
        self.instruments
            .iter()
            .flat_map(|i| i.measures.iter())
            .map(|m| m.objects.len())
            .sum()
    }
}

impl Instrument {
    pub fn new(id: &str, name: &str, num_staves: usize) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            num_staves: num_staves.max(1),
            measures: Vec::new(),
        }
    }
}

impl Pitch {
    /// Diatonic step index counted from C0, used for vertical placement.
    pub fn diatonic_position(&self) -> i32 {
        let step_index = match self.step {
            'C' => 0,
            'D' => 1,
            'E' => 2,
            'F' => 3,
            'G' => 4,
            'A' => 5,
            'B' => 6,
            _ => 0,
        };
        self.octave * 7 + step_index
    }
}
