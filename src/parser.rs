//! MusicXML import — builds the logical [`Score`] consumed by the column
//! builder from a `score-partwise` document.
//!
//! Only what spacing needs is read: attributes, notes and rests,
//! backup/forward, barlines, system breaks and direction words. Voices in
//! MusicXML are written one after another with `<backup>` and `<forward>`
//! moving a shared time pointer; [`TimeKeeper`] resolves that into a time
//! for every object, relative to the start of its measure.

use roxmltree::{Document, Node};

use crate::error::LayoutError;
use crate::model::*;
use crate::report::Reporter;

/// Parse a MusicXML XML string into a Score.
pub fn parse_musicxml(xml: &str, reporter: &mut Reporter) -> Result<Score, LayoutError> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)?;
    let root = doc.root_element();

    if root.tag_name().name() != "score-partwise" {
        return Err(LayoutError::UnsupportedFormat(format!(
            "root element '{}', only 'score-partwise' is supported",
            root.tag_name().name()
        )));
    }

    let mut ctx = ParseContext { next_id: 0, reporter };
    let mut score = Score::new();

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "work" => parse_work(&child, &mut score),
            "part-list" => parse_part_list(&child, &mut score),
            "part" => parse_part(&child, &mut score, &mut ctx),
            _ => {}
        }
    }

    Ok(score)
}

struct ParseContext<'r> {
    next_id: u32,
    reporter: &'r mut Reporter,
}

impl ParseContext<'_> {
    fn new_id(&mut self) -> ObjId {
        let id = ObjId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Tracks the time pointer while walking the children of a `<measure>`.
#[derive(Debug, Default)]
pub(crate) struct TimeKeeper {
    time: TimeUnits,
    max_time: TimeUnits,
    last_onset: TimeUnits,
}

impl TimeKeeper {
    fn new() -> Self {
        Self::default()
    }

    /// Current position, where the next object starts.
    fn now(&self) -> TimeUnits {
        self.time
    }

    /// Onset for a note, advancing the pointer unless it is a chord
    /// member or a grace note.
    fn note_onset(&mut self, duration: TimeUnits, chord: bool, grace: bool) -> TimeUnits {
        if chord {
            return self.last_onset;
        }
        let onset = self.time;
        self.last_onset = onset;
        if !grace {
            self.advance(duration);
        }
        onset
    }

    fn advance(&mut self, duration: TimeUnits) {
        self.time += duration.max(0.0);
        self.max_time = self.max_time.max(self.time);
    }

    /// Move back; returns false when the request went past the measure
    /// start and had to be clamped.
    fn backup(&mut self, duration: TimeUnits) -> bool {
        let target = self.time - duration;
        if target < -TIME_EPSILON {
            self.time = 0.0;
            false
        } else {
            self.time = target.max(0.0);
            true
        }
    }

    /// Length of the measure: furthest point reached by any voice.
    fn measure_end(&self) -> TimeUnits {
        self.max_time.max(self.time)
    }
}

/// Running attributes of a part while its measures are read.
struct PartState {
    divisions: f64,
    num_staves: usize,
}

// ─── Work ────────────────────────────────────────────────────────────

fn parse_work(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "work-title" {
            score.title = child.text().map(|t| t.trim().to_string());
        }
    }
}

// ─── Part List ───────────────────────────────────────────────────────

fn parse_part_list(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "score-part" {
            let id = child.attribute("id").unwrap_or("");
            let name = child
                .children()
                .find(|n| n.is_element() && n.tag_name().name() == "part-name")
                .and_then(|n| n.text())
                .unwrap_or("")
                .trim()
                .to_string();
            score.instruments.push(Instrument::new(id, &name, 1));
        }
    }
}

// ─── Part (measures) ─────────────────────────────────────────────────

fn parse_part(node: &Node, score: &mut Score, ctx: &mut ParseContext) {
    let part_id = node.attribute("id").unwrap_or("");

    let instrument = match score.instruments.iter_mut().find(|i| i.id == part_id) {
        Some(i) => i,
        None => {
            ctx.reporter
                .warn(None, format!("part '{part_id}' is not declared in part-list, skipped"));
            return;
        }
    };

    let mut state = PartState { divisions: 1.0, num_staves: 1 };

    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "measure" {
            let measure = parse_measure(&child, &mut state, ctx);
            instrument.measures.push(measure);
        }
    }
    instrument.num_staves = state.num_staves;
}

// ─── Measure ─────────────────────────────────────────────────────────

fn parse_measure(node: &Node, state: &mut PartState, ctx: &mut ParseContext) -> MeasureContent {
    let number = node
        .attribute("number")
        .and_then(|n| n.parse::<i32>().ok())
        .unwrap_or(0);

    let mut measure = MeasureContent { number, new_system: false, objects: Vec::new() };
    let mut keeper = TimeKeeper::new();
    // right barlines, timed once every voice of the measure is read
    let mut right_barlines: Vec<usize> = Vec::new();

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "attributes" => parse_attributes(&child, state, &keeper, &mut measure, ctx),
            "note" => {
                let obj = parse_note(&child, state, &mut keeper, ctx);
                measure.objects.push(obj);
            }
            "backup" => {
                let d = parse_duration(&child, state);
                if !keeper.backup(d) {
                    ctx.reporter.warn(
                        None,
                        format!("measure {number}: backup goes before measure start, clamped"),
                    );
                }
            }
            "forward" => {
                let duration = parse_duration(&child, state);
                let (staff, voice) = parse_staff_and_voice(&child);
                let id = ctx.new_id();
                measure.objects.push(StaffObj {
                    id,
                    kind: StaffObjKind::GoFwd { duration },
                    staff,
                    voice,
                    time: keeper.now(),
                    visible: false,
                });
                keeper.advance(duration);
            }
            "barline" => {
                let location = child.attribute("location").unwrap_or("right");
                let barline = parse_barline(&child);
                if location != "left" {
                    right_barlines.push(measure.objects.len());
                }
                let id = ctx.new_id();
                measure.objects.push(StaffObj {
                    id,
                    kind: StaffObjKind::Barline(barline),
                    staff: 0,
                    voice: 1,
                    time: 0.0,
                    visible: true,
                });
            }
            "direction" => {
                if let Some(obj) = parse_direction(&child, &keeper, ctx) {
                    measure.objects.push(obj);
                }
            }
            "print" => {
                if child.attribute("new-system") == Some("yes")
                    || child.attribute("new-page") == Some("yes")
                {
                    measure.new_system = true;
                }
            }
            _ => {}
        }
    }

    let measure_end = keeper.measure_end();
    for &i in &right_barlines {
        if let Some(barline) = measure.objects.get_mut(i) {
            barline.time = measure_end;
        }
    }
    if right_barlines.is_empty() {
        let id = ctx.new_id();
        measure.objects.push(StaffObj {
            id,
            kind: StaffObjKind::Barline(Barline { style: BarlineStyle::Regular }),
            staff: 0,
            voice: 1,
            time: measure_end,
            visible: true,
        });
    }

    measure
}

// ─── Attributes ──────────────────────────────────────────────────────

fn parse_attributes(
    node: &Node,
    state: &mut PartState,
    keeper: &TimeKeeper,
    measure: &mut MeasureContent,
    ctx: &mut ParseContext,
) {
    let time = keeper.now();
    // <staves> may come after <key>/<time>, which apply to every staff
    if let Some(staves) = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "staves")
        .and_then(|n| parse_i32(&n))
    {
        state.num_staves = staves.max(1) as usize;
    }

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "divisions" => {
                let d = parse_i32(&child).unwrap_or(1);
                if d <= 0 {
                    ctx.reporter.warn(None, format!("invalid divisions {d}, using 1"));
                    state.divisions = 1.0;
                } else {
                    state.divisions = d as f64;
                }
            }
            "key" => {
                let fifths = child
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "fifths")
                    .and_then(|n| parse_i32(&n))
                    .unwrap_or(0);
                for staff in staves_for(&child, state) {
                    let id = ctx.new_id();
                    measure.objects.push(StaffObj {
                        id,
                        kind: StaffObjKind::Key(KeySignature { fifths }),
                        staff,
                        voice: 1,
                        time,
                        visible: child.attribute("print-object") != Some("no"),
                    });
                }
            }
            "time" => {
                let mut ts = TimeSignature { beats: 4, beat_type: 4 };
                for t in child.children().filter(|n| n.is_element()) {
                    match t.tag_name().name() {
                        "beats" => ts.beats = parse_i32(&t).unwrap_or(4),
                        "beat-type" => ts.beat_type = parse_i32(&t).unwrap_or(4),
                        _ => {}
                    }
                }
                for staff in staves_for(&child, state) {
                    let id = ctx.new_id();
                    measure.objects.push(StaffObj {
                        id,
                        kind: StaffObjKind::Time(ts.clone()),
                        staff,
                        voice: 1,
                        time,
                        visible: child.attribute("print-object") != Some("no"),
                    });
                }
            }
            "clef" => {
                let staff = child
                    .attribute("number")
                    .and_then(|n| n.parse::<usize>().ok())
                    .unwrap_or(1)
                    .saturating_sub(1);
                let clef = parse_clef(&child, ctx);
                let id = ctx.new_id();
                measure.objects.push(StaffObj {
                    id,
                    kind: StaffObjKind::Clef(clef),
                    staff,
                    voice: 1,
                    time,
                    visible: child.attribute("print-object") != Some("no"),
                });
            }
            _ => {}
        }
    }
}

/// Staves a key or time element applies to: the one named by its
/// `number` attribute, or all of them.
fn staves_for(node: &Node, state: &PartState) -> Vec<usize> {
    match node.attribute("number").and_then(|n| n.parse::<usize>().ok()) {
        Some(n) => vec![n.saturating_sub(1)],
        None => (0..state.num_staves).collect(),
    }
}

fn parse_clef(node: &Node, ctx: &mut ParseContext) -> Clef {
    let mut clef = Clef { sign: ClefSign::G, line: 2, octave_change: 0 };
    let mut line_given = false;
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "sign" => {
                clef.sign = match child.text().unwrap_or("G").trim() {
                    "G" => ClefSign::G,
                    "F" => ClefSign::F,
                    "C" => ClefSign::C,
                    "percussion" => ClefSign::Percussion,
                    other => {
                        ctx.reporter.warn(None, format!("unknown clef sign '{other}', using G"));
                        ClefSign::G
                    }
                };
            }
            "line" => {
                clef.line = parse_i32(&child).unwrap_or(2);
                line_given = true;
            }
            "clef-octave-change" => clef.octave_change = parse_i32(&child).unwrap_or(0),
            _ => {}
        }
    }
    if !line_given {
        clef.line = match clef.sign {
            ClefSign::F => 4,
            ClefSign::C | ClefSign::Percussion => 3,
            ClefSign::G => 2,
        };
    }
    clef
}

// ─── Note ────────────────────────────────────────────────────────────

fn parse_note(
    node: &Node,
    state: &PartState,
    keeper: &mut TimeKeeper,
    ctx: &mut ParseContext,
) -> StaffObj {
    let mut pitch = Pitch { step: 'B', octave: 4, alter: 0 };
    let mut duration = 0.0;
    let mut rest: Option<bool> = None;
    let mut chord = false;
    let mut grace = false;
    let mut dots = 0;
    let mut accidental = false;
    let mut note_type = None;

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "pitch" => pitch = parse_pitch(&child, "step", "octave"),
            "unpitched" => pitch = parse_pitch(&child, "display-step", "display-octave"),
            "duration" => duration = parse_duration_value(&child, state),
            "rest" => rest = Some(child.attribute("measure") == Some("yes")),
            "chord" => chord = true,
            "grace" => grace = true,
            "dot" => dots += 1,
            "accidental" => accidental = true,
            "type" => note_type = child.text().map(|t| t.trim().to_string()),
            _ => {}
        }
    }

    let (staff, voice) = parse_staff_and_voice(node);
    let time = keeper.note_onset(duration, chord, grace);
    let kind = match rest {
        Some(full_measure) => StaffObjKind::Rest(Rest { duration, full_measure }),
        None => StaffObjKind::Note(Note {
            pitch,
            duration,
            grace,
            chord,
            dots,
            accidental,
            note_type,
        }),
    };

    StaffObj {
        id: ctx.new_id(),
        kind,
        staff,
        voice,
        time,
        visible: node.attribute("print-object") != Some("no"),
    }
}

fn parse_pitch(node: &Node, step_tag: &str, octave_tag: &str) -> Pitch {
    let mut pitch = Pitch { step: 'C', octave: 4, alter: 0 };
    for child in node.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name();
        if name == step_tag {
            pitch.step = child
                .text()
                .and_then(|t| t.trim().chars().next())
                .unwrap_or('C');
        } else if name == octave_tag {
            pitch.octave = parse_i32(&child).unwrap_or(4);
        } else if name == "alter" {
            pitch.alter = parse_f64(&child).map_or(0, |a| a.round() as i32);
        }
    }
    pitch
}

// ─── Barline ─────────────────────────────────────────────────────────

fn parse_barline(node: &Node) -> Barline {
    let mut style = BarlineStyle::Regular;
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "bar-style" => {
                style = match child.text().unwrap_or("").trim() {
                    "none" => BarlineStyle::Hidden,
                    "light-light" => BarlineStyle::Double,
                    "light-heavy" => BarlineStyle::Final,
                    _ => BarlineStyle::Regular,
                };
            }
            "repeat" => {
                style = match child.attribute("direction") {
                    Some("forward") => BarlineStyle::StartRepeat,
                    _ => BarlineStyle::EndRepeat,
                };
            }
            _ => {}
        }
    }
    Barline { style }
}

// ─── Direction ───────────────────────────────────────────────────────

fn parse_direction(node: &Node, keeper: &TimeKeeper, ctx: &mut ParseContext) -> Option<StaffObj> {
    let words: Vec<&str> = node
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "words")
        .filter_map(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }
    let (staff, voice) = parse_staff_and_voice(node);
    Some(StaffObj {
        id: ctx.new_id(),
        kind: StaffObjKind::Direction(Direction { words: words.join(" ") }),
        staff,
        voice,
        time: keeper.now(),
        visible: true,
    })
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn parse_staff_and_voice(node: &Node) -> (usize, u32) {
    let mut staff = 0;
    let mut voice = 1;
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "staff" => staff = parse_i32(&child).unwrap_or(1).max(1) as usize - 1,
            "voice" => voice = parse_i32(&child).unwrap_or(1).max(1) as u32,
            _ => {}
        }
    }
    (staff, voice)
}

fn parse_duration(node: &Node, state: &PartState) -> TimeUnits {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == "duration")
        .map_or(0.0, |n| parse_duration_value(&n, state))
}

fn parse_duration_value(node: &Node, state: &PartState) -> TimeUnits {
    parse_f64(node).unwrap_or(0.0).max(0.0) / state.divisions
}

fn parse_i32(node: &Node) -> Option<i32> {
    node.text().and_then(|t| t.trim().parse().ok())
}

fn parse_f64(node: &Node) -> Option<f64> {
    node.text().and_then(|t| t.trim().parse().ok())
}
