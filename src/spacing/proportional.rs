//! Duration proportional spacing.
//!
//! The prolog (clef, key, time signature) is laid out first in slots
//! aligned across all staves. The remaining entries are grouped by time
//! into positions; consecutive positions are separated by the larger of
//! the collision distance and the proportional space of the time between
//! them. Non-timed objects (barlines, clef changes) and grace notes are
//! stacked to the left of the notes sharing their time.

use std::collections::{BTreeMap, HashMap};

use crate::model::*;
use crate::options::SpacingOptions;

use super::column_data::*;
use super::constants::*;
use super::ColumnSpacer;

type StaffKey = (usize, usize);

/// Room needed by the objects of one staff at one time position.
#[derive(Debug, Clone, Copy, Default)]
struct StaffExtent {
    /// Non-timed objects, each followed by the minimum gap
    stack: LUnits,
    /// Grace notes, each followed by the minimum gap
    grace: LUnits,
    /// Largest distance from a left edge to its alignment point
    anchor: LUnits,
    /// Largest extent to the right of the alignment point
    right: LUnits,
    has_timed: bool,
}

impl StaffExtent {
    fn left(&self) -> LUnits {
        self.stack + self.grace + self.anchor
    }
}

fn prolog_slot(kind: &StaffObjKind) -> Option<usize> {
    match kind {
        StaffObjKind::Clef(_) => Some(PROLOG_SLOT_CLEF),
        StaffObjKind::Key(_) => Some(PROLOG_SLOT_KEY),
        StaffObjKind::Time(_) => Some(PROLOG_SLOT_TIME),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProportionalSpacer {
    options: SpacingOptions,
}

impl ProportionalSpacer {
    pub fn new(options: SpacingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpacingOptions {
        &self.options
    }

    fn compute_spacing(&self, col: &mut ColumnData) -> ColumnSpacing {
        let opts = &self.options;
        let min = opts.min_space_between_objects;
        let leading = col.fixed_space;
        let mut sp = ColumnSpacing { leading, end_time: col.start_time, ..Default::default() };

        // ── Prolog slots ──
        let mut slot_max = [0.0f64; NUM_PROLOG_SLOTS];
        for e in col.entries.iter().filter(|e| e.in_prolog) {
            if let Some(slot) = prolog_slot(&e.kind) {
                slot_max[slot] = slot_max[slot].max(e.width);
            }
        }
        let mut x = leading;
        for slot in 0..NUM_PROLOG_SLOTS {
            sp.prolog_slots[slot] = x;
            if slot_max[slot] > 0.0 {
                sp.prolog_slot_widths[slot] = slot_max[slot] + opts.prolog_gap;
                x += sp.prolog_slot_widths[slot];
            }
        }
        sp.prolog_width = x - leading;
        let content_start = x;

        // ── Time positions ──
        let mut times: Vec<TimeUnits> =
            col.entries.iter().filter(|e| !e.in_prolog).map(|e| e.time).collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        times.dedup_by(|a, b| is_equal_time(*a, *b));

        let mut extents: Vec<BTreeMap<StaffKey, StaffExtent>> = vec![BTreeMap::new(); times.len()];
        let mut has_timed = vec![false; times.len()];

        for e in col.entries.iter_mut() {
            if e.in_prolog {
                e.position = None;
                e.x = prolog_slot(&e.kind).map_or(content_start, |s| sp.prolog_slots[s]) + e.anchor;
                continue;
            }
            let pos = times.iter().position(|&t| is_equal_time(t, e.time)).unwrap_or(0);
            e.position = Some(pos);
            sp.end_time = sp.end_time.max(e.time + e.duration);
            if e.is_timed() && !e.is_grace() {
                has_timed[pos] = true;
            }
            if e.width <= 0.0 || e.is_floating() {
                continue;
            }
            let ext = extents[pos].entry((e.instr, e.staff)).or_default();
            if e.is_grace() {
                ext.grace += e.width + min;
            } else if e.is_timed() {
                ext.anchor = ext.anchor.max(e.anchor);
                ext.right = ext.right.max(e.right_extent());
                ext.has_timed = true;
            } else {
                ext.stack += e.width + min;
            }
        }

        let mut staff_right: HashMap<StaffKey, LUnits> = HashMap::new();
        let mut reach = content_start;
        let mut prev_x: Option<LUnits> = None;
        // latest position where a note or rest starts
        let mut last_onset: Option<(TimeUnits, LUnits)> = None;

        for (i, &t) in times.iter().enumerate() {
            let mut x = content_start;
            if let Some(px) = prev_x {
                x = x.max(px);
            }
            if let Some((ot, ox)) = last_onset {
                x = x.max(ox + opts.space_for_duration(t - ot));
            }
            for (staff, ext) in &extents[i] {
                let edge = staff_right.get(staff).map_or(content_start, |r| r + min);
                x = x.max(edge + ext.left());
            }
            for (staff, ext) in &extents[i] {
                let right = if ext.has_timed { x + ext.right } else { x - ext.anchor - min };
                let slot = staff_right.entry(*staff).or_insert(right);
                *slot = slot.max(right);
            }
            if extents[i].is_empty() {
                reach = reach.max(x);
            }
            if let Some(last) = sp.positions.last_mut() {
                if last.has_timed {
                    last.spring = x - last.x;
                }
            }
            sp.positions.push(TimePosition { time: t, x, spring: 0.0, has_timed: has_timed[i] });
            prev_x = Some(x);
            if has_timed[i] {
                last_onset = Some((t, x));
            }
        }

        // ── Entry placement ──
        let mut stack_cursor: HashMap<(usize, StaffKey), LUnits> = HashMap::new();
        let mut grace_cursor: HashMap<(usize, StaffKey), LUnits> = HashMap::new();
        for e in col.entries.iter_mut().filter(|e| !e.in_prolog) {
            let Some(pos) = e.position else { continue };
            let px = sp.positions[pos].x;
            let key = (e.instr, e.staff);
            let ext = extents[pos].get(&key).copied().unwrap_or_default();
            let cursor = if (e.is_timed() && !e.is_grace()) || e.is_floating() {
                None
            } else if e.is_grace() {
                Some(grace_cursor.entry((pos, key)).or_insert(px - ext.anchor - ext.grace))
            } else {
                Some(stack_cursor.entry((pos, key)).or_insert(px - ext.left()))
            };
            match cursor {
                Some(c) => {
                    e.x = *c + e.anchor;
                    if e.width > 0.0 {
                        *c += e.width + min;
                    }
                }
                None => e.x = px,
            }
        }

        // ── Width and trailing space ──
        let mut width = staff_right.values().fold(content_start.max(reach), |w, &r| w.max(r));
        if let (Some(last), Some(ext)) = (sp.positions.last_mut(), extents.last()) {
            if last.has_timed && !col.has_barline {
                let right = ext.values().map(|e| e.right).fold(0.0, f64::max);
                let natural = last.x + right.max(opts.space_for_duration(sp.end_time - last.time));
                sp.trailing = (natural - (last.x + right)).max(0.0);
                last.spring = natural - last.x;
                width = width.max(natural);
            } else if let (false, Some((ot, ox))) = (col.has_barline, last_onset) {
                // only floating objects after the last onset
                width = width.max(ox + opts.space_for_duration(sp.end_time - ot));
            }
        }
        sp.width = width;
        sp
    }
}

impl ColumnSpacer for ProportionalSpacer {
    fn do_spacing(&mut self, col: &mut ColumnData) {
        let spacing = if col.entries.is_empty() {
            ColumnSpacing { end_time: col.start_time, ..Default::default() }
        } else {
            self.compute_spacing(col)
        };
        col.spacing = Some(spacing);
        col.justified = None;

        if col.trace >= TraceLevel::Spacing {
            let mut dump = String::new();
            if dump_column_data(col, &mut dump).is_ok() {
                log::trace!("[scorespacing] spacing computed\n{dump}");
            }
        }
    }

    fn penalty_factor(&self, col: &ColumnData) -> f32 {
        match (col.has_barline, col.barline_visible) {
            (true, true) => self.options.penalty_visible_barline,
            (true, false) => self.options.penalty_hidden_barline,
            (false, _) => self.options.penalty_no_barline,
        }
    }

    fn is_empty_column(&self, col: &ColumnData) -> bool {
        let rests_are_empty = self.options.full_measure_rest_is_empty;
        !col.entries
            .iter()
            .any(|e| e.width > 0.0 && !(rests_are_empty && e.kind.is_full_measure_rest()))
    }

    fn column_width(&self, col: &ColumnData, first_of_system: bool) -> LUnits {
        let width = col.width();
        if !first_of_system || col.spacing.is_none() {
            return width;
        }
        width + self.prolog_extra_space(col)
    }

    fn additional_space_before(&self, prev: Option<&ColumnData>, col: &ColumnData) -> LUnits {
        match prev {
            Some(p) if !p.has_barline && col.prolog_entries().any(|e| e.width > 0.0) => {
                self.options.column_separation
            }
            _ => 0.0,
        }
    }

    fn justify_column(&mut self, col: &mut ColumnData, increment: LUnits) {
        if col.spacing.is_none() {
            self.do_spacing(col);
        }
        let Some(base) = col.spacing.as_ref() else { return };
        let increment = increment.max(0.0);
        let total = base.total_springs();
        let n = base.positions.len();

        let mut justified = base.clone();
        let mut shift = 0.0;
        for (p, b) in justified.positions.iter_mut().zip(&base.positions) {
            let share = if total > 0.0 { increment * b.spring / total } else { increment / n as f64 };
            p.x += shift;
            p.spring += share;
            shift += share;
        }
        justified.width += increment;
        col.justified = Some(justified);
    }
}

impl ProportionalSpacer {
    /// Room to add when the column starts a system and must show the clefs
    /// and keys it inherits.
    fn prolog_extra_space(&self, col: &ColumnData) -> LUnits {
        let Some(sp) = col.spacing.as_ref() else { return 0.0 };
        let own_prolog = |slot: usize, key: &StaffKey| {
            col.prolog_entries()
                .any(|e| prolog_slot(&e.kind) == Some(slot) && (e.instr, e.staff) == *key)
        };

        let mut extra = 0.0;
        for slot in [PROLOG_SLOT_CLEF, PROLOG_SLOT_KEY] {
            let needed = col
                .inherited
                .iter()
                .filter(|(key, _)| !own_prolog(slot, key))
                .filter_map(|(_, snap)| match slot {
                    PROLOG_SLOT_CLEF => snap.clef.as_ref(),
                    _ => snap.key.as_ref(),
                })
                .map(|c| c.width)
                .fold(0.0, f64::max);
            if needed <= 0.0 {
                continue;
            }
            let own = sp.prolog_slot_widths[slot];
            if own <= 0.0 {
                extra += needed + self.options.prolog_gap;
            } else {
                extra += (needed + self.options.prolog_gap - own).max(0.0);
            }
        }
        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::EntryId;

    fn entry(kind: StaffObjKind, time: TimeUnits, width: LUnits, in_prolog: bool) -> ColumnEntry {
        let duration = kind.duration();
        ColumnEntry {
            entry_id: EntryId(0),
            obj_id: ObjId(0),
            kind,
            instr: 0,
            staff: 0,
            voice: 1,
            line: 0,
            time,
            duration,
            in_prolog,
            shape: None,
            width,
            anchor: 0.0,
            position: None,
            x: 0.0,
        }
    }

    fn quarter() -> StaffObjKind {
        StaffObjKind::Rest(Rest { duration: 1.0, full_measure: false })
    }

    fn clef() -> StaffObjKind {
        StaffObjKind::Clef(Clef { sign: ClefSign::G, line: 2, octave_change: 0 })
    }

    fn barline(style: BarlineStyle) -> StaffObjKind {
        StaffObjKind::Barline(Barline { style })
    }

    fn measured(entries: Vec<ColumnEntry>, has_barline: bool) -> (ProportionalSpacer, ColumnData) {
        let mut spacer = ProportionalSpacer::default();
        let mut col = ColumnData::new(0, 0.0);
        col.fixed_space = 8.0;
        col.entries = entries;
        col.has_barline = has_barline;
        col.barline_visible = has_barline;
        spacer.do_spacing(&mut col);
        (spacer, col)
    }

    #[test]
    fn empty_column_has_zero_spacing() {
        let (spacer, col) = measured(vec![], false);
        assert_eq!(col.width(), 0.0);
        assert_eq!(col.trimmed_width(), 0.0);
        assert!(spacer.is_empty_column(&col));
    }

    #[test]
    fn prolog_precedes_timed_content() {
        let (_, col) = measured(
            vec![entry(clef(), 0.0, 24.0, true), entry(quarter(), 0.0, 10.0, false)],
            false,
        );
        let sp = col.spacing.as_ref().unwrap();
        assert_eq!(sp.prolog_width, 30.0);
        assert_eq!(col.entries[0].x, 8.0);
        assert_eq!(col.entries[1].x, 38.0);
        // a lone quarter: width reaches its proportional space
        assert_eq!(sp.width, 38.0 + 35.0);
        assert_eq!(sp.trailing, 25.0);
    }

    #[test]
    fn positions_are_proportional_to_durations() {
        let (_, col) = measured(
            vec![
                entry(quarter(), 0.0, 10.0, false),
                entry(quarter(), 1.0, 10.0, false),
                entry(quarter(), 2.0, 10.0, false),
                entry(barline(BarlineStyle::Regular), 3.0, 1.0, false),
            ],
            true,
        );
        let sp = col.spacing.as_ref().unwrap();
        let xs: Vec<LUnits> = sp.positions.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![8.0, 43.0, 78.0, 113.0]);
        // barline sits before the last position, followed by nothing
        assert_eq!(col.entries[3].x, 108.0);
        assert_eq!(sp.width, 109.0);
        assert_eq!(sp.trailing, 0.0);
    }

    #[test]
    fn collisions_win_over_short_durations() {
        let short = StaffObjKind::Rest(Rest { duration: 0.125, full_measure: false });
        let (spacer, col) = measured(
            vec![entry(short.clone(), 0.0, 30.0, false), entry(short, 0.125, 30.0, false)],
            false,
        );
        let sp = col.spacing.as_ref().unwrap();
        assert_eq!(sp.positions[1].x - sp.positions[0].x, 30.0 + spacer.options().min_space_between_objects);
    }

    #[test]
    fn penalties_rank_barlines() {
        let (spacer, mut col) = measured(vec![entry(quarter(), 0.0, 10.0, false)], true);
        let visible = spacer.penalty_factor(&col);
        col.barline_visible = false;
        let hidden = spacer.penalty_factor(&col);
        col.has_barline = false;
        let none = spacer.penalty_factor(&col);
        assert!(visible < hidden && hidden < none);
    }

    #[test]
    fn full_measure_rest_policy() {
        let whole = StaffObjKind::Rest(Rest { duration: 4.0, full_measure: true });
        let entries = vec![
            entry(whole, 0.0, 12.0, false),
            entry(barline(BarlineStyle::Hidden), 4.0, 0.0, false),
        ];
        let (spacer, col) = measured(entries, true);
        assert!(!spacer.is_empty_column(&col));
        let lenient = ProportionalSpacer::new(SpacingOptions {
            full_measure_rest_is_empty: true,
            ..Default::default()
        });
        assert!(lenient.is_empty_column(&col));
    }

    #[test]
    fn justification_spreads_over_springs() {
        let (mut spacer, mut col) = measured(
            vec![
                entry(quarter(), 0.0, 10.0, false),
                entry(StaffObjKind::Rest(Rest { duration: 3.0, full_measure: false }), 1.0, 10.0, false),
                entry(barline(BarlineStyle::Regular), 4.0, 1.0, false),
            ],
            true,
        );
        let base = col.spacing.clone().unwrap();
        spacer.justify_column(&mut col, 30.0);
        let j = col.justified.as_ref().unwrap();
        assert_eq!(j.width, base.width + 30.0);
        let first_share = 30.0 * base.positions[0].spring / base.total_springs();
        assert!((j.positions[1].x - base.positions[1].x - first_share).abs() < 1e-9);
        assert!((j.positions[2].x - base.positions[2].x - 30.0).abs() < 1e-9);
    }

    #[test]
    fn grace_notes_widen_the_left_side() {
        let grace = StaffObjKind::Note(Note {
            pitch: Pitch { step: 'D', octave: 5, alter: 0 },
            duration: 0.0,
            grace: true,
            chord: false,
            dots: 0,
            accidental: false,
            note_type: Some("eighth".into()),
        });
        let (_, plain) = measured(vec![entry(quarter(), 0.0, 10.0, false)], false);
        let (_, graced) = measured(
            vec![entry(grace, 0.0, 7.0, false), entry(quarter(), 0.0, 10.0, false)],
            false,
        );
        assert_eq!(graced.entries[1].x - plain.entries[0].x, 11.0);
        assert_eq!(graced.entries[0].x, 8.0);
    }

    #[test]
    fn direction_inside_a_long_note_keeps_the_column_width() {
        let whole = || StaffObjKind::Rest(Rest { duration: 4.0, full_measure: false });
        let words = || StaffObjKind::Direction(Direction { words: "rit.".into() });
        for has_barline in [true, false] {
            let mut plain = vec![entry(whole(), 0.0, 12.0, false)];
            let mut marked = vec![entry(whole(), 0.0, 12.0, false), entry(words(), 2.0, 0.0, false)];
            if has_barline {
                plain.push(entry(barline(BarlineStyle::Regular), 4.0, 1.0, false));
                marked.push(entry(barline(BarlineStyle::Regular), 4.0, 1.0, false));
            }
            let (spacer, plain) = measured(plain, has_barline);
            let (_, marked) = measured(marked, has_barline);
            let full = 8.0 + spacer.options().space_for_duration(4.0);
            let p = plain.spacing.as_ref().unwrap();
            let m = marked.spacing.as_ref().unwrap();
            assert_eq!(m.width, p.width);
            if has_barline {
                assert_eq!(m.positions.last().unwrap().x, p.positions.last().unwrap().x);
                assert_eq!(m.positions.last().unwrap().x, full);
            } else {
                assert_eq!(m.width, full);
            }
        }
    }
}
