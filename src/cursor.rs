//! Linear table of staff objects and the cursor that walks it.
//!
//! [`ColStaffObjs::from_score`] flattens a [`Score`] into absolute time:
//! measure `m` starts where the longest instrument finished measure
//! `m - 1`. Entries are grouped by measure, then ordered by time with a
//! stable sort. At the same instant clefs, keys and time signatures of
//! every instrument come first; everything else keeps its source order.

use serde::Serialize;

use crate::model::*;

/// Identifier of an entry inside a [`ColStaffObjs`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryId(pub usize);

/// One staff object placed in the score timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColStaffObjsEntry {
    pub entry_id: EntryId,
    /// Measure index (0-based)
    pub measure: usize,
    /// Instrument index (0-based)
    pub instr: usize,
    /// Staff index inside the instrument, as declared by the source
    pub staff: usize,
    pub voice: u32,
    /// Absolute time
    pub time: TimeUnits,
    pub obj: StaffObj,
}

impl ColStaffObjsEntry {
    pub fn end_time(&self) -> TimeUnits {
        self.time + self.obj.kind.duration()
    }
}

/// Staff objects of a whole score, in the order the column builder
/// must consume them.
#[derive(Debug, Clone, Default)]
pub struct ColStaffObjs {
    entries: Vec<ColStaffObjsEntry>,
    staves_per_instr: Vec<usize>,
    /// First object id not used by any entry
    next_obj_id: u32,
}

impl ColStaffObjs {
    /// Empty table for a score whose instruments have the given staff
    /// counts.
    pub fn new(staves_per_instr: Vec<usize>) -> Self {
        Self { entries: Vec::new(), staves_per_instr, next_obj_id: 0 }
    }

    /// Build the table for a complete score.
    pub fn from_score(score: &Score) -> Self {
        let mut table = Self::new(score.instruments.iter().map(|i| i.num_staves).collect());
        let mut measure_start = 0.0;
        table.next_obj_id = score
            .instruments
            .iter()
            .flat_map(|i| i.measures.iter())
            .flat_map(|mc| mc.objects.iter())
            .map(|o| o.id.0.saturating_add(1))
            .max()
            .unwrap_or(0);

        for m in 0..score.measure_count() {
            if m > 0 && score.instruments.iter().any(|i| i.measures.get(m).is_some_and(|mc| mc.new_system)) {
                let id = table.new_obj_id();
                table.push(m - 1, 0, measure_start, StaffObj {
                    id,
                    kind: StaffObjKind::SystemBreak,
                    staff: 0,
                    voice: 1,
                    time: 0.0,
                    visible: false,
                });
            }

            let first = table.entries.len();
            let mut measure_len: TimeUnits = 0.0;
            for (instr, instrument) in score.instruments.iter().enumerate() {
                let Some(content) = instrument.measures.get(m) else { continue };
                for obj in &content.objects {
                    measure_len = measure_len.max(obj.time + obj.kind.duration());
                    table.push(m, instr, measure_start + obj.time, obj.clone());
                }
            }
            table.entries[first..].sort_by(|a, b| {
                a.time
                    .partial_cmp(&b.time)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| prolog_rank(a).cmp(&prolog_rank(b)))
            });
            for (i, e) in table.entries[first..].iter_mut().enumerate() {
                e.entry_id = EntryId(first + i);
            }
            measure_start += measure_len;
        }

        table
    }

    /// Append an entry. The table keeps the order of the calls.
    pub fn push(&mut self, measure: usize, instr: usize, time: TimeUnits, obj: StaffObj) -> EntryId {
        let entry_id = EntryId(self.entries.len());
        self.next_obj_id = self.next_obj_id.max(obj.id.0.saturating_add(1));
        self.entries.push(ColStaffObjsEntry {
            entry_id,
            measure,
            instr,
            staff: obj.staff,
            voice: obj.voice,
            time,
            obj,
        });
        entry_id
    }

    /// Id for an object synthesized by the table itself.
    fn new_obj_id(&mut self) -> ObjId {
        let id = ObjId(self.next_obj_id);
        self.next_obj_id = self.next_obj_id.saturating_add(1);
        id
    }

    pub fn entries(&self) -> &[ColStaffObjsEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&ColStaffObjsEntry> {
        self.entries.get(id.0)
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_instruments(&self) -> usize {
        self.staves_per_instr.len()
    }

    pub fn num_staves(&self, instr: usize) -> usize {
        self.staves_per_instr.get(instr).copied().unwrap_or(1)
    }

    pub fn staves_per_instr(&self) -> &[usize] {
        &self.staves_per_instr
    }

    pub fn cursor(&self) -> StaffObjsCursor<'_> {
        StaffObjsCursor { entries: &self.entries, pos: 0 }
    }
}

// clefs, keys and time signatures go first among objects at the same time
fn prolog_rank(entry: &ColStaffObjsEntry) -> u8 {
    if entry.obj.kind.is_prolog_candidate() {
        0
    } else {
        1
    }
}

/// Forward-only cursor over a [`ColStaffObjs`] table.
#[derive(Debug, Clone)]
pub struct StaffObjsCursor<'a> {
    entries: &'a [ColStaffObjsEntry],
    pos: usize,
}

impl<'a> StaffObjsCursor<'a> {
    pub fn is_end(&self) -> bool {
        self.pos >= self.entries.len()
    }

    pub fn peek(&self) -> Option<&'a ColStaffObjsEntry> {
        self.entries.get(self.pos)
    }

    pub fn next_entry(&mut self) -> Option<&'a ColStaffObjsEntry> {
        let entry = self.entries.get(self.pos)?;
        self.pos += 1;
        Some(entry)
    }

    /// Number of entries already consumed.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for StaffObjsCursor<'a> {
    type Item = &'a ColStaffObjsEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(id: u32, kind: StaffObjKind, time: TimeUnits, voice: u32) -> StaffObj {
        StaffObj { id: ObjId(id), kind, staff: 0, voice, time, visible: true }
    }

    fn rest(d: TimeUnits) -> StaffObjKind {
        StaffObjKind::Rest(Rest { duration: d, full_measure: false })
    }

    fn barline() -> StaffObjKind {
        StaffObjKind::Barline(Barline { style: BarlineStyle::Regular })
    }

    fn two_instrument_score() -> Score {
        let mut score = Score::new();
        let mut a = Instrument::new("P1", "Flute", 1);
        a.measures.push(MeasureContent {
            number: 1,
            new_system: false,
            objects: vec![obj(0, rest(1.0), 0.0, 1), obj(1, rest(1.0), 1.0, 1), obj(2, barline(), 2.0, 1)],
        });
        a.measures.push(MeasureContent {
            number: 2,
            new_system: true,
            objects: vec![obj(3, rest(3.0), 0.0, 1), obj(4, barline(), 3.0, 1)],
        });
        let mut b = Instrument::new("P2", "Cello", 1);
        b.measures.push(MeasureContent {
            number: 1,
            new_system: false,
            objects: vec![obj(5, rest(2.0), 0.0, 1), obj(6, barline(), 2.0, 1)],
        });
        score.instruments = vec![a, b];
        score
    }

    #[test]
    fn absolute_times_follow_measure_lengths() {
        let table = ColStaffObjs::from_score(&two_instrument_score());
        let times: Vec<(usize, f64)> = table.entries().iter().map(|e| (e.instr, e.time)).collect();
        assert_eq!(
            times,
            vec![(0, 0.0), (1, 0.0), (0, 1.0), (0, 2.0), (1, 2.0), (0, 2.0), (0, 2.0), (0, 5.0)]
        );
        // the system break closes measure 0
        assert!(matches!(table.entries()[5].obj.kind, StaffObjKind::SystemBreak));
        assert_eq!(table.entries()[5].measure, 0);
    }

    #[test]
    fn entry_ids_match_positions() {
        let table = ColStaffObjs::from_score(&two_instrument_score());
        for (i, e) in table.entries().iter().enumerate() {
            assert_eq!(e.entry_id, EntryId(i));
        }
    }

    #[test]
    fn cursor_walks_every_entry_once() {
        let table = ColStaffObjs::from_score(&two_instrument_score());
        let mut cursor = table.cursor();
        assert!(cursor.peek().is_some());
        let n = cursor.by_ref().count();
        assert_eq!(n, table.num_entries());
        assert!(cursor.is_end());
        assert!(cursor.next_entry().is_none());
    }

    #[test]
    fn prolog_objects_of_all_instruments_come_first() {
        let clef = StaffObjKind::Clef(Clef { sign: ClefSign::G, line: 2, octave_change: 0 });
        let mut score = Score::new();
        for (n, id) in [(0u32, "P1"), (10u32, "P2")] {
            let mut inst = Instrument::new(id, id, 1);
            inst.measures.push(MeasureContent {
                number: 1,
                new_system: false,
                objects: vec![obj(n, clef.clone(), 0.0, 1), obj(n + 1, rest(1.0), 0.0, 1)],
            });
            score.instruments.push(inst);
        }
        let table = ColStaffObjs::from_score(&score);
        let kinds: Vec<(usize, &str)> =
            table.entries().iter().map(|e| (e.instr, e.obj.kind.name())).collect();
        assert_eq!(kinds, vec![(0, "clef"), (1, "clef"), (0, "rest"), (1, "rest")]);
    }

    #[test]
    fn system_breaks_get_fresh_object_ids() {
        let mut score = two_instrument_score();
        let mut third = score.instruments[0].measures[1].clone();
        third.number = 3;
        third.objects = vec![obj(7, rest(1.0), 0.0, 1), obj(8, barline(), 1.0, 1)];
        score.instruments[0].measures.push(third);
        score.instruments[1].measures.push(MeasureContent {
            number: 2,
            new_system: false,
            objects: vec![obj(9, rest(3.0), 0.0, 1)],
        });
        let table = ColStaffObjs::from_score(&score);
        let breaks: Vec<ObjId> = table
            .entries()
            .iter()
            .filter(|e| matches!(e.obj.kind, StaffObjKind::SystemBreak))
            .map(|e| e.obj.id)
            .collect();
        assert_eq!(breaks, vec![ObjId(10), ObjId(11)]);
        let mut ids: Vec<ObjId> = table.entries().iter().map(|e| e.obj.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), table.num_entries());
    }

    #[test]
    fn empty_score_gives_empty_table() {
        let table = ColStaffObjs::from_score(&Score::new());
        assert!(table.is_empty());
        assert!(table.cursor().is_end());
    }
}
