//! Per-column storage: collected entries, context snapshots, voice time
//! shifts, slice boxes and the spacing computed for the column.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::cursor::{ColStaffObjsEntry, EntryId};
use crate::graphics::{BoxSlice, BoxSliceInstr, ShapeId};
use crate::model::*;

use super::constants::NUM_PROLOG_SLOTS;

// ═══════════════════════════════════════════════════════════════════════
// Column state
// ═══════════════════════════════════════════════════════════════════════

/// Measurement phase of a column. Phases only move forward, except that
/// including a new object in a measured column sends it back to
/// `Collecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ColumnPhase {
    Open,
    Collecting,
    Closed,
    Measured,
    Justified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TraceLevel {
    #[default]
    Off,
    /// Log every collected entry
    Entries,
    /// Also dump the computed spacing
    Spacing,
    All,
}

/// A clef or key signature in effect on one staff.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub entry: ColStaffObjsEntry,
    /// Footprint width of its shape, 0 when it draws nothing
    pub width: LUnits,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    pub clef: Option<ContextEntry>,
    pub key: Option<ContextEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoiceShiftKind {
    /// Implicit filler: the voice jumped ahead of its running time
    GoForward,
    /// The voice stream moved back in time
    Backup,
}

/// A jump in a voice's running time detected while collecting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceTimeShift {
    pub instr: usize,
    pub voice: u32,
    pub kind: VoiceShiftKind,
    pub from: TimeUnits,
    pub to: TimeUnits,
}

impl VoiceTimeShift {
    pub fn gap(&self) -> TimeUnits {
        (self.to - self.from).abs()
    }
}

/// One staff object recorded in a column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnEntry {
    pub entry_id: EntryId,
    pub obj_id: ObjId,
    pub kind: StaffObjKind,
    pub instr: usize,
    /// Staff inside the instrument, already clamped to a valid staff
    pub staff: usize,
    pub voice: u32,
    /// Line inside the instrument, one per (staff, voice)
    pub line: usize,
    /// Absolute time
    pub time: TimeUnits,
    pub duration: TimeUnits,
    pub in_prolog: bool,
    pub shape: Option<ShapeId>,
    /// Footprint recorded when the entry was included; kept after its
    /// shape is released
    pub width: LUnits,
    pub anchor: LUnits,
    /// Time position the entry is aligned to (`None` for prolog entries)
    pub position: Option<usize>,
    /// Alignment point, relative to the column left edge
    pub x: LUnits,
}

impl ColumnEntry {
    /// Notes (including grace notes), rests and explicit spacers.
    pub fn is_timed(&self) -> bool {
        self.kind.is_timed() || matches!(self.kind, StaffObjKind::GoFwd { .. })
    }

    pub fn is_grace(&self) -> bool {
        self.kind.is_grace()
    }

    pub fn right_extent(&self) -> LUnits {
        (self.width - self.anchor).max(0.0)
    }

    /// Objects drawn at their time position without taking horizontal room.
    pub fn is_floating(&self) -> bool {
        matches!(
            self.kind,
            StaffObjKind::Direction(_) | StaffObjKind::GoFwd { .. } | StaffObjKind::SystemBreak
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Computed spacing
// ═══════════════════════════════════════════════════════════════════════

/// A time instant of the column where entries align.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePosition {
    pub time: TimeUnits,
    /// Alignment point, relative to the column left edge
    pub x: LUnits,
    /// Stretchable distance to the next position (or to the column end
    /// for the last one)
    pub spring: LUnits,
    /// Some timed entry starts here
    pub has_timed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnSpacing {
    /// Fixed space before the first object
    pub leading: LUnits,
    /// Start of each prolog slot (clef, key, time), relative to the
    /// column left edge
    pub prolog_slots: [LUnits; NUM_PROLOG_SLOTS],
    /// Width taken by each prolog slot, gap included
    pub prolog_slot_widths: [LUnits; NUM_PROLOG_SLOTS],
    pub prolog_width: LUnits,
    pub positions: Vec<TimePosition>,
    pub width: LUnits,
    /// Space reserved after the last object for the duration of the last
    /// event; dropped when the column ends a system
    pub trailing: LUnits,
    pub end_time: TimeUnits,
}

impl ColumnSpacing {
    pub fn trimmed_width(&self) -> LUnits {
        (self.width - self.trailing).max(0.0)
    }

    pub fn total_springs(&self) -> LUnits {
        self.positions.iter().map(|p| p.spring).sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ColumnData
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ColumnData {
    pub index: usize,
    pub phase: ColumnPhase,
    pub start_time: TimeUnits,
    /// Provisional left edge, fixed by the spacing pass
    pub x_start: LUnits,
    /// Fixed leading space
    pub fixed_space: LUnits,
    pub entries: Vec<ColumnEntry>,
    /// Clef/key snapshots saved in this column, by (instrument, staff)
    pub context: HashMap<(usize, usize), ContextSnapshot>,
    /// Clef/key in effect when the column started, by (instrument, staff)
    pub inherited: HashMap<(usize, usize), ContextSnapshot>,
    pub has_system_break: bool,
    pub has_barline: bool,
    pub barline_visible: bool,
    pub voice_shifts: Vec<VoiceTimeShift>,
    pub slice: Option<BoxSlice>,
    /// The slice was placed by the system layout
    pub slice_positioned: bool,
    pub slice_instrs: Vec<BoxSliceInstr>,
    pub trace: TraceLevel,
    pub spacing: Option<ColumnSpacing>,
    /// Spacing after justification
    pub justified: Option<ColumnSpacing>,
}

impl ColumnData {
    pub fn new(index: usize, start_time: TimeUnits) -> Self {
        Self {
            index,
            phase: ColumnPhase::Open,
            start_time,
            x_start: 0.0,
            fixed_space: 0.0,
            entries: Vec::new(),
            context: HashMap::new(),
            inherited: HashMap::new(),
            has_system_break: false,
            has_barline: false,
            barline_visible: false,
            voice_shifts: Vec::new(),
            slice: None,
            slice_positioned: false,
            slice_instrs: Vec::new(),
            trace: TraceLevel::Off,
            spacing: None,
            justified: None,
        }
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn prolog_entries(&self) -> impl Iterator<Item = &ColumnEntry> {
        self.entries.iter().filter(|e| e.in_prolog)
    }

    /// Measured width, 0 before measurement.
    pub fn width(&self) -> LUnits {
        self.spacing.as_ref().map_or(0.0, |s| s.width)
    }

    /// Width after justification, or the measured width.
    pub fn final_width(&self) -> LUnits {
        self.justified.as_ref().or(self.spacing.as_ref()).map_or(0.0, |s| s.width)
    }

    pub fn trimmed_width(&self) -> LUnits {
        self.spacing.as_ref().map_or(0.0, ColumnSpacing::trimmed_width)
    }

    /// Final alignment x of an entry, relative to the column left edge.
    pub fn entry_final_x(&self, entry: &ColumnEntry) -> LUnits {
        let (Some(base), Some(justified), Some(pos)) =
            (self.spacing.as_ref(), self.justified.as_ref(), entry.position)
        else {
            return entry.x;
        };
        match (base.positions.get(pos), justified.positions.get(pos)) {
            (Some(b), Some(j)) => entry.x + (j.x - b.x),
            _ => entry.x,
        }
    }

    /// Store a context snapshot, replacing any previous one for the staff.
    pub fn save_context(
        &mut self,
        instr: usize,
        staff: usize,
        clef: Option<ContextEntry>,
        key: Option<ContextEntry>,
    ) {
        self.context.insert((instr, staff), ContextSnapshot { clef, key });
    }

    pub fn context_clef(&self, instr: usize, staff: usize) -> Option<&ContextEntry> {
        self.context.get(&(instr, staff)).and_then(|c| c.clef.as_ref())
    }

    pub fn context_key(&self, instr: usize, staff: usize) -> Option<&ContextEntry> {
        self.context.get(&(instr, staff)).and_then(|c| c.key.as_ref())
    }

    /// Drop cached spacing; the column must be measured again.
    pub fn invalidate_spacing(&mut self) {
        self.spacing = None;
        self.justified = None;
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Debug dump
// ═══════════════════════════════════════════════════════════════════════

/// Write a human readable description of a column.
pub fn dump_column_data(col: &ColumnData, out: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(
        out,
        "column {} phase={:?} start_time={:.3} x_start={:.2} fixed_space={:.2}",
        col.index, col.phase, col.start_time, col.x_start, col.fixed_space
    )?;
    writeln!(
        out,
        "  barline={} visible={} system_break={}",
        col.has_barline, col.barline_visible, col.has_system_break
    )?;
    for e in &col.entries {
        writeln!(
            out,
            "  [{:>4}] {:<10} instr={} staff={} voice={} line={} time={:.3} dur={:.3} prolog={} w={:.2} x={:.2}",
            e.entry_id.0,
            e.kind.name(),
            e.instr,
            e.staff,
            e.voice,
            e.line,
            e.time,
            e.duration,
            e.in_prolog,
            e.width,
            e.x
        )?;
    }

    let mut staves: Vec<&(usize, usize)> = col.context.keys().collect();
    staves.sort();
    for key in staves {
        let snapshot = &col.context[key];
        writeln!(
            out,
            "  context instr={} staff={} clef={} key={}",
            key.0,
            key.1,
            snapshot.clef.as_ref().map_or("-".to_string(), |c| c.entry.entry_id.0.to_string()),
            snapshot.key.as_ref().map_or("-".to_string(), |k| k.entry.entry_id.0.to_string()),
        )?;
    }

    for shift in &col.voice_shifts {
        writeln!(
            out,
            "  voice shift instr={} voice={} {:?} {:.3} -> {:.3}",
            shift.instr, shift.voice, shift.kind, shift.from, shift.to
        )?;
    }

    if let Some(sp) = &col.spacing {
        writeln!(
            out,
            "  spacing leading={:.2} prolog={:.2} width={:.2} trailing={:.2} trimmed={:.2}",
            sp.leading,
            sp.prolog_width,
            sp.width,
            sp.trailing,
            sp.trimmed_width()
        )?;
        for p in &sp.positions {
            writeln!(
                out,
                "    t={:.3} x={:.2} spring={:.2} timed={}",
                p.time, p.x, p.spring, p.has_timed
            )?;
        }
    }
    Ok(())
}
