//! Single forward pass splitting the staff objects into columns.
//!
//! [`ColumnsBuilder::create_columns`] walks the cursor once. For every
//! entry it asks the column breaker whether a new column must start, then
//! collects the entry: staff clamping, voice time synchronization, prolog
//! detection, line assignment, shape creation and clef/key capture. All
//! state of the pass lives in a [`BuildSession`] owned by that call.

use std::collections::HashMap;

use crate::cursor::{ColStaffObjs, ColStaffObjsEntry};
use crate::graphics::{PartsEngraver, ShapeContext, ShapesCreator};
use crate::model::*;
use crate::options::SpacingOptions;
use crate::report::Reporter;

use super::algorithm::DebugOptions;
use super::breaker::{ColumnBreaker, OpenColumn};
use super::column_data::*;
use super::store::ColumnStore;
use super::ColumnSpacer;

type StaffKey = (usize, usize);

/// State of one `create_columns` pass.
#[derive(Debug, Default)]
struct BuildSession {
    current: Option<usize>,
    open: OpenColumn,
    /// A non-prolog object was collected in the open column
    seen_regular: bool,
    /// Running time of each (instrument, voice) in the open column
    voice_times: HashMap<(usize, u32), TimeUnits>,
    /// Line of each (instrument, staff, voice); lines are numbered per
    /// instrument in order of first appearance
    lines: HashMap<(usize, usize, u32), usize>,
    next_line: HashMap<usize, usize>,
    /// Clef/key in effect, carried across columns
    running_clefs: HashMap<StaffKey, ContextEntry>,
    running_keys: HashMap<StaffKey, ContextEntry>,
    /// Clef/key changes collected in the open column
    col_clefs: HashMap<StaffKey, ContextEntry>,
    col_keys: HashMap<StaffKey, ContextEntry>,
}

/// Collects the staff objects of a table into the columns of a
/// [`ColumnStore`], measuring them with the spacer `S`.
pub struct ColumnsBuilder<'b, S: ColumnSpacer> {
    pub(super) table: &'b ColStaffObjs,
    pub(super) store: &'b mut ColumnStore,
    pub(super) spacer: &'b mut S,
    pub(super) shapes_creator: &'b mut dyn ShapesCreator,
    pub(super) engraver: &'b dyn PartsEngraver,
    pub(super) breaker: &'b mut dyn ColumnBreaker,
    pub(super) reporter: &'b mut Reporter,
    pub(super) options: &'b SpacingOptions,
    pub(super) debug: DebugOptions,
}

impl<'b, S: ColumnSpacer> ColumnsBuilder<'b, S> {
    pub fn set_debug_options(&mut self, debug: DebugOptions) {
        self.debug = debug;
    }

    // ═══════════════════════════════════════════════════════════════════
    // Collection
    // ═══════════════════════════════════════════════════════════════════

    pub fn create_columns(&mut self) {
        if self.store.num_columns() > 0 {
            log::warn!("[scorespacing] columns already created, ignoring create_columns");
            return;
        }
        self.determine_staves_vertical_position();

        let table = self.table;
        let mut session = BuildSession::default();
        for entry in table.cursor() {
            let new_column = match session.current {
                None => true,
                Some(_) => self.breaker.must_start_new_column(entry, &session.open),
            };
            if new_column {
                if let Some(col) = session.current {
                    self.finish_column(col);
                }
                self.prepare_for_new_column(entry.time, &mut session);
            }
            self.collect_entry(entry, &mut session);
        }
        if let Some(col) = session.current {
            self.finish_column(col);
        }

        log::debug!(
            "[scorespacing] {} columns from {} staff objects",
            self.store.num_columns(),
            table.num_entries()
        );
    }

    fn determine_staves_vertical_position(&mut self) {
        let layout = self.engraver.staves_layout(self.table.staves_per_instr());
        self.store.set_staves_layout(layout);
    }

    fn prepare_for_new_column(&mut self, start_time: TimeUnits, session: &mut BuildSession) {
        let index = self.store.num_columns();
        let mut data = ColumnData::new(index, start_time);
        data.trace = self.debug.level_for(index);
        for (key, clef) in &session.running_clefs {
            data.inherited.entry(*key).or_default().clef = Some(clef.clone());
        }
        for (key, ks) in &session.running_keys {
            data.inherited.entry(*key).or_default().key = Some(ks.clone());
        }

        let fixed_space = self.determine_initial_fixed_space(index);
        self.spacer.start_column_measurements(&mut data, 0.0, fixed_space);
        let col = self.store.push_column(data);
        self.create_column_boxes(col);

        session.current = Some(col);
        session.open = OpenColumn::new(start_time);
        session.seen_regular = false;
        session.voice_times.clear();
        session.col_clefs.clear();
        session.col_keys.clear();
        log::debug!("[scorespacing] column {col} opened at t={start_time:.3}");
    }

    fn determine_initial_fixed_space(&self, col: usize) -> LUnits {
        if col == 0 {
            return self.options.space_before_prolog;
        }
        let after_barline = self.store.columns().get(col - 1).is_some_and(|c| c.has_barline);
        if after_barline {
            self.options.space_after_barline
        } else {
            self.options.min_space_between_objects
        }
    }

    fn create_column_boxes(&mut self, col: usize) {
        self.store.create_slice(col, 0.0, 0.0);
        for instr in 0..self.table.num_instruments() {
            let y_top = self.store.staves().instr_tops.get(instr).copied().unwrap_or(0.0);
            self.store.create_slice_instr(col, instr, y_top);
        }
    }

    fn finish_column(&mut self, col: usize) {
        if let Some(data) = self.store.column_mut(col) {
            let x_start = data.x_start;
            self.spacer.finish_column_measurements(data, x_start);
            log::debug!("[scorespacing] column {col} closed with {} entries", data.num_entries());
        }
    }

    fn collect_entry(&mut self, entry: &ColStaffObjsEntry, session: &mut BuildSession) {
        let Some(col) = session.current else { return };
        let kind = &entry.obj.kind;
        let instr = entry.instr;
        let staff = self.valid_staff(col, entry);

        self.synchronize_voice_time(col, entry, session);

        let in_prolog = !session.seen_regular
            && kind.is_prolog_candidate()
            && is_equal_time(entry.time, session.open.start_time);
        if !in_prolog {
            session.seen_regular = true;
        }

        let line = assign_line(session, instr, staff, entry.voice);

        // ── Shape ──
        let clef = session.running_clefs.get(&(instr, staff)).and_then(|c| match &c.entry.obj.kind {
            StaffObjKind::Clef(clef) => Some(clef),
            _ => None,
        });
        let ctx = ShapeContext {
            instr,
            staff,
            clef,
            staff_top: self.store.staves().staff_top(instr, staff),
            x: self.store.columns().get(col).map_or(0.0, |c| c.x_start + c.fixed_space),
        };
        let shape = self.shapes_creator.create_staffobj_shape(&entry.obj, &ctx);
        let (width, anchor) = shape.as_ref().map_or((0.0, 0.0), |s| (s.width, s.anchor));
        let shape = shape.map(|s| self.store.add_shape(col, instr, s));

        let column_entry = ColumnEntry {
            entry_id: entry.entry_id,
            obj_id: entry.obj.id,
            kind: kind.clone(),
            instr,
            staff,
            voice: entry.voice,
            line,
            time: entry.time,
            duration: kind.duration(),
            in_prolog,
            shape,
            width,
            anchor,
            position: None,
            x: 0.0,
        };
        if let Some(data) = self.store.column_mut(col) {
            self.spacer.include_object(data, column_entry);
        }

        let open = &mut session.open;
        open.num_entries += 1;
        open.max_time = open.max_time.max(entry.time);
        if kind.is_timed() && !kind.is_grace() {
            open.has_timed = true;
        }

        self.capture_context(col, entry, staff, width, session);
        self.check_column_end(col, entry, session);
    }

    /// Staff of the entry, clamped to the staves of its instrument.
    fn valid_staff(&mut self, col: usize, entry: &ColStaffObjsEntry) -> usize {
        let num_staves = self.table.num_staves(entry.instr).max(1);
        if entry.staff < num_staves {
            return entry.staff;
        }
        self.reporter.warn(
            Some(col),
            format!(
                "{} {} of instrument {} is on staff {} but the instrument has {} staves; moved to staff {}",
                entry.obj.kind.name(),
                entry.obj.id.0,
                entry.instr + 1,
                entry.staff + 1,
                num_staves,
                num_staves
            ),
        );
        num_staves - 1
    }

    /// Track the running time of the entry's voice, recording a go-forward
    /// filler or a backup when the voice jumps.
    fn synchronize_voice_time(&mut self, col: usize, entry: &ColStaffObjsEntry, session: &mut BuildSession) {
        let kind = &entry.obj.kind;
        let is_chord = matches!(kind, StaffObjKind::Note(n) if n.chord);
        let has_time = kind.is_timed() || matches!(kind, StaffObjKind::GoFwd { .. });
        if !has_time || is_chord {
            return;
        }

        let key = (entry.instr, entry.voice);
        let running = session.voice_times.get(&key).copied().unwrap_or(session.open.start_time);
        let target = entry.time.max(0.0);
        let shift = if is_greater_time(target, running) {
            Some(VoiceShiftKind::GoForward)
        } else if is_greater_time(running, target) {
            Some(VoiceShiftKind::Backup)
        } else {
            None
        };
        if let Some(shift_kind) = shift {
            log::trace!(
                "[scorespacing] column {col} voice {} of instrument {}: {shift_kind:?} {running:.3} -> {target:.3}",
                entry.voice,
                entry.instr
            );
            if let Some(data) = self.store.column_mut(col) {
                data.voice_shifts.push(VoiceTimeShift {
                    instr: entry.instr,
                    voice: entry.voice,
                    kind: shift_kind,
                    from: running,
                    to: target,
                });
            }
        }
        session.voice_times.insert(key, target + kind.duration());
    }

    fn capture_context(
        &mut self,
        col: usize,
        entry: &ColStaffObjsEntry,
        staff: usize,
        width: LUnits,
        session: &mut BuildSession,
    ) {
        let key = (entry.instr, staff);
        let mut snapshot = entry.clone();
        snapshot.staff = staff;
        let context = ContextEntry { entry: snapshot, width };

        match &entry.obj.kind {
            StaffObjKind::Clef(_) => {
                session.running_clefs.insert(key, context.clone());
                session.col_clefs.insert(key, context);
            }
            StaffObjKind::Key(_) => {
                session.running_keys.insert(key, context.clone());
                session.col_keys.insert(key, context);
            }
            _ => return,
        }
        self.store.save_context(
            col,
            key.0,
            key.1,
            session.col_clefs.get(&key).cloned(),
            session.col_keys.get(&key).cloned(),
        );
    }

    fn check_column_end(&mut self, col: usize, entry: &ColStaffObjsEntry, session: &mut BuildSession) {
        let closes = self.breaker.closes_column(entry, &session.open);
        match &entry.obj.kind {
            StaffObjKind::Barline(barline) => {
                let at_closing =
                    session.open.closing_time.is_some_and(|t| is_equal_time(t, entry.time));
                if closes || at_closing {
                    if let Some(data) = self.store.column_mut(col) {
                        data.has_barline = true;
                        data.barline_visible |= barline.is_visible() && entry.obj.visible;
                    }
                }
            }
            StaffObjKind::SystemBreak => self.store.set_system_break(col, true),
            _ => {}
        }
        if closes && session.open.closing_time.is_none() {
            session.open.closing_time = Some(entry.time);
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Measurement
    // ═══════════════════════════════════════════════════════════════════

    /// Measure every column and chain their provisional positions.
    pub fn do_spacing_algorithm(&mut self) {
        let mut x = 0.0;
        for col in 0..self.store.num_columns() {
            let Some(data) = self.store.column_mut(col) else { continue };
            data.x_start = x;
            data.phase = data.phase.min(ColumnPhase::Closed);
            self.spacer.do_spacing(data);
            let width = self.spacer.assign_width_to_column(data);

            if let Some(slice) = data.slice.as_mut() {
                slice.left = x;
                slice.width = width;
            }
            for bsi in &mut data.slice_instrs {
                bsi.left = x;
                bsi.width = width;
            }
            x += width;
        }
    }
}

fn assign_line(session: &mut BuildSession, instr: usize, staff: usize, voice: u32) -> usize {
    let key = (instr, staff, voice);
    if let Some(&line) = session.lines.get(&key) {
        return line;
    }
    let next = session.next_line.entry(instr).or_insert(0);
    let line = *next;
    *next += 1;
    session.lines.insert(key, line);
    line
}
