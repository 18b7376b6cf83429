//! `SpAlgColumn`: the column based implementation of [`SpacingAlgorithm`].

use std::fmt;

use crate::cursor::ColStaffObjs;
use crate::graphics::{DefaultPartsEngraver, DefaultShapesCreator, PartsEngraver, ShapesCreator};
use crate::model::LUnits;
use crate::options::SpacingOptions;
use crate::report::Reporter;

use super::breaker::{BarlineColumnBreaker, ColumnBreaker};
use super::builder::ColumnsBuilder;
use super::column_data::*;
use super::proportional::ProportionalSpacer;
use super::store::ColumnStore;
use super::time_grid::TimeGridTable;
use super::{ColumnSpacer, SpacingAlgorithm};

/// Trace settings applied to columns as they are created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugOptions {
    pub trace: TraceLevel,
    /// Restrict tracing to one column
    pub trace_column: Option<usize>,
}

impl DebugOptions {
    pub fn level_for(&self, col: usize) -> TraceLevel {
        match self.trace_column {
            Some(c) if c != col => TraceLevel::Off,
            _ => self.trace,
        }
    }
}

/// Column bookkeeping plus a spacing strategy `S`.
pub struct SpAlgColumn<'a, S: ColumnSpacer = ProportionalSpacer> {
    table: &'a ColStaffObjs,
    options: SpacingOptions,
    spacer: S,
    store: ColumnStore,
    shapes_creator: Box<dyn ShapesCreator>,
    engraver: Box<dyn PartsEngraver>,
    breaker: Box<dyn ColumnBreaker>,
    reporter: Reporter,
    debug: DebugOptions,
}

impl<'a> SpAlgColumn<'a, ProportionalSpacer> {
    pub fn new(table: &'a ColStaffObjs, options: SpacingOptions) -> Self {
        let spacer = ProportionalSpacer::new(options.clone());
        Self::with_spacer(table, options, spacer)
    }
}

impl<'a, S: ColumnSpacer> SpAlgColumn<'a, S> {
    pub fn with_spacer(table: &'a ColStaffObjs, options: SpacingOptions, spacer: S) -> Self {
        Self {
            table,
            breaker: Box::new(BarlineColumnBreaker::new(options.max_column_duration)),
            options,
            spacer,
            store: ColumnStore::new(),
            shapes_creator: Box::new(DefaultShapesCreator),
            engraver: Box::new(DefaultPartsEngraver::default()),
            reporter: Reporter::new(),
            debug: DebugOptions::default(),
        }
    }

    pub fn with_shapes_creator(mut self, creator: impl ShapesCreator + 'static) -> Self {
        self.shapes_creator = Box::new(creator);
        self
    }

    pub fn with_parts_engraver(mut self, engraver: impl PartsEngraver + 'static) -> Self {
        self.engraver = Box::new(engraver);
        self
    }

    pub fn with_column_breaker(mut self, breaker: impl ColumnBreaker + 'static) -> Self {
        self.breaker = Box::new(breaker);
        self
    }

    pub fn set_debug_options(&mut self, debug: DebugOptions) {
        self.debug = debug;
    }

    /// Builder for a collection pass over the staff objects table.
    pub fn columns_builder(&mut self) -> ColumnsBuilder<'_, S> {
        ColumnsBuilder {
            table: self.table,
            store: &mut self.store,
            spacer: &mut self.spacer,
            shapes_creator: self.shapes_creator.as_mut(),
            engraver: self.engraver.as_ref(),
            breaker: self.breaker.as_mut(),
            reporter: &mut self.reporter,
            options: &self.options,
            debug: self.debug,
        }
    }

    pub fn store(&self) -> &ColumnStore {
        &self.store
    }

    pub fn column(&self, col: usize) -> Option<&ColumnData> {
        self.store.column(col)
    }

    pub fn spacer(&self) -> &S {
        &self.spacer
    }

    pub fn options(&self) -> &SpacingOptions {
        &self.options
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut Reporter {
        &mut self.reporter
    }
}

impl<'a, S: ColumnSpacer> SpacingAlgorithm for SpAlgColumn<'a, S> {
    fn split_content_in_columns(&mut self) {
        self.columns_builder().create_columns();
    }

    fn do_spacing_algorithm(&mut self) {
        self.columns_builder().do_spacing_algorithm();
    }

    fn get_num_columns(&self) -> usize {
        self.store.num_columns()
    }

    fn start_column_measurements(&mut self, col: usize, x_start: LUnits, fixed_space: LUnits) {
        let num_columns = self.store.num_columns();
        if col == num_columns {
            let start_time = self
                .store
                .columns()
                .last()
                .and_then(|c| c.spacing.as_ref().map(|s| s.end_time))
                .unwrap_or(0.0);
            let mut data = ColumnData::new(col, start_time);
            data.trace = self.debug.level_for(col);
            self.spacer.start_column_measurements(&mut data, x_start, fixed_space);
            self.store.push_column(data);
        } else if let Some(data) = self.store.column_mut(col) {
            self.spacer.start_column_measurements(data, x_start, fixed_space);
        }
    }

    fn include_object(&mut self, col: usize, entry: ColumnEntry) {
        if let Some(data) = self.store.column_mut(col) {
            self.spacer.include_object(data, entry);
        }
    }

    fn finish_column_measurements(&mut self, col: usize, x_start: LUnits) {
        if let Some(data) = self.store.column_mut(col) {
            self.spacer.finish_column_measurements(data, x_start);
        }
    }

    fn assign_width_to_column(&mut self, col: usize) -> LUnits {
        match self.store.column_mut(col) {
            Some(data) => self.spacer.assign_width_to_column(data),
            None => 0.0,
        }
    }

    fn save_context(
        &mut self,
        col: usize,
        instr: usize,
        staff: usize,
        clef: Option<ContextEntry>,
        key: Option<ContextEntry>,
    ) {
        self.store.save_context(col, instr, staff, clef, key);
    }

    fn get_prolog_clef(&self, col: usize, staff_idx: usize) -> Option<&ContextEntry> {
        self.store.get_prolog_clef(col, staff_idx)
    }

    fn get_prolog_key(&self, col: usize, staff_idx: usize) -> Option<&ContextEntry> {
        self.store.get_prolog_key(col, staff_idx)
    }

    fn get_column_width(&self, col: usize, first_of_system: bool) -> LUnits {
        self.store.column(col).map_or(0.0, |c| self.spacer.column_width(c, first_of_system))
    }

    fn get_trimmed_width(&self, col: usize) -> LUnits {
        self.store.column(col).map_or(0.0, ColumnData::trimmed_width)
    }

    fn get_penalty_factor(&self, col: usize) -> f32 {
        self.store.column(col).map_or(0.0, |c| self.spacer.penalty_factor(c))
    }

    fn column_has_barline(&self, col: usize) -> bool {
        self.store.column_has_barline(col)
    }

    fn column_has_visible_barline(&self, col: usize) -> bool {
        self.store.column(col).is_some_and(|c| self.spacer.column_has_visible_barline(c))
    }

    fn has_system_break(&self, col: usize) -> bool {
        self.store.has_system_break(col)
    }

    fn set_system_break(&mut self, col: usize, value: bool) {
        self.store.set_system_break(col, value);
    }

    fn is_empty_column(&self, col: usize) -> bool {
        self.store.column(col).map_or(true, |c| self.spacer.is_empty_column(c))
    }

    fn additional_space_before_adding_column(&self, col: usize) -> LUnits {
        let Some(data) = self.store.column(col) else { return 0.0 };
        let prev = col.checked_sub(1).and_then(|p| self.store.columns().get(p));
        self.spacer.additional_space_before(prev, data)
    }

    fn justify_system(&mut self, first: usize, last: usize, space_increment: LUnits) {
        let num_columns = self.store.num_columns();
        debug_assert!(first <= last && last < num_columns, "bad column range {first}..={last}");
        if first > last || last >= num_columns {
            return;
        }

        let mut springs = Vec::with_capacity(last - first + 1);
        for col in first..=last {
            let Some(data) = self.store.column_mut(col) else { return };
            if data.spacing.is_none() {
                self.spacer.do_spacing(data);
            }
            springs.push(data.spacing.as_ref().map_or(0.0, ColumnSpacing::total_springs));
        }
        let total: LUnits = springs.iter().sum();
        let count = springs.len() as f64;

        for (col, spring) in (first..=last).zip(springs) {
            let share = if total > 0.0 { space_increment * spring / total } else { space_increment / count };
            if let Some(data) = self.store.column_mut(col) {
                self.spacer.justify_column(data, share);
            }
        }
        log::debug!("[scorespacing] justified columns {first}..={last} by {space_increment:.2}");
    }

    fn reposition_slices_and_staffobjs(
        &mut self,
        first: usize,
        last: usize,
        y_shift: LUnits,
    ) -> Option<(LUnits, LUnits)> {
        let num_columns = self.store.num_columns();
        debug_assert!(first <= last && last < num_columns, "bad column range {first}..={last}");

        let mut extent: Option<(LUnits, LUnits)> = None;
        let mut next_left: Option<LUnits> = None;
        for col in first..=last.min(num_columns.saturating_sub(1)) {
            if let Some(data) = self.store.column_mut(col) {
                if data.phase < ColumnPhase::Measured {
                    self.spacer.assign_width_to_column(data);
                }
            }
            let Some(data) = self.store.columns().get(col) else { break };
            if data.phase == ColumnPhase::Justified {
                log::warn!("[scorespacing] column {col} was already repositioned");
                next_left = Some(data.x_start + data.final_width());
                continue;
            }
            let left = match (&data.slice, next_left) {
                (Some(slice), _) if data.slice_positioned => slice.left,
                (_, Some(x)) => x,
                _ => data.x_start,
            };
            let width = data.final_width();

            if let Some((top, bottom)) = self.store.reposition_column(col, left, y_shift) {
                extent = Some(match extent {
                    Some((t, b)) => (t.min(top), b.max(bottom)),
                    None => (top, bottom),
                });
            }
            next_left = Some(left + width);
        }
        extent
    }

    fn time_grid(&self, col: usize) -> TimeGridTable {
        self.store.column(col).map(|c| self.spacer.time_grid(c)).unwrap_or_default()
    }

    fn create_slice_instr(&mut self, col: usize, instr: usize, y_top: LUnits) {
        self.store.create_slice_instr(col, instr, y_top);
    }

    fn set_slice_width(&mut self, col: usize, width: LUnits) {
        self.store.set_slice_width(col, width);
    }

    fn set_slice_final_position(&mut self, col: usize, left: LUnits, top: LUnits) {
        self.store.set_slice_final_position(col, left, top);
    }

    fn delete_shapes(&mut self, col: usize) {
        self.store.delete_shapes(col);
    }

    fn delete_box_and_shapes(&mut self, col: usize) {
        self.store.delete_box_and_shapes(col);
    }

    fn set_trace_level(&mut self, col: usize, level: TraceLevel) {
        self.store.set_trace_level(col, level);
    }

    fn dump_column_data(&self, col: usize, out: &mut dyn fmt::Write) -> fmt::Result {
        match self.store.column(col) {
            Some(data) => dump_column_data(data, out),
            None => writeln!(out, "column {col}: not created"),
        }
    }
}
