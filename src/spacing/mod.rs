//! Column splitting and horizontal spacing.
//!
//! The staff objects of a score are split into columns (usually one per
//! measure). Each column is measured on its own: a minimum width, a
//! trimmed width and a break penalty that an external line breaker uses
//! to group columns into systems. Once a system is chosen its columns are
//! justified and their shapes moved to the final positions.
//!
//! [`SpacingAlgorithm`] is the public protocol. [`SpAlgColumn`] implements
//! it for any [`ColumnSpacer`] strategy, holding the shared column
//! bookkeeping in a [`ColumnStore`].

pub mod constants;
mod algorithm;
mod breaker;
mod builder;
mod column_data;
mod proportional;
mod store;
mod time_grid;

use std::fmt;

use crate::model::LUnits;

pub use algorithm::{DebugOptions, SpAlgColumn};
pub use breaker::{BarlineColumnBreaker, ColumnBreaker, OpenColumn};
pub use builder::ColumnsBuilder;
pub use column_data::{
    dump_column_data, ColumnData, ColumnEntry, ColumnPhase, ColumnSpacing, ContextEntry,
    ContextSnapshot, TimePosition, TraceLevel, VoiceShiftKind, VoiceTimeShift,
};
pub use proportional::ProportionalSpacer;
pub use store::ColumnStore;
pub use time_grid::{TimeGridEntry, TimeGridTable};

// ═══════════════════════════════════════════════════════════════════════
// Public protocol
// ═══════════════════════════════════════════════════════════════════════

/// Operations every column based spacing algorithm provides.
///
/// Column indices out of range are a caller error: queries answer with a
/// neutral value (0 width, no barline, `None` context), mutators are
/// ignored.
pub trait SpacingAlgorithm {
    // ── Splitting and measuring ──

    /// Split the staff objects into columns, collecting every object.
    fn split_content_in_columns(&mut self);
    /// Measure every column.
    fn do_spacing_algorithm(&mut self);
    fn get_num_columns(&self) -> usize;

    /// Open column `col` (appending it when `col == get_num_columns()`).
    fn start_column_measurements(&mut self, col: usize, x_start: LUnits, fixed_space: LUnits);
    fn include_object(&mut self, col: usize, entry: ColumnEntry);
    fn finish_column_measurements(&mut self, col: usize, x_start: LUnits);
    /// Compute and cache the minimum width of a column.
    fn assign_width_to_column(&mut self, col: usize) -> LUnits;

    // ── Context ──

    fn save_context(
        &mut self,
        col: usize,
        instr: usize,
        staff: usize,
        clef: Option<ContextEntry>,
        key: Option<ContextEntry>,
    );
    /// Clef saved in `col` for absolute staff `staff_idx`; `None` means
    /// it is inherited from a previous column.
    fn get_prolog_clef(&self, col: usize, staff_idx: usize) -> Option<&ContextEntry>;
    fn get_prolog_key(&self, col: usize, staff_idx: usize) -> Option<&ContextEntry>;

    // ── Queries for the line breaker ──

    fn get_column_width(&self, col: usize, first_of_system: bool) -> LUnits;
    fn get_trimmed_width(&self, col: usize) -> LUnits;
    /// Lower is a better break point.
    fn get_penalty_factor(&self, col: usize) -> f32;
    fn column_has_barline(&self, col: usize) -> bool;
    fn column_has_visible_barline(&self, col: usize) -> bool;
    fn has_system_break(&self, col: usize) -> bool;
    fn set_system_break(&mut self, col: usize, value: bool);
    fn is_empty_column(&self, col: usize) -> bool;
    fn additional_space_before_adding_column(&self, col: usize) -> LUnits;

    // ── Justification ──

    /// Spread `space_increment` over columns `first..=last`.
    fn justify_system(&mut self, first: usize, last: usize, space_increment: LUnits);
    /// Move the slices and shapes of columns `first..=last` to their final
    /// place. Returns the vertical extent (top, bottom) of the moved
    /// shapes, if any.
    fn reposition_slices_and_staffobjs(
        &mut self,
        first: usize,
        last: usize,
        y_shift: LUnits,
    ) -> Option<(LUnits, LUnits)>;
    fn time_grid(&self, col: usize) -> TimeGridTable;

    // ── Boxes and shapes ──

    fn create_slice_instr(&mut self, col: usize, instr: usize, y_top: LUnits);
    fn set_slice_width(&mut self, col: usize, width: LUnits);
    fn set_slice_final_position(&mut self, col: usize, left: LUnits, top: LUnits);
    fn delete_shapes(&mut self, col: usize);
    fn delete_box_and_shapes(&mut self, col: usize);

    // ── Debug ──

    fn set_trace_level(&mut self, col: usize, level: TraceLevel);
    fn dump_column_data(&self, col: usize, out: &mut dyn fmt::Write) -> fmt::Result;
}

// ═══════════════════════════════════════════════════════════════════════
// Strategy hooks
// ═══════════════════════════════════════════════════════════════════════

/// The spacing math of one strategy. The collection hooks have default
/// bodies doing the shared bookkeeping; a strategy only has to measure.
pub trait ColumnSpacer {
    fn start_column_measurements(&mut self, col: &mut ColumnData, x_start: LUnits, fixed_space: LUnits) {
        col.x_start = x_start;
        col.fixed_space = fixed_space;
        col.entries.clear();
        col.voice_shifts.clear();
        col.invalidate_spacing();
        col.phase = ColumnPhase::Open;
    }

    fn include_object(&mut self, col: &mut ColumnData, entry: ColumnEntry) {
        if col.phase >= ColumnPhase::Measured {
            col.invalidate_spacing();
        }
        if col.trace >= TraceLevel::Entries {
            log::trace!(
                "[scorespacing] column {} <- {} instr={} staff={} t={:.3} prolog={}",
                col.index,
                entry.kind.name(),
                entry.instr,
                entry.staff,
                entry.time,
                entry.in_prolog
            );
        }
        col.entries.push(entry);
        col.phase = ColumnPhase::Collecting;
    }

    fn finish_column_measurements(&mut self, col: &mut ColumnData, x_start: LUnits) {
        col.x_start = x_start;
        col.phase = ColumnPhase::Closed;
    }

    /// Compute the column spacing from its entries.
    fn do_spacing(&mut self, col: &mut ColumnData);

    fn assign_width_to_column(&mut self, col: &mut ColumnData) -> LUnits {
        if col.spacing.is_none() {
            self.do_spacing(col);
        }
        if col.phase < ColumnPhase::Measured {
            col.phase = ColumnPhase::Measured;
        }
        col.width()
    }

    fn column_has_visible_barline(&self, col: &ColumnData) -> bool {
        col.has_barline && col.barline_visible
    }

    fn penalty_factor(&self, col: &ColumnData) -> f32;
    fn is_empty_column(&self, col: &ColumnData) -> bool;
    fn column_width(&self, col: &ColumnData, first_of_system: bool) -> LUnits;
    fn additional_space_before(&self, prev: Option<&ColumnData>, col: &ColumnData) -> LUnits;
    /// Widen a measured column by `increment`.
    fn justify_column(&mut self, col: &mut ColumnData, increment: LUnits);

    fn time_grid(&self, col: &ColumnData) -> TimeGridTable {
        TimeGridTable::for_column(col)
    }
}
