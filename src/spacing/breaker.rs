//! Column break policy.

use crate::cursor::ColStaffObjsEntry;
use crate::model::*;

/// What the builder knows about the column being filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenColumn {
    pub start_time: TimeUnits,
    /// Set once a barline or system break ends the column
    pub closing_time: Option<TimeUnits>,
    /// Latest onset collected so far
    pub max_time: TimeUnits,
    pub num_entries: usize,
    /// A note or rest (not a grace note) was collected
    pub has_timed: bool,
}

impl OpenColumn {
    pub fn new(start_time: TimeUnits) -> Self {
        Self { start_time, max_time: start_time, ..Default::default() }
    }
}

/// Decides where columns end while the builder scans the staff objects.
///
/// Implementations are expected to be monotone: for objects at the same
/// time, once the answer is "yes" it stays "yes" until a barline.
pub trait ColumnBreaker {
    /// Must `entry` go to a new column instead of the open one?
    fn must_start_new_column(&mut self, entry: &ColStaffObjsEntry, open: &OpenColumn) -> bool;

    /// Does `entry`, already collected, close the open column?
    fn closes_column(&self, entry: &ColStaffObjsEntry, open: &OpenColumn) -> bool {
        match &entry.obj.kind {
            StaffObjKind::SystemBreak => true,
            StaffObjKind::Barline(_) => {
                is_greater_time(entry.time, open.start_time) || open.has_timed
            }
            _ => false,
        }
    }
}

/// Breaks after barlines and system breaks. Content without barlines is
/// cut when a column would last longer than `max_column_duration`.
#[derive(Debug, Clone, Default)]
pub struct BarlineColumnBreaker {
    pub max_column_duration: Option<TimeUnits>,
}

impl BarlineColumnBreaker {
    pub fn new(max_column_duration: Option<TimeUnits>) -> Self {
        Self { max_column_duration }
    }
}

impl ColumnBreaker for BarlineColumnBreaker {
    fn must_start_new_column(&mut self, entry: &ColStaffObjsEntry, open: &OpenColumn) -> bool {
        if open.num_entries == 0 {
            return false;
        }
        let kind = &entry.obj.kind;

        if let Some(t) = open.closing_time {
            // barlines of other instruments at the same time stay
            return is_greater_time(entry.time, t)
                || (is_equal_time(entry.time, t)
                    && !matches!(kind, StaffObjKind::Barline(_) | StaffObjKind::SystemBreak));
        }

        match self.max_column_duration {
            Some(max) => {
                // a clef or key change at the cut opens the next column
                let starts_content = (kind.is_timed() && !kind.is_grace()) || kind.is_prolog_candidate();
                starts_content
                    && !is_greater_time(open.start_time + max, entry.time)
                    && !is_greater_time(open.max_time, entry.time)
            }
            None => false,
        }
    }
}
