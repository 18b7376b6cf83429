//! Time grid: time positions of a column mapped to x positions.

use serde::Serialize;

use crate::model::*;

use super::column_data::ColumnData;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeGridEntry {
    pub time: TimeUnits,
    /// Time until the next entry, or until the column end
    pub duration: TimeUnits,
    /// Absolute x position
    pub x: LUnits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeGridTable {
    pub entries: Vec<TimeGridEntry>,
}

impl TimeGridTable {
    /// Build the grid of a measured column, using justified positions when
    /// the column was justified.
    pub fn for_column(col: &ColumnData) -> Self {
        let Some(spacing) = col.justified.as_ref().or(col.spacing.as_ref()) else {
            return Self::default();
        };
        let left = col.slice.as_ref().filter(|_| col.slice_positioned).map_or(col.x_start, |s| s.left);
        let n = spacing.positions.len();
        let entries = spacing
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let next = if i + 1 < n { spacing.positions[i + 1].time } else { spacing.end_time };
                TimeGridEntry { time: p.time, duration: (next - p.time).max(0.0), x: left + p.x }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// x position for `time`, interpolated between grid entries. Times
    /// outside the grid clamp to its ends.
    pub fn x_for_time(&self, time: TimeUnits) -> Option<LUnits> {
        let first = self.entries.first()?;
        if !is_greater_time(time, first.time) {
            return Some(first.x);
        }
        for pair in self.entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if is_equal_time(time, b.time) {
                return Some(b.x);
            }
            if time < b.time {
                let span = b.time - a.time;
                if span <= 0.0 {
                    return Some(a.x);
                }
                return Some(a.x + (b.x - a.x) * (time - a.time) / span);
            }
        }
        self.entries.last().map(|e| e.x)
    }
}
