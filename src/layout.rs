//! Per-column report handed to a line breaker or an embedding application.

use serde::Serialize;

use crate::cursor::ColStaffObjs;
use crate::error::LayoutError;
use crate::model::*;
use crate::options::SpacingOptions;
use crate::report::{Diagnostic, Reporter};
use crate::spacing::{SpAlgColumn, SpacingAlgorithm};

/// What a line breaker needs to know about one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub index: usize,
    pub start_time: TimeUnits,
    pub width: LUnits,
    /// Width when the column starts a system and must repeat its context
    pub width_at_system_start: LUnits,
    pub trimmed_width: LUnits,
    pub penalty: f32,
    pub has_barline: bool,
    pub has_visible_barline: bool,
    pub has_system_break: bool,
    pub is_empty: bool,
    pub num_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnsReport {
    pub title: Option<String>,
    pub num_staffobjs: usize,
    pub columns: Vec<ColumnInfo>,
    /// Sum of the column widths
    pub total_width: LUnits,
    pub diagnostics: Vec<Diagnostic>,
}

/// Split a score into columns and measure them.
///
/// Diagnostics raised while building the columns are appended to
/// `reporter`; the report carries a copy of everything `reporter` holds.
pub fn layout_columns(score: &Score, options: &SpacingOptions, reporter: &mut Reporter) -> ColumnsReport {
    let table = ColStaffObjs::from_score(score);
    let mut alg = SpAlgColumn::new(&table, options.clone());
    alg.split_content_in_columns();
    alg.do_spacing_algorithm();

    let columns: Vec<ColumnInfo> = (0..alg.get_num_columns())
        .map(|c| ColumnInfo {
            index: c,
            start_time: alg.column(c).map_or(0.0, |d| d.start_time),
            width: alg.get_column_width(c, false),
            width_at_system_start: alg.get_column_width(c, true),
            trimmed_width: alg.get_trimmed_width(c),
            penalty: alg.get_penalty_factor(c),
            has_barline: alg.column_has_barline(c),
            has_visible_barline: alg.column_has_visible_barline(c),
            has_system_break: alg.has_system_break(c),
            is_empty: alg.is_empty_column(c),
            num_entries: alg.column(c).map_or(0, |d| d.num_entries()),
        })
        .collect();

    reporter.append(alg.reporter_mut());
    ColumnsReport {
        title: score.title.clone(),
        num_staffobjs: table.num_entries(),
        total_width: columns.iter().map(|c| c.width).sum(),
        columns,
        diagnostics: reporter.diagnostics().to_vec(),
    }
}

/// Convert a columns report to a JSON string.
pub fn columns_report_to_json(report: &ColumnsReport) -> Result<String, LayoutError> {
    Ok(serde_json::to_string_pretty(report)?)
}
