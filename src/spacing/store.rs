//! Column bookkeeping shared by every column based spacing strategy.
//!
//! `ColumnStore` owns the columns, the shapes arena and the staves
//! geometry for the layout of one score. Queries on a column index that
//! does not exist return neutral values; mutators on such an index are a
//! caller bug (`debug_assert!`) and are ignored in release builds.

use crate::graphics::{BoxSlice, BoxSliceInstr, Shape, ShapeId, ShapesStorage, StavesLayout};
use crate::model::LUnits;

use super::column_data::*;

#[derive(Debug, Default)]
pub struct ColumnStore {
    columns: Vec<ColumnData>,
    shapes: ShapesStorage,
    staves: StavesLayout,
}

impl ColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    pub fn column(&self, col: usize) -> Option<&ColumnData> {
        let found = self.columns.get(col);
        if found.is_none() {
            log::debug!("[scorespacing] query on missing column {col} of {}", self.columns.len());
        }
        found
    }

    pub fn column_mut(&mut self, col: usize) -> Option<&mut ColumnData> {
        let len = self.columns.len();
        let found = self.columns.get_mut(col);
        debug_assert!(found.is_some(), "column {col} out of range ({len} columns)");
        found
    }

    /// Append a column and return its index.
    pub fn push_column(&mut self, mut data: ColumnData) -> usize {
        data.index = self.columns.len();
        self.columns.push(data);
        self.columns.len() - 1
    }

    // ── Staves geometry ──────────────────────────────────────────────

    pub fn set_staves_layout(&mut self, staves: StavesLayout) {
        self.staves = staves;
    }

    pub fn staves(&self) -> &StavesLayout {
        &self.staves
    }

    pub fn staves_height(&self) -> LUnits {
        self.staves.height
    }

    // ── Shapes ───────────────────────────────────────────────────────

    pub fn shapes(&self) -> &ShapesStorage {
        &self.shapes
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    /// Store a shape created for `col`, attaching it to the instrument
    /// slice box when there is one.
    pub fn add_shape(&mut self, col: usize, instr: usize, shape: Shape) -> ShapeId {
        let id = self.shapes.add(shape);
        if let Some(data) = self.columns.get_mut(col) {
            if let Some(bsi) = data.slice_instrs.iter_mut().find(|b| b.instr == instr) {
                bsi.shapes.push(id);
            }
        }
        id
    }

    /// Release the shapes of a column. Timing, context and measured
    /// widths are untouched; releasing twice does nothing.
    pub fn delete_shapes(&mut self, col: usize) {
        let Some(data) = self.columns.get_mut(col) else {
            debug_assert!(false, "delete_shapes on missing column {col}");
            return;
        };
        for entry in &mut data.entries {
            if let Some(id) = entry.shape.take() {
                self.shapes.release(id);
            }
        }
        for bsi in &mut data.slice_instrs {
            bsi.shapes.clear();
        }
    }

    /// Release the shapes and the slice boxes of a column.
    pub fn delete_box_and_shapes(&mut self, col: usize) {
        self.delete_shapes(col);
        if let Some(data) = self.columns.get_mut(col) {
            data.slice = None;
            data.slice_positioned = false;
            data.slice_instrs.clear();
        }
    }

    // ── Context ──────────────────────────────────────────────────────

    pub fn save_context(
        &mut self,
        col: usize,
        instr: usize,
        staff: usize,
        clef: Option<ContextEntry>,
        key: Option<ContextEntry>,
    ) {
        if let Some(data) = self.column_mut(col) {
            data.save_context(instr, staff, clef, key);
        }
    }

    /// Clef saved in column `col` for the staff with absolute index
    /// `staff_idx`. `None` means the column inherits the previous clef.
    pub fn get_prolog_clef(&self, col: usize, staff_idx: usize) -> Option<&ContextEntry> {
        let (instr, staff) = self.staves.instr_and_staff(staff_idx)?;
        self.column(col)?.context_clef(instr, staff)
    }

    pub fn get_prolog_key(&self, col: usize, staff_idx: usize) -> Option<&ContextEntry> {
        let (instr, staff) = self.staves.instr_and_staff(staff_idx)?;
        self.column(col)?.context_key(instr, staff)
    }

    // ── Flags ────────────────────────────────────────────────────────

    pub fn set_system_break(&mut self, col: usize, value: bool) {
        if let Some(data) = self.column_mut(col) {
            data.has_system_break = value;
        }
    }

    pub fn has_system_break(&self, col: usize) -> bool {
        self.column(col).is_some_and(|c| c.has_system_break)
    }

    pub fn column_has_barline(&self, col: usize) -> bool {
        self.column(col).is_some_and(|c| c.has_barline)
    }

    pub fn set_trace_level(&mut self, col: usize, level: TraceLevel) {
        if let Some(data) = self.column_mut(col) {
            data.trace = level;
        }
    }

    // ── Slice boxes ──────────────────────────────────────────────────

    /// Create the column slice box, replacing any previous one.
    pub fn create_slice(&mut self, col: usize, left: LUnits, top: LUnits) {
        let height = self.staves.height;
        if let Some(data) = self.column_mut(col) {
            data.slice = Some(BoxSlice::new(left, top, height));
        }
    }

    /// Create the slice box of one instrument inside the column.
    pub fn create_slice_instr(&mut self, col: usize, instr: usize, y_top: LUnits) {
        let height = self.staves.instr_heights.get(instr).copied().unwrap_or(0.0);
        let Some(data) = self.column_mut(col) else { return };
        let left = data.slice.as_ref().map_or(data.x_start, |s| s.left);
        data.slice_instrs.retain(|b| b.instr != instr);
        data.slice_instrs.push(BoxSliceInstr::new(instr, left, y_top, height));
    }

    pub fn set_slice_width(&mut self, col: usize, width: LUnits) {
        let Some(data) = self.column_mut(col) else { return };
        if let Some(slice) = data.slice.as_mut() {
            slice.width = width;
        }
        for bsi in &mut data.slice_instrs {
            bsi.width = width;
        }
    }

    /// Place the column slice at its final position in the system.
    pub fn set_slice_final_position(&mut self, col: usize, left: LUnits, top: LUnits) {
        let height = self.staves.height;
        let Some(data) = self.column_mut(col) else { return };
        let slice = data.slice.get_or_insert_with(|| BoxSlice::new(left, top, height));
        slice.left = left;
        slice.top = top;
        data.slice_positioned = true;
    }

    // ── Repositioning ────────────────────────────────────────────────

    /// Move the shapes and boxes of a justified column to their final
    /// place. Returns the vertical extent of the moved shapes.
    pub(crate) fn reposition_column(
        &mut self,
        col: usize,
        left: LUnits,
        y_shift: LUnits,
    ) -> Option<(LUnits, LUnits)> {
        let data = self.columns.get_mut(col)?;
        let width = data.final_width();
        let mut extent: Option<(LUnits, LUnits)> = None;

        for entry in &data.entries {
            let Some(id) = entry.shape else { continue };
            let x = left + data.entry_final_x(entry) - entry.anchor;
            if let Some(shape) = self.shapes.get_mut(id) {
                shape.shift(x - shape.left, y_shift);
                extent = Some(match extent {
                    Some((top, bottom)) => (top.min(shape.top), bottom.max(shape.bottom())),
                    None => (shape.top, shape.bottom()),
                });
            }
        }

        let slice = data.slice.get_or_insert_with(|| BoxSlice::new(left, 0.0, self.staves.height));
        slice.left = left;
        slice.width = width;
        if !data.slice_positioned {
            slice.top += y_shift;
        }
        for bsi in &mut data.slice_instrs {
            bsi.left = left;
            bsi.width = width;
            bsi.top += y_shift;
        }
        data.x_start = left;
        data.phase = ColumnPhase::Justified;
        extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{DefaultPartsEngraver, PartsEngraver, ShapeKind};
    use crate::model::ObjId;

    fn store_with_column() -> ColumnStore {
        let mut store = ColumnStore::new();
        store.set_staves_layout(DefaultPartsEngraver::default().staves_layout(&[2]));
        store.push_column(ColumnData::new(0, 0.0));
        store.create_slice(0, 0.0, 0.0);
        store.create_slice_instr(0, 0, 0.0);
        store
    }

    fn rest_shape() -> Shape {
        Shape {
            kind: ShapeKind::Rest,
            owner: ObjId(1),
            left: 0.0,
            top: 0.0,
            width: 10.0,
            height: 24.0,
            anchor: 0.0,
        }
    }

    #[test]
    fn shapes_attach_to_instrument_box() {
        let mut store = store_with_column();
        let id = store.add_shape(0, 0, rest_shape());
        assert_eq!(store.columns()[0].slice_instrs[0].shapes, vec![id]);
        assert_eq!(store.columns()[0].slice_instrs[0].height, 140.0);
    }

    #[test]
    fn delete_box_and_shapes_clears_boxes() {
        let mut store = store_with_column();
        store.add_shape(0, 0, rest_shape());
        store.delete_box_and_shapes(0);
        let col = &store.columns()[0];
        assert!(col.slice.is_none());
        assert!(col.slice_instrs.is_empty());
        store.delete_box_and_shapes(0);
    }

    #[test]
    fn queries_on_missing_columns_are_neutral() {
        let store = ColumnStore::new();
        assert!(store.column(3).is_none());
        assert!(!store.has_system_break(3));
        assert!(!store.column_has_barline(3));
        assert!(store.get_prolog_clef(3, 0).is_none());
    }

    #[test]
    fn slice_width_reaches_instrument_boxes() {
        let mut store = store_with_column();
        store.set_slice_width(0, 120.0);
        let col = &store.columns()[0];
        assert_eq!(col.slice.as_ref().map(|s| s.width), Some(120.0));
        assert_eq!(col.slice_instrs[0].width, 120.0);
    }
}
