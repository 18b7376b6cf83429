//! Slice boxes: the graphical containers of one column.

use crate::model::LUnits;
use super::shapes::ShapeId;

/// Box spanning all staves of the system for one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxSlice {
    pub left: LUnits,
    pub top: LUnits,
    pub width: LUnits,
    pub height: LUnits,
}

/// Box for one instrument inside a column; owns the shapes drawn there.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSliceInstr {
    pub instr: usize,
    pub left: LUnits,
    pub top: LUnits,
    pub width: LUnits,
    pub height: LUnits,
    pub shapes: Vec<ShapeId>,
}

impl BoxSlice {
    pub fn new(left: LUnits, top: LUnits, height: LUnits) -> Self {
        Self { left, top, width: 0.0, height }
    }

    pub fn right(&self) -> LUnits {
        self.left + self.width
    }

    pub fn bottom(&self) -> LUnits {
        self.top + self.height
    }
}

impl BoxSliceInstr {
    pub fn new(instr: usize, left: LUnits, top: LUnits, height: LUnits) -> Self {
        Self { instr, left, top, width: 0.0, height, shapes: Vec::new() }
    }
}
