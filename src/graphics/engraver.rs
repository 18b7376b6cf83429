//! Vertical geometry of the staves of a system.

use crate::model::LUnits;
use super::constants::*;

/// Vertical position of every staff, relative to the top of the system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StavesLayout {
    /// `staff_tops[instr][staff]`
    pub staff_tops: Vec<Vec<LUnits>>,
    /// Top of each instrument block
    pub instr_tops: Vec<LUnits>,
    /// Height of each instrument block, first staff top to last staff bottom
    pub instr_heights: Vec<LUnits>,
    /// Height of all staves, without top and bottom margins
    pub height: LUnits,
}

impl StavesLayout {
    pub fn staff_top(&self, instr: usize, staff: usize) -> LUnits {
        self.staff_tops
            .get(instr)
            .and_then(|tops| tops.get(staff))
            .copied()
            .unwrap_or(0.0)
    }

    /// Absolute staff index (counting staves of all instruments) of
    /// `(instr, staff)`.
    pub fn staff_index(&self, instr: usize, staff: usize) -> usize {
        self.staff_tops.iter().take(instr).map(Vec::len).sum::<usize>() + staff
    }

    /// Inverse of [`StavesLayout::staff_index`].
    pub fn instr_and_staff(&self, staff_idx: usize) -> Option<(usize, usize)> {
        let mut base = 0;
        for (instr, tops) in self.staff_tops.iter().enumerate() {
            if staff_idx < base + tops.len() {
                return Some((instr, staff_idx - base));
            }
            base += tops.len();
        }
        None
    }

    pub fn num_staves(&self) -> usize {
        self.staff_tops.iter().map(Vec::len).sum()
    }
}

/// Source of staff geometry for each instrument.
pub trait PartsEngraver {
    fn staves_layout(&self, staves_per_instr: &[usize]) -> StavesLayout;
}

#[derive(Debug, Clone)]
pub struct DefaultPartsEngraver {
    pub staff_height: LUnits,
    pub staff_gap: LUnits,
    pub part_gap: LUnits,
}

impl Default for DefaultPartsEngraver {
    fn default() -> Self {
        Self {
            staff_height: STAFF_HEIGHT,
            staff_gap: GRAND_STAFF_GAP,
            part_gap: PART_GAP,
        }
    }
}

impl PartsEngraver for DefaultPartsEngraver {
    fn staves_layout(&self, staves_per_instr: &[usize]) -> StavesLayout {
        let mut layout = StavesLayout::default();
        let mut y_offset = 0.0;

        for (i, &num_staves) in staves_per_instr.iter().enumerate() {
            let num_staves = num_staves.max(1);
            let tops: Vec<LUnits> = (0..num_staves)
                .map(|s| y_offset + s as f64 * (self.staff_height + self.staff_gap))
                .collect();
            let part_height =
                self.staff_height + (num_staves as f64 - 1.0) * (self.staff_height + self.staff_gap);

            layout.instr_tops.push(y_offset);
            layout.instr_heights.push(part_height);
            layout.staff_tops.push(tops);
            y_offset += part_height;
            if i < staves_per_instr.len() - 1 {
                y_offset += self.part_gap;
            }
        }

        layout.height = y_offset;
        layout
    }
}
