//! Minimal graphic model used by the spacing core: shape footprints,
//! the shape arena, staff geometry and slice boxes.

pub mod constants;
mod boxes;
mod engraver;
mod shapes;

pub use boxes::{BoxSlice, BoxSliceInstr};
pub use engraver::{DefaultPartsEngraver, PartsEngraver, StavesLayout};
pub use shapes::{
    key_sig_width, pitch_to_staff_y, DefaultShapesCreator, Shape, ShapeContext, ShapeId,
    ShapeKind, ShapesCreator, ShapesStorage,
};
