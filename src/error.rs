//! Error types for the import and configuration surface.
//!
//! The spacing core itself never fails: malformed layout input is
//! corrected and reported through [`crate::report::Reporter`] instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    /// XML is not well-formed
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Well-formed XML that is not a supported MusicXML document
    #[error("Unsupported MusicXML format: {0}")]
    UnsupportedFormat(String),

    /// Problem reading a compressed .mxl archive
    #[error("MXL archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid spacing options: {0}")]
    InvalidOptions(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<zip::result::ZipError> for LayoutError {
    fn from(e: zip::result::ZipError) -> Self {
        LayoutError::Archive(e.to_string())
    }
}
