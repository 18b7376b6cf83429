//! scorespacing — column splitting, horizontal spacing and justification
//! for engraved music scores.
//!
//! A score (imported from MusicXML or built by hand) is flattened into a
//! time ordered table of staff objects, split into columns, and each
//! column is measured: minimum width, trimmed width and break penalty.
//! A line breaker picks the columns of each system; the chosen columns
//! are then justified and their shapes moved to the final positions.
//!
//! # Example
//! ```no_run
//! use scorespacing::{layout_columns, parse_file, Reporter, SpacingOptions};
//!
//! let mut reporter = Reporter::new();
//! let score = parse_file("path/to/score.musicxml", &mut reporter).unwrap();
//! let report = layout_columns(&score, &SpacingOptions::default(), &mut reporter);
//! for col in &report.columns {
//!     println!("{}: width {:.1} penalty {}", col.index, col.width, col.penalty);
//! }
//! ```

pub mod cursor;
pub mod error;
pub mod graphics;
pub mod layout;
pub mod model;
pub mod mxl;
pub mod options;
pub mod parser;
pub mod report;
pub mod spacing;

use std::path::Path;

pub use cursor::{ColStaffObjs, ColStaffObjsEntry, EntryId, StaffObjsCursor};
pub use error::LayoutError;
pub use layout::{columns_report_to_json, layout_columns, ColumnInfo, ColumnsReport};
pub use model::*;
pub use mxl::parse_mxl;
pub use options::SpacingOptions;
pub use parser::parse_musicxml;
pub use report::{Diagnostic, Reporter, Severity};
pub use spacing::{ColumnSpacer, ProportionalSpacer, SpAlgColumn, SpacingAlgorithm};

/// Parse a MusicXML file from a file path.
/// Automatically detects format based on file extension:
/// - `.musicxml` or `.xml` → uncompressed MusicXML
/// - `.mxl` → compressed MXL (ZIP archive)
pub fn parse_file<P: AsRef<Path>>(path: P, reporter: &mut Reporter) -> Result<Score, LayoutError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    parse_bytes(&data, path.extension().and_then(|e| e.to_str()), reporter)
}

/// Parse MusicXML from raw bytes with an optional format hint.
/// If `extension` is None, tries to auto-detect the format.
pub fn parse_bytes(
    data: &[u8],
    extension: Option<&str>,
    reporter: &mut Reporter,
) -> Result<Score, LayoutError> {
    match extension {
        Some("mxl") => parse_mxl(data, reporter),
        Some("musicxml") | Some("xml") => parse_musicxml(utf8(data)?, reporter),
        _ => {
            // Auto-detect: try as XML first, then as MXL
            if let Ok(xml) = std::str::from_utf8(data) {
                if xml.trim_start().starts_with('<') {
                    return parse_musicxml(xml, reporter);
                }
            }
            parse_mxl(data, reporter)
        }
    }
}

fn utf8(data: &[u8]) -> Result<&str, LayoutError> {
    std::str::from_utf8(data)
        .map_err(|e| LayoutError::UnsupportedFormat(format!("invalid UTF-8 in MusicXML file: {e}")))
}

/// Parse MusicXML bytes and measure the columns of the score.
pub fn layout_bytes(
    data: &[u8],
    extension: Option<&str>,
    options: &SpacingOptions,
) -> Result<ColumnsReport, LayoutError> {
    options.validate()?;
    let mut reporter = Reporter::new();
    let score = parse_bytes(data, extension, &mut reporter)?;
    Ok(layout_columns(&score, options, &mut reporter))
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI — static library / shared object
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Parse MusicXML bytes and return the columns report as a JSON C string.
/// On failure the JSON object has a single `error` field.
/// The caller must free the returned string with `scorespacing_free_string`.
///
/// `options_json` may be null to use the default spacing options.
///
/// # Safety
/// `data` must point to `len` valid bytes. `extension` and `options_json`
/// may be null; otherwise they must be valid null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn scorespacing_layout_bytes(
    data: *const u8,
    len: usize,
    extension: *const c_char,
    options_json: *const c_char,
) -> *mut c_char {
    if data.is_null() || len == 0 {
        return std::ptr::null_mut();
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    let ext = if extension.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(extension) }.to_str().ok()
    };

    let result = ffi_options(options_json)
        .and_then(|options| layout_bytes(bytes, ext, &options))
        .and_then(|report| columns_report_to_json(&report));
    let json = match result {
        Ok(json) => json,
        Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
    };
    CString::new(json).unwrap_or_default().into_raw()
}

unsafe fn ffi_options(options_json: *const c_char) -> Result<SpacingOptions, LayoutError> {
    if options_json.is_null() {
        return Ok(SpacingOptions::default());
    }
    let text = unsafe { CStr::from_ptr(options_json) }
        .to_str()
        .map_err(|e| LayoutError::InvalidOptions(e.to_string()))?;
    SpacingOptions::from_json(text)
}

/// Free a string previously returned by scorespacing functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a scorespacing function, or null.
#[no_mangle]
pub unsafe extern "C" fn scorespacing_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
