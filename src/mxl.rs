//! Compressed MusicXML (.mxl) support.
//!
//! An .mxl file is a ZIP archive whose `META-INF/container.xml` names the
//! root MusicXML document. Archives without a container fall back to the
//! first `.xml`/`.musicxml` entry outside `META-INF/`.

use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::LayoutError;
use crate::model::Score;
use crate::parser;
use crate::report::Reporter;

/// Read and parse a .mxl file from raw bytes.
pub fn parse_mxl(data: &[u8], reporter: &mut Reporter) -> Result<Score, LayoutError> {
    let xml = extract_musicxml_from_mxl(data)?;
    parser::parse_musicxml(&xml, reporter)
}

/// Extract the root MusicXML document from .mxl bytes.
pub fn extract_musicxml_from_mxl(data: &[u8]) -> Result<String, LayoutError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let root_path = find_root_file(&mut archive)?;

    let mut root_file = archive.by_name(&root_path)?;
    let mut xml = String::new();
    root_file.read_to_string(&mut xml)?;
    Ok(xml)
}

fn find_root_file(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String, LayoutError> {
    let container = match archive.by_name("META-INF/container.xml") {
        Ok(mut file) => {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Some(xml)
        }
        Err(_) => None,
    };

    if let Some(xml) = container {
        let doc = roxmltree::Document::parse(&xml)?;
        return doc
            .descendants()
            .filter(|n| n.tag_name().name() == "rootfile")
            .find_map(|n| n.attribute("full-path"))
            .map(str::to_string)
            .ok_or_else(|| LayoutError::Archive("no rootfile in container.xml".into()));
    }

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names
        .iter()
        .find(|name| {
            !name.starts_with("META-INF/")
                && (name.ends_with(".xml") || name.ends_with(".musicxml"))
        })
        .cloned()
        .ok_or_else(|| LayoutError::Archive(format!("no MusicXML file in archive: {names:?}")))
}
