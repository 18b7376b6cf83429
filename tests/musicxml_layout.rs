//! Integration tests — MusicXML documents through import, column
//! splitting and the C FFI.

use std::ffi::{CStr, CString};
use std::io::Write;

use pretty_assertions::assert_eq;
use scorespacing::*;

fn score_xml(parts: &[(&str, &str, &str)]) -> String {
    let list: String = parts
        .iter()
        .map(|(id, name, _)| format!(r#"<score-part id="{id}"><part-name>{name}</part-name></score-part>"#))
        .collect();
    let bodies: String = parts
        .iter()
        .map(|(id, _, measures)| format!(r#"<part id="{id}">{measures}</part>"#))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="4.0">
  <work><work-title>Spacing Study</work-title></work>
  <part-list>{list}</part-list>
  {bodies}
</score-partwise>"#
    )
}

const PIANO: &str = r#"
  <measure number="1">
    <attributes>
      <divisions>2</divisions>
      <key><fifths>2</fifths></key>
      <time><beats>4</beats><beat-type>4</beat-type></time>
      <staves>2</staves>
      <clef number="1"><sign>G</sign><line>2</line></clef>
      <clef number="2"><sign>F</sign><line>4</line></clef>
    </attributes>
    <note><pitch><step>D</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>quarter</type><staff>1</staff></note>
    <note><pitch><step>E</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>quarter</type><staff>1</staff></note>
    <note><pitch><step>F</step><octave>5</octave></pitch><duration>4</duration><voice>1</voice><type>half</type><staff>1</staff></note>
    <backup><duration>8</duration></backup>
    <note><pitch><step>D</step><octave>3</octave></pitch><duration>8</duration><voice>5</voice><type>whole</type><staff>2</staff></note>
  </measure>
  <measure number="2">
    <print new-system="yes"/>
    <note><pitch><step>A</step><octave>4</octave></pitch><duration>8</duration><voice>1</voice><type>whole</type><staff>1</staff></note>
    <backup><duration>8</duration></backup>
    <note><rest measure="yes"/><duration>8</duration><voice>5</voice><staff>2</staff></note>
    <barline location="right"><bar-style>light-heavy</bar-style></barline>
  </measure>"#;

fn melody(first_barline: &str) -> String {
    format!(
        r#"
  <measure number="1">
    <attributes>
      <divisions>1</divisions>
      <clef><sign>G</sign><line>2</line></clef>
    </attributes>
    <note><pitch><step>C</step><octave>5</octave></pitch><duration>2</duration><type>half</type></note>
    <note><pitch><step>D</step><octave>5</octave></pitch><duration>2</duration><type>half</type></note>
    {first_barline}
  </measure>
  <measure number="2">
    <note><pitch><step>E</step><octave>5</octave></pitch><duration>4</duration><type>whole</type></note>
  </measure>"#
    )
}

fn layout_xml(xml: &str, options: &SpacingOptions) -> ColumnsReport {
    let mut reporter = Reporter::new();
    let score = parse_musicxml(xml, &mut reporter).expect("valid MusicXML");
    layout_columns(&score, options, &mut reporter)
}

// ─── Grand staff ────────────────────────────────────────────────────

#[test]
fn piano_grand_staff_columns() {
    let xml = score_xml(&[("P1", "Piano", PIANO)]);
    let report = layout_xml(&xml, &SpacingOptions::default());

    assert_eq!(report.title.as_deref(), Some("Spacing Study"));
    assert_eq!(report.columns.len(), 2);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    let collected: usize = report.columns.iter().map(|c| c.num_entries).sum();
    assert_eq!(collected, report.num_staffobjs);

    let (first, second) = (&report.columns[0], &report.columns[1]);
    assert_eq!(first.start_time, 0.0);
    assert_eq!(second.start_time, 4.0);
    // the break requested by measure 2 ends column 0
    assert!(first.has_system_break);
    assert!(!second.has_system_break);
    assert!(first.has_visible_barline && second.has_visible_barline);

    // column 0 shows clefs and keys, column 1 must add them at a system start
    assert_eq!(first.width_at_system_start, first.width);
    assert!(second.width_at_system_start > second.width);
    for c in &report.columns {
        assert!(c.trimmed_width <= c.width);
        assert!(!c.is_empty);
    }
    let total: f64 = report.columns.iter().map(|c| c.width).sum();
    assert_eq!(report.total_width, total);
}

#[test]
fn voices_of_both_staves_share_time_positions() {
    let xml = score_xml(&[("P1", "Piano", PIANO)]);
    let mut reporter = Reporter::new();
    let score = parse_musicxml(&xml, &mut reporter).unwrap();
    let table = ColStaffObjs::from_score(&score);
    let mut alg = SpAlgColumn::new(&table, SpacingOptions::default());
    alg.split_content_in_columns();
    alg.do_spacing_algorithm();

    let col = alg.column(0).unwrap();
    let at_zero: Vec<(usize, f64)> = col
        .entries
        .iter()
        .filter(|e| e.kind.is_timed() && e.time == 0.0)
        .map(|e| (e.staff, e.x))
        .collect();
    assert_eq!(at_zero.len(), 2);
    assert_eq!(at_zero[0].1, at_zero[1].1);
    assert_ne!(at_zero[0].0, at_zero[1].0);

    // each voice starts at the column start and runs without gaps
    assert!(col.voice_shifts.is_empty());
    let prolog: Vec<&str> = col.prolog_entries().map(|e| e.kind.name()).collect();
    assert_eq!(prolog, vec!["key", "key", "time", "time", "clef", "clef"]);
}

// ─── Barlines ───────────────────────────────────────────────────────

#[test]
fn hidden_barline_is_a_weaker_break() {
    let hidden = r#"<barline location="right"><bar-style>none</bar-style></barline>"#;
    let xml = score_xml(&[("P1", "Flute", &melody(hidden))]);
    let options = SpacingOptions::default();
    let report = layout_xml(&xml, &options);

    assert_eq!(report.columns.len(), 2);
    let first = &report.columns[0];
    assert!(first.has_barline);
    assert!(!first.has_visible_barline);
    assert_eq!(first.penalty, options.penalty_hidden_barline);
    assert_eq!(report.columns[1].penalty, options.penalty_visible_barline);
}

#[test]
fn right_barline_closes_a_measure_with_a_short_second_voice() {
    let two_voices = r#"
  <measure number="1">
    <attributes>
      <divisions>1</divisions>
      <clef><sign>G</sign><line>2</line></clef>
    </attributes>
    <note><pitch><step>G</step><octave>4</octave></pitch><duration>2</duration><voice>1</voice><type>half</type></note>
    <note><pitch><step>A</step><octave>4</octave></pitch><duration>2</duration><voice>1</voice><type>half</type></note>
    <backup><duration>4</duration></backup>
    <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration><voice>2</voice><type>quarter</type></note>
    <barline location="right"><bar-style>light-heavy</bar-style></barline>
  </measure>
  <measure number="2">
    <note><pitch><step>B</step><octave>4</octave></pitch><duration>4</duration><voice>1</voice><type>whole</type></note>
  </measure>"#;
    let xml = score_xml(&[("P1", "Oboe", two_voices), ("P2", "Flute", &melody(""))]);
    let report = layout_xml(&xml, &SpacingOptions::default());

    assert_eq!(report.columns.len(), 2);
    let starts: Vec<f64> = report.columns.iter().map(|c| c.start_time).collect();
    assert_eq!(starts, vec![0.0, 4.0]);
    assert!(report.columns.iter().all(|c| c.has_barline));
    let collected: usize = report.columns.iter().map(|c| c.num_entries).sum();
    assert_eq!(collected, report.num_staffobjs);
}

#[test]
fn implicit_barline_ends_every_measure() {
    let xml = score_xml(&[("P1", "Flute", &melody(""))]);
    let report = layout_xml(&xml, &SpacingOptions::default());
    assert_eq!(report.columns.len(), 2);
    assert!(report.columns.iter().all(|c| c.has_visible_barline));
    assert_eq!(report.columns[1].start_time, 4.0);
}

// ─── Several instruments ────────────────────────────────────────────

#[test]
fn prolog_aligned_across_instruments() {
    let cello = r#"
  <measure number="1">
    <attributes>
      <divisions>1</divisions>
      <key><fifths>-3</fifths></key>
      <clef><sign>F</sign><line>4</line></clef>
    </attributes>
    <note><pitch><step>C</step><octave>3</octave></pitch><duration>4</duration><type>whole</type></note>
  </measure>
  <measure number="2">
    <note><rest measure="yes"/><duration>4</duration></note>
  </measure>"#;
    let xml = score_xml(&[("P1", "Flute", &melody("")), ("P2", "Cello", cello)]);
    let mut reporter = Reporter::new();
    let score = parse_musicxml(&xml, &mut reporter).unwrap();
    let table = ColStaffObjs::from_score(&score);
    let mut alg = SpAlgColumn::new(&table, SpacingOptions::default());
    alg.split_content_in_columns();
    alg.do_spacing_algorithm();

    assert_eq!(alg.get_num_columns(), 2);
    let col = alg.column(0).unwrap();
    let clefs: Vec<(usize, bool, f64)> = col
        .entries
        .iter()
        .filter(|e| matches!(e.kind, StaffObjKind::Clef(_)))
        .map(|e| (e.instr, e.in_prolog, e.x))
        .collect();
    assert_eq!(clefs.len(), 2);
    assert!(clefs.iter().all(|c| c.1));
    assert_eq!(clefs[0].2, clefs[1].2);

    // notes of both instruments start after the whole prolog
    let key_x = col.entries.iter().find(|e| matches!(e.kind, StaffObjKind::Key(_))).unwrap().x;
    let first_note_x = col.entries.iter().filter(|e| e.kind.is_timed()).map(|e| e.x).fold(f64::MAX, f64::min);
    assert!(first_note_x > key_x);

    // the flute has no key: only the cello staff gets a saved key
    assert!(alg.get_prolog_key(0, 0).is_none());
    assert!(alg.get_prolog_key(0, 1).is_some());
}

// ─── Entry points ───────────────────────────────────────────────────

#[test]
fn layout_bytes_and_json() {
    let xml = score_xml(&[("P1", "Piano", PIANO)]);
    let report = layout_bytes(xml.as_bytes(), Some("musicxml"), &SpacingOptions::default()).unwrap();
    let json = columns_report_to_json(&report).unwrap();

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["title"], "Spacing Study");
    assert_eq!(value["columns"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["columns"][0]["has_system_break"], true);

    // format detection without a hint
    let detected = layout_bytes(xml.as_bytes(), None, &SpacingOptions::default()).unwrap();
    assert_eq!(detected, report);
}

#[test]
fn compressed_mxl_is_read_through_its_container() {
    let xml = score_xml(&[("P1", "Flute", &melody(""))]);
    let container = r#"<?xml version="1.0"?>
<container><rootfiles><rootfile full-path="score/study.musicxml"/></rootfiles></container>"#;

    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options =
            zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("META-INF/container.xml", options).unwrap();
        zip.write_all(container.as_bytes()).unwrap();
        zip.start_file("score/study.musicxml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    let data = buffer.into_inner();

    let report = layout_bytes(&data, Some("mxl"), &SpacingOptions::default()).unwrap();
    assert_eq!(report.columns.len(), 2);
    let mut reporter = Reporter::new();
    let score = parse_bytes(&data, None, &mut reporter).unwrap();
    assert_eq!(score.instruments[0].name, "Flute");
}

#[test]
fn import_errors() {
    let options = SpacingOptions::default();
    let err = layout_bytes(b"<score-partwise><part", Some("xml"), &options).unwrap_err();
    assert!(matches!(err, LayoutError::Xml(_)));

    let err = layout_bytes(b"<score-timewise/>", Some("xml"), &options).unwrap_err();
    assert!(matches!(err, LayoutError::UnsupportedFormat(_)));

    let err = layout_bytes(&[0xff, 0xfe, 0x00], Some("musicxml"), &options).unwrap_err();
    assert!(matches!(err, LayoutError::UnsupportedFormat(_)));

    let bad = SpacingOptions { quarter_space: 0.0, ..Default::default() };
    let xml = score_xml(&[("P1", "Flute", &melody(""))]);
    let err = layout_bytes(xml.as_bytes(), None, &bad).unwrap_err();
    assert!(matches!(err, LayoutError::InvalidOptions(_)));
}

#[test]
fn undeclared_part_is_reported() {
    let xml = score_xml(&[("P1", "Flute", &melody(""))]).replace(r#"<part id="P1">"#, r#"<part id="P9">"#);
    let report = layout_xml(&xml, &SpacingOptions::default());
    assert!(report.columns.is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].severity, Severity::Warning);
}

// ─── Options ────────────────────────────────────────────────────────

#[test]
fn options_from_partial_json() {
    let options = SpacingOptions::from_json(r#"{"quarter_space": 50.0, "max_column_duration": 2.0}"#).unwrap();
    assert_eq!(options.quarter_space, 50.0);
    assert_eq!(options.max_column_duration, Some(2.0));
    assert_eq!(options.prolog_gap, SpacingOptions::default().prolog_gap);

    let xml = score_xml(&[("P1", "Flute", &melody(""))]);
    let wide = layout_bytes(xml.as_bytes(), None, &options).unwrap();
    let narrow = layout_bytes(xml.as_bytes(), None, &SpacingOptions::default()).unwrap();
    assert!(wide.total_width > narrow.total_width);
    // the two halves of measure 1 become separate columns
    assert_eq!(wide.columns.len(), 3);

    assert!(SpacingOptions::from_json(r#"{"spacing_exponent": 2.0}"#).is_err());
}

// ─── C FFI ──────────────────────────────────────────────────────────

#[test]
fn ffi_round_trip() {
    let xml = score_xml(&[("P1", "Piano", PIANO)]);
    let ext = CString::new("musicxml").unwrap();
    let ptr = unsafe { scorespacing::scorespacing_layout_bytes(xml.as_ptr(), xml.len(), ext.as_ptr(), std::ptr::null()) };
    assert!(!ptr.is_null());
    let json = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
    unsafe { scorespacing::scorespacing_free_string(ptr) };

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["columns"].as_array().map(Vec::len), Some(2));
    assert!(value.get("error").is_none());
}

#[test]
fn ffi_reports_errors_as_json() {
    let xml = score_xml(&[("P1", "Flute", &melody(""))]);
    let options = CString::new(r#"{"quarter_space": -1.0}"#).unwrap();
    let ptr = unsafe {
        scorespacing::scorespacing_layout_bytes(xml.as_ptr(), xml.len(), std::ptr::null(), options.as_ptr())
    };
    assert!(!ptr.is_null());
    let json = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
    unsafe { scorespacing::scorespacing_free_string(ptr) };
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["error"].as_str().unwrap().contains("quarter_space"));

    let null = unsafe { scorespacing::scorespacing_layout_bytes(std::ptr::null(), 0, std::ptr::null(), std::ptr::null()) };
    assert!(null.is_null());
    unsafe { scorespacing::scorespacing_free_string(null) };
}
