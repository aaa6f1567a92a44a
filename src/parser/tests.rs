// TTML parsing tests. Documents are built inline in the shape the Podcasts
// app caches them.

use super::*;
use std::path::PathBuf;

fn path() -> PathBuf {
    PathBuf::from("/cache/TTML/transcript_1000746774876.ttml")
}

fn ttml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttm="http://www.w3.org/ns/ttml#metadata" xmlns:podcasts="http://podcasts.apple.com/transcript-ttml-internal">
  <head><metadata/></head>
  <body dur="10:00.000">
    <div>
{}
    </div>
  </body>
</tt>"#,
        body
    )
}

fn parse(doc: &str) -> Result<Transcript, ParseError> {
    parse_ttml(doc.as_bytes(), &path(), &ParseOptions::default())
}

fn texts(t: &Transcript) -> Vec<&str> {
    t.segments().iter().map(|s| s.text()).collect()
}

#[test]
fn test_simple_paragraph() {
    let t = parse(&ttml(r#"<p begin="0" end="5">Hello world</p>"#)).unwrap();
    assert_eq!(t.segments().len(), 1);
    let seg = &t.segments()[0];
    assert_eq!(seg.text(), "Hello world");
    assert_eq!(seg.start(), Timestamp::ZERO);
    assert_eq!(seg.end(), Timestamp::from_secs(5));
    assert_eq!(t.source_path(), path().as_path());
    assert!(t.metadata().is_none());
}

#[test]
fn test_multiple_paragraphs() {
    let t = parse(&ttml(
        r#"<p begin="0" end="5">First paragraph</p>
           <p begin="5" end="10">Second paragraph</p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["First paragraph", "Second paragraph"]);
}

#[test]
fn test_nested_word_spans() {
    let t = parse(&ttml(
        r#"<p begin="00:00:01.000" end="00:00:03.250">
             <span podcasts:unit="sentence">
               <span podcasts:unit="word" begin="00:00:01.000" end="00:00:01.400">Hello</span>
               <span podcasts:unit="word" begin="00:00:01.400" end="00:00:02.000">world,</span>
             </span>
             <span podcasts:unit="sentence"><span podcasts:unit="word">again</span></span>
           </p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["Hello world, again"]);
    assert_eq!(t.segments()[0].end(), Timestamp::from_millis(3_250));
}

#[test]
fn test_tail_text_and_whitespace_normalized() {
    let t = parse(&ttml(
        "<p begin=\"0\" end=\"1\"><span>Hello</span>    there\n\n\n <span>friend</span></p>",
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["Hello there friend"]);
}

#[test]
fn test_empty_paragraphs_skipped() {
    let t = parse(&ttml(
        r#"<p begin="0" end="5"></p>
           <p begin="5" end="6">   </p>
           <p begin="6" end="10">Not empty</p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["Not empty"]);
}

#[test]
fn test_speaker_from_ttm_agent() {
    let t = parse(&ttml(
        r#"<p begin="0" end="5" ttm:agent="SPEAKER_1">Hello world</p>
           <p begin="5" end="6">No speaker</p>"#,
    ))
    .unwrap();
    assert_eq!(t.segments()[0].speaker(), Some("SPEAKER_1"));
    assert_eq!(t.segments()[1].speaker(), None);
}

#[test]
fn test_speaker_matched_by_namespace_not_prefix() {
    let doc = r#"<tt:tt xmlns:tt="http://www.w3.org/ns/ttml" xmlns:meta="http://www.w3.org/ns/ttml#metadata">
  <tt:body><tt:div>
    <tt:p begin="1.0" end="2.0" meta:agent="HOST">Prefixed</tt:p>
  </tt:div></tt:body>
</tt:tt>"#;
    let t = parse(doc).unwrap();
    assert_eq!(texts(&t), vec!["Prefixed"]);
    assert_eq!(t.segments()[0].speaker(), Some("HOST"));
}

#[test]
fn test_speaker_inherited_from_div() {
    let doc = r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttm="http://www.w3.org/ns/ttml#metadata">
  <body><div ttm:agent="GUEST">
    <p begin="0" end="1">From the div</p>
  </div></body>
</tt>"#;
    let t = parse(doc).unwrap();
    assert_eq!(t.segments()[0].speaker(), Some("GUEST"));
}

#[test]
fn test_speaker_from_nested_span() {
    let t = parse(&ttml(
        r#"<p begin="0" end="1"><span ttm:agent="SPEAKER_2">Nested</span></p>"#,
    ))
    .unwrap();
    assert_eq!(t.segments()[0].speaker(), Some("SPEAKER_2"));
}

#[test]
fn test_agent_declaration_resolves_display_name() {
    let doc = r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttm="http://www.w3.org/ns/ttml#metadata">
  <head><metadata>
    <ttm:agent xml:id="SPEAKER_1" type="person"><ttm:name type="full">Jane Host</ttm:name></ttm:agent>
  </metadata></head>
  <body><div>
    <p begin="0" end="1" ttm:agent="SPEAKER_1">Welcome</p>
    <p begin="1" end="2" ttm:agent="SPEAKER_9">Unknown agent</p>
  </div></body>
</tt>"#;
    let t = parse(doc).unwrap();
    assert_eq!(t.segments()[0].speaker(), Some("Jane Host"));
    assert_eq!(t.segments()[1].speaker(), Some("SPEAKER_9"));
}

#[test]
fn test_unnamespaced_document_accepted() {
    let doc = r#"<tt><body><div><p begin="0" end="1">Plain</p></div></body></tt>"#;
    let t = parse(doc).unwrap();
    assert_eq!(texts(&t), vec!["Plain"]);
}

#[test]
fn test_foreign_namespace_p_ignored() {
    let doc = r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:h="http://www.w3.org/1999/xhtml">
  <body><div>
    <h:p begin="0" end="1">Not TTML</h:p>
    <p begin="1" end="2">TTML</p>
  </div></body>
</tt>"#;
    let t = parse(doc).unwrap();
    assert_eq!(texts(&t), vec!["TTML"]);
}

#[test]
fn test_malformed_timestamp_skips_only_that_element() {
    let t = parse(&ttml(
        r#"<p begin="0" end="1">Good</p>
           <p begin="garbage" end="2">Bad begin</p>
           <p begin="3" end="4:xx">Bad end</p>
           <p begin="5" end="6">Also good</p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["Good", "Also good"]);
}

#[test]
fn test_timestamps_past_i64_millis_still_group() {
    let t = parse(&ttml(
        r#"<p begin="0" end="9223372036854775.808">first</p>
           <p begin="9223372036854775.000" end="9223372036854775.100">second</p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["first", "second"]);
    // The second span overlaps the first, so no gap opens a new paragraph.
    assert_eq!(t.paragraphs().len(), 1);
}

#[test]
fn test_missing_begin_or_end_not_a_segment() {
    let t = parse(&ttml(
        r#"<p begin="0">No end</p>
           <p end="1">No begin</p>
           <p begin="1" end="2">Complete</p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["Complete"]);
}

#[test]
fn test_inverted_span_skipped() {
    let t = parse(&ttml(
        r#"<p begin="5" end="4">Backwards</p>
           <p begin="5" end="6">Forwards</p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["Forwards"]);
}

#[test]
fn test_out_of_order_segments_sorted() {
    let t = parse(&ttml(
        r#"<p begin="00:10.000" end="00:11.000">third</p>
           <p begin="00:00.000" end="00:01.000">first</p>
           <p begin="00:05.000" end="00:06.000">second</p>"#,
    ))
    .unwrap();
    assert_eq!(texts(&t), vec!["first", "second", "third"]);
    let starts: Vec<_> = t.segments().iter().map(|s| s.start()).collect();
    let mut sorted = starts.clone();
    sorted.sort();
    assert_eq!(starts, sorted);
}

#[test]
fn test_paragraphs_grouped_by_gap() {
    let t = parse(&ttml(
        r#"<p begin="0.0" end="1.0">Hello</p>
           <p begin="1.5" end="2.0">world</p>
           <p begin="5.0" end="6.0">Bye</p>"#,
    ))
    .unwrap();
    let paragraphs: Vec<&str> = t.paragraphs().iter().map(|p| p.text.as_str()).collect();
    assert_eq!(paragraphs, vec!["Hello world", "Bye"]);
    assert_eq!(t.paragraph_text(), "Hello world\n\nBye");
}

#[test]
fn test_custom_paragraph_gap() {
    let doc = ttml(
        r#"<p begin="0.0" end="1.0">Hello</p>
           <p begin="1.5" end="2.0">world</p>"#,
    );
    let options = ParseOptions {
        paragraph_gap: Timestamp::from_millis(250),
    };
    let t = parse_ttml(doc.as_bytes(), &path(), &options).unwrap();
    assert_eq!(t.paragraphs().len(), 2);
}

#[test]
fn test_empty_document_is_no_content() {
    let result = parse(&ttml(""));
    assert!(matches!(result, Err(ParseError::NoContentExtracted)));
}

#[test]
fn test_only_empty_text_is_no_content() {
    let result = parse(&ttml(r#"<p begin="0" end="1"> </p><p begin="x" end="2">bad</p>"#));
    assert!(matches!(result, Err(ParseError::NoContentExtracted)));
}

#[test]
fn test_invalid_xml_is_error() {
    let result = parse("<tt><body><p begin=\"0\" end=\"1\">unclosed</body>");
    assert!(matches!(result, Err(ParseError::Xml(_))));
}

#[test]
fn test_invalid_utf8_is_error() {
    let result = parse_ttml(&[0x3c, 0xff, 0xfe, 0x3e], &path(), &ParseOptions::default());
    assert!(matches!(result, Err(ParseError::Encoding(_))));
}

#[test]
fn test_byte_order_mark_accepted() {
    let doc = format!("\u{FEFF}{}", ttml(r#"<p begin="0" end="1">BOM</p>"#));
    assert_eq!(texts(&parse(&doc).unwrap()), vec!["BOM"]);
}

#[test]
fn test_parse_file_missing() {
    let result = parse_file(
        Path::new("/nonexistent/file.ttml"),
        &ParseOptions::default(),
    );
    assert!(matches!(result, Err(ParseError::Io(_))));
}

#[test]
fn test_parse_file_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("episode-42.ttml");
    std::fs::write(&file, ttml(r#"<p begin="0" end="125.5">Test</p>"#)).unwrap();

    let t = parse_file(&file, &ParseOptions::default()).unwrap();
    assert_eq!(t.duration(), Timestamp::from_millis(125_500));
    assert_eq!(t.source_path(), file.as_path());
}
