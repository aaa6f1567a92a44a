//! TTML → [`Transcript`].
//!
//! Cached transcripts are TTML documents whose `<p>` elements carry
//! `begin`/`end` clock times, nested word `<span>`s, and an optional
//! `ttm:agent` speaker reference. Element and attribute names are matched by
//! namespace URI, never by prefix.

mod paragraphs;
mod timestamp;

#[cfg(test)]
mod tests;

use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ParseError;
use crate::models::{Segment, Transcript};

pub use paragraphs::{group_paragraphs, PARAGRAPH_GAP};
pub use timestamp::{ClockEncoding, Timestamp};

pub const TTML_NS: &str = "http://www.w3.org/ns/ttml";
pub const TTML_METADATA_NS: &str = "http://www.w3.org/ns/ttml#metadata";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub paragraph_gap: Timestamp,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            paragraph_gap: PARAGRAPH_GAP,
        }
    }
}

/// Read and parse one cache file.
pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<Transcript, ParseError> {
    let bytes = std::fs::read(path)?;
    parse_ttml(&bytes, path, options)
}

/// Parse TTML bytes into a transcript. Fails with
/// [`ParseError::NoContentExtracted`] when no element yields a usable segment.
pub fn parse_ttml(
    content: &[u8],
    source_path: &Path,
    options: &ParseOptions,
) -> Result<Transcript, ParseError> {
    let text = std::str::from_utf8(content)?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let doc = Document::parse(text)?;

    let mut segments = extract_segments(&doc, source_path);
    if segments.is_empty() {
        return Err(ParseError::NoContentExtracted);
    }

    // Cache files are already in order; this only guards against bad input.
    segments.sort_by_key(|s| s.start());
    let paragraphs = group_paragraphs(&segments, options.paragraph_gap);

    Ok(Transcript::from_parts(
        source_path.to_path_buf(),
        segments,
        paragraphs,
    ))
}

fn extract_segments(doc: &Document, source_path: &Path) -> Vec<Segment> {
    let agents = agent_names(doc);
    let mut segments = Vec::new();
    let mut malformed = 0usize;

    for p in doc.descendants().filter(is_paragraph) {
        let (Some(begin), Some(end)) = (ttml_attribute(p, "begin"), ttml_attribute(p, "end"))
        else {
            continue;
        };

        let (start, end) = match (Timestamp::parse(begin), Timestamp::parse(end)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                malformed += 1;
                log::debug!("{}: {}", source_path.display(), e);
                continue;
            }
        };

        let text = element_text(p);
        if text.is_empty() {
            continue;
        }

        let speaker = speaker_label(p)
            .map(|id| agents.get(id).cloned().unwrap_or_else(|| id.to_string()));

        match Segment::new(start, end, text, speaker) {
            Some(segment) => segments.push(segment),
            None => log::debug!(
                "Skipping zero-length span {}-{} in {}",
                start,
                end,
                source_path.display()
            ),
        }
    }

    if malformed > 0 {
        log::warn!(
            "Skipped {} element(s) with malformed timestamps in {}",
            malformed,
            source_path.display()
        );
    }

    segments
}

fn is_paragraph(node: &Node) -> bool {
    node.is_element() && is_ttml_element(node, "p")
}

fn is_ttml_element(node: &Node, local: &str) -> bool {
    let tag = node.tag_name();
    tag.name() == local && matches!(tag.namespace(), None | Some(TTML_NS))
}

/// `begin`/`end` are normally unqualified, but some writers put them in the
/// TTML namespace.
fn ttml_attribute<'a>(node: Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attribute(local).or_else(|| node.attribute((TTML_NS, local)))
}

/// All descendant text, each run trimmed, joined by single spaces.
pub(crate) fn element_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Speaker reference on the element itself, an ancestor, or failing those a
/// nested span.
fn speaker_label<'a>(p: Node<'a, '_>) -> Option<&'a str> {
    p.ancestors()
        .filter(|n| n.is_element())
        .find_map(speaker_attribute)
        .or_else(|| {
            p.descendants()
                .skip(1)
                .filter(|n| n.is_element())
                .find_map(speaker_attribute)
        })
}

fn speaker_attribute<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((TTML_METADATA_NS, "agent"))
        .or_else(|| {
            node.attributes()
                .find(|a| {
                    let name = a.name().to_ascii_lowercase();
                    name.contains("agent") || name.contains("speaker")
                })
                .map(|a| a.value())
        })
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `<ttm:agent xml:id="…"><ttm:name>…</ttm:name></ttm:agent>` declarations,
/// mapping agent ids to display names.
fn agent_names(doc: &Document) -> HashMap<String, String> {
    doc.descendants()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == "agent"
                && n.tag_name().namespace() == Some(TTML_METADATA_NS)
        })
        .filter_map(|agent| {
            let id = agent
                .attribute((XML_NS, "id"))
                .or_else(|| agent.attribute("id"))?;
            let name = agent
                .children()
                .find(|c| {
                    c.is_element()
                        && c.tag_name().name() == "name"
                        && c.tag_name().namespace() == Some(TTML_METADATA_NS)
                })
                .map(element_text)
                .filter(|n| !n.is_empty())?;
            Some((id.to_string(), name))
        })
        .collect()
}
