use crate::models::{Paragraph, Segment};

use super::Timestamp;

/// Silence longer than this between two segments starts a new paragraph.
pub const PARAGRAPH_GAP: Timestamp = Timestamp::from_secs(2);

/// Group ordered segments into paragraphs.
///
/// A boundary opens when the gap from the previous segment's end to the
/// current segment's start is strictly greater than `gap_threshold`, or when
/// the speaker label differs from the previous segment's. Overlapping
/// segments produce a negative gap and never force a boundary on their own.
pub fn group_paragraphs(segments: &[Segment], gap_threshold: Timestamp) -> Vec<Paragraph> {
    let threshold = gap_threshold.as_millis() as i64;
    let mut paragraphs = Vec::new();
    let mut current: Vec<&Segment> = Vec::new();

    for segment in segments {
        if let Some(prev) = current.last() {
            let gap = segment.start().millis_since(prev.end());
            if gap > threshold || segment.speaker() != prev.speaker() {
                paragraphs.push(close_paragraph(&current));
                current.clear();
            }
        }
        current.push(segment);
    }

    if !current.is_empty() {
        paragraphs.push(close_paragraph(&current));
    }

    paragraphs
}

fn close_paragraph(members: &[&Segment]) -> Paragraph {
    let first = members[0];
    let last = members[members.len() - 1];
    Paragraph {
        start: first.start(),
        end: last.end(),
        speaker: first.speaker().map(str::to_string),
        text: members
            .iter()
            .map(|s| s.text())
            .collect::<Vec<_>>()
            .join(" "),
        segment_count: members.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start_ms: u64, end_ms: u64, text: &str, speaker: Option<&str>) -> Segment {
        Segment::new(
            Timestamp::from_millis(start_ms),
            Timestamp::from_millis(end_ms),
            text,
            speaker.map(str::to_string),
        )
        .unwrap()
    }

    fn texts(paragraphs: &[Paragraph]) -> Vec<&str> {
        paragraphs.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn test_gap_splits_after_threshold() {
        let segments = vec![
            seg(0, 1_000, "Hello", None),
            seg(1_500, 2_000, "world", None),
            seg(5_000, 6_000, "Bye", None),
        ];
        let paragraphs = group_paragraphs(&segments, PARAGRAPH_GAP);
        assert_eq!(texts(&paragraphs), vec!["Hello world", "Bye"]);
        assert_eq!(paragraphs[0].start, Timestamp::ZERO);
        assert_eq!(paragraphs[0].end, Timestamp::from_millis(2_000));
        assert_eq!(paragraphs[0].segment_count, 2);
        assert_eq!(paragraphs[1].start, Timestamp::from_millis(5_000));
    }

    #[test]
    fn test_gap_of_exactly_threshold_stays_together() {
        let segments = vec![seg(0, 1_000, "one", None), seg(3_000, 4_000, "two", None)];
        let paragraphs = group_paragraphs(&segments, PARAGRAPH_GAP);
        assert_eq!(texts(&paragraphs), vec!["one two"]);
    }

    #[test]
    fn test_gap_just_over_threshold_splits() {
        let segments = vec![seg(0, 1_000, "one", None), seg(3_001, 4_000, "two", None)];
        let paragraphs = group_paragraphs(&segments, PARAGRAPH_GAP);
        assert_eq!(texts(&paragraphs), vec!["one", "two"]);
    }

    #[test]
    fn test_speaker_change_forces_boundary() {
        let segments = vec![
            seg(0, 1_000, "Hi", Some("SPEAKER_1")),
            seg(1_100, 2_000, "Hey", Some("SPEAKER_2")),
            seg(2_100, 3_000, "there", Some("SPEAKER_2")),
        ];
        let paragraphs = group_paragraphs(&segments, PARAGRAPH_GAP);
        assert_eq!(texts(&paragraphs), vec!["Hi", "Hey there"]);
        assert_eq!(paragraphs[1].speaker.as_deref(), Some("SPEAKER_2"));
    }

    #[test]
    fn test_labelled_to_unlabelled_is_a_change() {
        let segments = vec![seg(0, 1_000, "Hi", Some("A")), seg(1_000, 2_000, "anon", None)];
        assert_eq!(group_paragraphs(&segments, PARAGRAPH_GAP).len(), 2);
    }

    #[test]
    fn test_overlap_is_tolerated() {
        let segments = vec![seg(0, 3_000, "long", None), seg(1_000, 4_000, "overlap", None)];
        let paragraphs = group_paragraphs(&segments, PARAGRAPH_GAP);
        assert_eq!(texts(&paragraphs), vec!["long overlap"]);
        assert_eq!(paragraphs[0].end, Timestamp::from_millis(4_000));
    }

    #[test]
    fn test_boundaries_match_gap_or_speaker_rule() {
        // Mixed gaps around the threshold and speaker flips.
        let segments = vec![
            seg(0, 500, "a", None),
            seg(2_500, 3_000, "b", None),
            seg(5_001, 5_500, "c", None),
            seg(5_600, 6_000, "d", Some("X")),
            seg(7_999, 8_500, "e", Some("X")),
            seg(10_501, 11_000, "f", Some("X")),
        ];
        let paragraphs = group_paragraphs(&segments, PARAGRAPH_GAP);

        let mut expected_boundaries = 0;
        for pair in segments.windows(2) {
            let gap = pair[1].start().millis_since(pair[0].end());
            if gap > 2_000 || pair[0].speaker() != pair[1].speaker() {
                expected_boundaries += 1;
            }
        }
        assert_eq!(paragraphs.len(), expected_boundaries + 1);
        assert_eq!(texts(&paragraphs), vec!["a b", "c", "d e", "f"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_paragraphs(&[], PARAGRAPH_GAP).is_empty());
    }
}
