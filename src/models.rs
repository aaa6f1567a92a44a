use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::parser::Timestamp;

/// One time-coded span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    start: Timestamp,
    end: Timestamp,
    text: String,
    speaker: Option<String>,
}

impl Segment {
    /// Returns `None` unless `start < end` and `text` has visible content.
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        text: impl Into<String>,
        speaker: Option<String>,
    ) -> Option<Self> {
        let text = text.into();
        if start >= end || text.trim().is_empty() {
            return None;
        }
        let speaker = speaker
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Some(Self {
            start,
            end,
            text,
            speaker,
        })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }
}

/// A run of segments grouped by temporal proximity and speaker continuity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    pub start: Timestamp,
    pub end: Timestamp,
    pub speaker: Option<String>,
    pub text: String,
    pub segment_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    FromDatabase,
    FromFilenameFallback,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromDatabase => write!(f, "database"),
            Self::FromFilenameFallback => write!(f, "filename"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub podcast_name: String,
    pub episode_title: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Seconds, as reported by the library database.
    pub duration_estimate: Option<f64>,
    pub source: Provenance,
}

impl EpisodeMetadata {
    pub fn is_fallback(&self) -> bool {
        self.source == Provenance::FromFilenameFallback
    }

    pub fn duration_formatted(&self) -> String {
        match self.duration_estimate {
            Some(secs) if secs > 0.0 => format!("~{} min", (secs / 60.0) as u64),
            _ => "Unknown".to_string(),
        }
    }
}

/// A parsed transcript file. Segments are never empty and are ordered by start.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    source_path: PathBuf,
    segments: Vec<Segment>,
    paragraphs: Vec<Paragraph>,
    metadata: Option<EpisodeMetadata>,
}

impl Transcript {
    /// Only the parser builds transcripts; it guarantees the ordering and
    /// non-empty invariants before calling this.
    pub(crate) fn from_parts(
        source_path: PathBuf,
        segments: Vec<Segment>,
        paragraphs: Vec<Paragraph>,
    ) -> Self {
        debug_assert!(!segments.is_empty());
        Self {
            source_path,
            segments,
            paragraphs,
            metadata: None,
        }
    }

    /// The single metadata-attachment step.
    pub fn with_metadata(mut self, metadata: EpisodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn metadata(&self) -> Option<&EpisodeMetadata> {
        self.metadata.as_ref()
    }

    pub fn episode_title(&self) -> String {
        match &self.metadata {
            Some(m) => m.episode_title.clone(),
            None => self
                .source_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn podcast_name(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.podcast_name.as_str())
            .unwrap_or("Unknown Podcast")
    }

    /// Latest segment end; the transcript's own duration estimate.
    pub fn duration(&self) -> Timestamp {
        self.segments
            .iter()
            .map(|s| s.end)
            .max()
            .unwrap_or_default()
    }

    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn paragraph_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One line per segment: `[HH:MM:SS] Speaker: text`.
    pub fn text_with_timestamps(&self) -> String {
        self.segments
            .iter()
            .map(|s| match &s.speaker {
                Some(speaker) => format!("[{}] {}: {}", s.start.clock(), speaker, s.text),
                None => format!("[{}] {}", s.start.clock(), s.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn word_count(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum()
    }
}
