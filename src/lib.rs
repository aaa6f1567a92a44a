//! Rebuilds readable transcripts from the TTML files the Podcasts app caches,
//! and labels each one with its episode and show from the library database.

pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod scanner;

pub use config::{Config, Overrides};
pub use error::{ConfigError, ParseError, ResolveError, ScanError, UnavailableReason};
pub use metadata::MetadataResolver;
pub use models::{EpisodeMetadata, Paragraph, Provenance, Segment, Transcript};
pub use parser::{parse_file, parse_ttml, ParseOptions, Timestamp};
pub use pipeline::{Library, Pipeline, SkippedFile};
pub use scanner::{CandidateFile, Scanner};
