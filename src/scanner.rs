use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ScanError, UnavailableReason};

pub const TTML_EXTENSION: &str = "ttml";

/// A cache file found on disk, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

/// Walks the transcript cache root looking for `.ttml` files.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk of the cache root. The returned iterator is lazy and
    /// reads directory state as it goes.
    pub fn scan(&self) -> Result<Candidates, ScanError> {
        let unavailable = |reason: UnavailableReason| ScanError::CacheUnavailable {
            root: self.root.clone(),
            reason,
        };

        let meta = std::fs::metadata(&self.root).map_err(|e| unavailable(e.into()))?;
        if !meta.is_dir() {
            return Err(unavailable(UnavailableReason::NotADirectory));
        }
        // Surfaces permission problems on the root itself up front.
        std::fs::read_dir(&self.root).map_err(|e| unavailable(e.into()))?;

        log::debug!("Scanning transcript cache at {}", self.root.display());

        Ok(Candidates {
            walker: WalkDir::new(&self.root).follow_links(false).into_iter(),
        })
    }
}

/// Lazy sequence of cache files under one root.
pub struct Candidates {
    walker: walkdir::IntoIter,
}

impl Iterator for Candidates {
    type Item = CandidateFile;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable cache entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_cache_file_name(entry.path()) {
                continue;
            }

            match entry.metadata().map_err(std::io::Error::from).and_then(|m| m.modified()) {
                Ok(modified) => {
                    return Some(CandidateFile {
                        path: entry.into_path(),
                        modified: DateTime::<Utc>::from(modified),
                    })
                }
                Err(e) => log::warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }
    }
}

/// `*.ttml`, including the duplicated `name.ttml-123.ttml` form. Hidden files
/// are never transcripts.
pub fn is_cache_file_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(TTML_EXTENSION))
        .unwrap_or(false)
}
