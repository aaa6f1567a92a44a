//! Episode metadata lookup against the Podcasts library database, with a
//! filename fallback when the database cannot answer.

mod identifier;
mod schema;


use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ResolveError;
use crate::models::{EpisodeMetadata, Provenance};
use crate::scanner::CandidateFile;

pub use identifier::{normalize_duplicate_suffix, title_from_file_name, transcript_identifier};
pub use schema::{apple_date, EpisodeRow, SchemaVariant, APPLE_EPOCH_OFFSET, SCHEMA_VARIANTS};

pub const UNKNOWN_PODCAST: &str = "Unknown Podcast";

/// How long to wait on a locked database before treating it as unavailable.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Resolves cache files to episode metadata for one scan pass.
///
/// The database is opened read-only once, when the resolver is built, and
/// closed when it is dropped. Resolution itself never fails: every call
/// returns metadata tagged with where it came from.
pub struct MetadataResolver {
    conn: Option<Mutex<Connection>>,
    unavailable_reason: Option<String>,
    cache_root: PathBuf,
}

impl MetadataResolver {
    pub fn open(database_path: &Path, cache_root: &Path) -> Self {
        Self::open_with_timeout(database_path, cache_root, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(
        database_path: &Path,
        cache_root: &Path,
        busy_timeout: Duration,
    ) -> Self {
        let (conn, unavailable_reason) = match open_read_only(database_path, busy_timeout) {
            Ok(conn) => {
                log::info!("Using episode metadata from {}", database_path.display());
                (Some(Mutex::new(conn)), None)
            }
            Err(e) => {
                log::info!("{}; episode titles will come from file names", e);
                (None, Some(e.to_string()))
            }
        };

        Self {
            conn,
            unavailable_reason,
            cache_root: cache_root.to_path_buf(),
        }
    }

    /// A resolver that never touches a database.
    pub fn without_database(cache_root: &Path) -> Self {
        Self {
            conn: None,
            unavailable_reason: Some("metadata database disabled".to_string()),
            cache_root: cache_root.to_path_buf(),
        }
    }

    pub fn database_available(&self) -> bool {
        self.conn.is_some()
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable_reason.as_deref()
    }

    pub fn resolve(&self, candidate: &CandidateFile) -> EpisodeMetadata {
        let fallback = fallback_metadata(candidate);
        let identifier = transcript_identifier(&candidate.path, &self.cache_root);

        match self.lookup(&identifier) {
            Ok(row) => from_database(row, fallback),
            Err(e) => {
                log::debug!("Filename metadata for {}: {}", identifier, e);
                fallback
            }
        }
    }

    /// Try each schema variant in order. A schema mismatch moves on to the
    /// next variant; any other outcome (match, no match, query failure) ends
    /// the search.
    pub fn lookup(&self, identifier: &str) -> Result<EpisodeRow, ResolveError> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| {
                ResolveError::DatabaseUnavailable(
                    self.unavailable_reason.clone().unwrap_or_default(),
                )
            })?
            .lock()
            .map_err(|_| ResolveError::DatabaseUnavailable("connection lock poisoned".to_string()))?;

        let mut last_mismatch = None;
        for variant in SCHEMA_VARIANTS {
            match variant.fetch(&conn, identifier) {
                Err(e @ ResolveError::SchemaMismatch { .. }) => {
                    log::debug!("{}", e);
                    last_mismatch = Some(e);
                }
                other => return other,
            }
        }

        Err(last_mismatch.unwrap_or(ResolveError::NoMatch))
    }
}

fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Connection, ResolveError> {
    let unavailable = |e: rusqlite::Error| {
        ResolveError::DatabaseUnavailable(format!("{}: {}", path.display(), e))
    };

    if !path.is_file() {
        return Err(ResolveError::DatabaseUnavailable(format!(
            "{} not found",
            path.display()
        )));
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(unavailable)?;
    conn.busy_timeout(busy_timeout).map_err(unavailable)?;

    // Opening is lazy in SQLite; touch the schema so a locked or corrupt file
    // is reported here instead of on every lookup.
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(unavailable)?;

    Ok(conn)
}

/// Metadata synthesized from the file name and modification time.
pub fn fallback_metadata(candidate: &CandidateFile) -> EpisodeMetadata {
    EpisodeMetadata {
        podcast_name: UNKNOWN_PODCAST.to_string(),
        episode_title: title_from_file_name(&candidate.path),
        published_at: Some(candidate.modified),
        duration_estimate: None,
        source: Provenance::FromFilenameFallback,
    }
}

/// Missing title fields borrow the fallback's display strings; a missing date
/// or duration stays unset.
fn from_database(row: EpisodeRow, fallback: EpisodeMetadata) -> EpisodeMetadata {
    EpisodeMetadata {
        podcast_name: row.podcast_title.unwrap_or(fallback.podcast_name),
        episode_title: row.episode_title.unwrap_or(fallback.episode_title),
        published_at: row.published_at,
        duration_estimate: row.duration_secs,
        source: Provenance::FromDatabase,
    }
}
