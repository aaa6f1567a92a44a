use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode, Row};

use crate::error::ResolveError;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the reference
/// date for Core Data timestamps.
pub const APPLE_EPOCH_OFFSET: f64 = 978_307_200.0;

/// One known layout of the Podcasts library database.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVariant {
    pub name: &'static str,
    pub episode_table: &'static str,
    pub podcast_table: &'static str,
    /// (episode column, podcast column) joining the two tables.
    pub join: (&'static str, &'static str),
    pub key_column: &'static str,
    pub episode_title: &'static str,
    pub podcast_title: &'static str,
    pub published: Option<&'static str>,
    pub duration: Option<&'static str>,
}

/// Tried in order; the first variant SQLite accepts decides the lookup.
pub const SCHEMA_VARIANTS: &[SchemaVariant] = &[
    SchemaVariant {
        name: "current",
        episode_table: "ZMTEPISODE",
        podcast_table: "ZMTPODCAST",
        join: ("ZPODCASTUUID", "ZUUID"),
        key_column: "ZTRANSCRIPTIDENTIFIER",
        episode_title: "ZTITLE",
        podcast_title: "ZTITLE",
        published: Some("ZPUBDATE"),
        duration: Some("ZDURATION"),
    },
    SchemaVariant {
        name: "cleaned-title",
        episode_table: "ZMTEPISODE",
        podcast_table: "ZMTPODCAST",
        join: ("ZPODCASTUUID", "ZUUID"),
        key_column: "ZTRANSCRIPTIDENTIFIER",
        episode_title: "ZTITLE",
        podcast_title: "ZCLEANEDTITLE",
        published: Some("ZPUBDATE"),
        duration: None,
    },
    SchemaVariant {
        name: "core-data-fk",
        episode_table: "ZMTEPISODE",
        podcast_table: "ZMTPODCAST",
        join: ("ZPODCAST", "Z_PK"),
        key_column: "ZTRANSCRIPTIDENTIFIER",
        episode_title: "ZTITLE",
        podcast_title: "ZTITLE",
        published: Some("ZPUBDATE"),
        duration: None,
    },
];

/// Raw fields of a matched episode row. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeRow {
    pub episode_title: Option<String>,
    pub podcast_title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
}

impl SchemaVariant {
    /// Columns come back positionally: episode title, podcast title,
    /// publish date, duration.
    pub fn query(&self) -> String {
        let optional = |col: Option<&str>| match col {
            Some(c) => format!("e.{}", c),
            None => "NULL".to_string(),
        };
        format!(
            "SELECT e.{}, p.{}, {}, {}
             FROM {} e
             JOIN {} p ON e.{} = p.{}
             WHERE e.{} = ?1
             LIMIT 1",
            self.episode_title,
            self.podcast_title,
            optional(self.published),
            optional(self.duration),
            self.episode_table,
            self.podcast_table,
            self.join.0,
            self.join.1,
            self.key_column,
        )
    }

    pub fn fetch(&self, conn: &Connection, identifier: &str) -> Result<EpisodeRow, ResolveError> {
        let mut stmt = conn
            .prepare_cached(&self.query())
            .map_err(|e| self.classify(e))?;
        let mut rows = stmt
            .query(params![identifier])
            .map_err(|e| self.classify(e))?;
        match rows.next().map_err(|e| self.classify(e))? {
            Some(row) => Ok(EpisodeRow::from_row(row)),
            None => Err(ResolveError::NoMatch),
        }
    }

    /// Generic SQL errors (no such table, no such column) mean this layout
    /// does not apply. Anything else is a real query failure.
    fn classify(&self, e: rusqlite::Error) -> ResolveError {
        match e {
            rusqlite::Error::SqliteFailure(err, message) if err.code == ErrorCode::Unknown => {
                ResolveError::SchemaMismatch {
                    variant: self.name,
                    message: message.unwrap_or_else(|| err.to_string()),
                }
            }
            rusqlite::Error::InvalidColumnName(name) => ResolveError::SchemaMismatch {
                variant: self.name,
                message: format!("no such column: {}", name),
            },
            other => other.into(),
        }
    }
}

impl EpisodeRow {
    fn from_row(row: &Row) -> Self {
        Self {
            episode_title: text_at(row, 0),
            podcast_title: text_at(row, 1),
            published_at: number_at(row, 2).and_then(apple_date),
            duration_secs: number_at(row, 3).filter(|d| *d > 0.0),
        }
    }
}

fn text_at(row: &Row, idx: usize) -> Option<String> {
    match row.get_ref(idx).ok()? {
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn number_at(row: &Row, idx: usize) -> Option<f64> {
    match row.get_ref(idx).ok()? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) if f.is_finite() => Some(f),
        _ => None,
    }
}

/// Core Data timestamp (seconds since 2001-01-01 UTC) to a UTC datetime.
pub fn apple_date(secs: f64) -> Option<DateTime<Utc>> {
    let unix_ms = ((secs + APPLE_EPOCH_OFFSET) * 1000.0).round();
    if !unix_ms.is_finite() || unix_ms.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(unix_ms as i64)
}
