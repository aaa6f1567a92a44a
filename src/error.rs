use std::path::PathBuf;
use thiserror::Error;

/// Why the cache root could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    Missing,
    NotADirectory,
    PermissionDenied,
    Io(String),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "directory does not exist"),
            Self::NotADirectory => write!(f, "path is not a directory"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<std::io::Error> for UnavailableReason {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::Missing,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Scan-level failure. This is the only condition that applies to a whole
/// scan rather than a single file.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Transcript cache unavailable at {}: {reason}", root.display())]
    CacheUnavailable {
        root: PathBuf,
        reason: UnavailableReason,
    },
}

/// A single `begin`/`end` attribute that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,

    #[error("malformed timestamp: {0:?}")]
    Malformed(String),
}

/// Per-file parse failure. The scan skips the file and continues.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read transcript: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcript is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid TTML document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("no transcript content extracted")]
    NoContentExtracted,
}

/// Reasons the database could not supply metadata for one file. These never
/// leave the resolver; they only decide whether fallback metadata is used.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("metadata database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("schema variant '{variant}' does not match: {message}")]
    SchemaMismatch {
        variant: &'static str,
        message: String,
    },

    #[error("no episode row matches the transcript identifier")]
    NoMatch,

    #[error("metadata query failed: {0}")]
    Query(String),
}

impl From<rusqlite::Error> for ResolveError {
    fn from(e: rusqlite::Error) -> Self {
        ResolveError::Query(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("could not determine home directory; set the cache and database paths explicitly")]
    NoHomeDirectory,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
