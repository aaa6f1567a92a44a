//! Scan → parse → resolve → sort.
//!
//! Each cache file is handled independently on a blocking worker. Results are
//! buffered and sorted once every file is done, so the final order never
//! depends on which worker finished first.


use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::Config;
use crate::error::{ScanError, UnavailableReason};
use crate::metadata::MetadataResolver;
use crate::models::Transcript;
use crate::parser::{self, ParseOptions};
use crate::scanner::{CandidateFile, Scanner};

/// A cache file that did not make it into the library, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything one scan produced, ready for display.
#[derive(Debug, Default, Serialize)]
pub struct Library {
    /// Newest first: publish date, then file modification time.
    pub transcripts: Vec<Transcript>,
    pub skipped: Vec<SkippedFile>,
    /// Set when the cache root itself could not be read.
    pub unavailable: Option<UnavailableReason>,
    pub database_available: bool,
    pub cancelled: bool,
}

impl Library {
    fn cache_unavailable(reason: UnavailableReason) -> Self {
        Self {
            unavailable: Some(reason),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    /// Case-insensitive substring match on podcast name or episode title.
    pub fn search(&self, query: &str) -> Vec<&Transcript> {
        let query = query.trim().to_lowercase();
        self.transcripts
            .iter()
            .filter(|t| {
                query.is_empty()
                    || t.podcast_name().to_lowercase().contains(&query)
                    || t.episode_title().to_lowercase().contains(&query)
            })
            .collect()
    }
}

enum FileOutcome {
    Loaded {
        transcript: Transcript,
        modified: DateTime<Utc>,
    },
    Skipped(SkippedFile),
}

impl FileOutcome {
    fn path(&self) -> &Path {
        match self {
            Self::Loaded { transcript, .. } => transcript.source_path(),
            Self::Skipped(file) => &file.path,
        }
    }
}

/// Called after each file finishes, with the number of files done so far.
pub type ProgressFn = dyn Fn(usize, &Path) + Send + Sync;

pub struct Pipeline {
    scanner: Scanner,
    database_path: Option<PathBuf>,
    options: ParseOptions,
    workers: usize,
    progress: Option<Arc<ProgressFn>>,
}

impl Pipeline {
    pub fn new(cache_root: impl Into<PathBuf>, database_path: impl Into<PathBuf>) -> Self {
        Self {
            scanner: Scanner::new(cache_root),
            database_path: Some(database_path.into()),
            options: ParseOptions::default(),
            workers: 1,
            progress: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cache_dir, &config.database_path)
            .with_workers(config.workers)
            .with_parse_options(config.parse_options())
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, &Path) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Skip the database entirely; every transcript gets filename metadata.
    pub fn without_database(mut self) -> Self {
        self.database_path = None;
        self
    }

    pub fn cache_root(&self) -> &Path {
        self.scanner.root()
    }

    fn open_resolver(&self) -> MetadataResolver {
        match &self.database_path {
            Some(db) => MetadataResolver::open(db, self.scanner.root()),
            None => MetadataResolver::without_database(self.scanner.root()),
        }
    }

    /// Load the library using up to `workers` blocking tasks. On cancellation
    /// every file that finished is kept; files not yet started are dropped.
    pub async fn run(&self, cancel: CancellationToken) -> Library {
        let span = tracing::info_span!("library_scan", root = %self.scanner.root().display());
        self.run_inner(cancel).instrument(span).await
    }

    async fn run_inner(&self, cancel: CancellationToken) -> Library {
        let scanner = self.scanner.clone();
        let database_path = self.database_path.clone();
        let setup = tokio::task::spawn_blocking(move || {
            let candidates: Vec<CandidateFile> = scanner.scan()?.collect();
            let resolver = match database_path {
                Some(db) => MetadataResolver::open(&db, scanner.root()),
                None => MetadataResolver::without_database(scanner.root()),
            };
            Ok::<_, ScanError>((candidates, resolver))
        })
        .await;

        let (candidates, resolver) = match setup {
            Ok(Ok(ready)) => ready,
            Ok(Err(ScanError::CacheUnavailable { root, reason })) => {
                log::warn!("Transcript cache unavailable at {}: {}", root.display(), reason);
                return Library::cache_unavailable(reason);
            }
            Err(e) => {
                log::error!("Scan task failed: {}", e);
                return Library::cache_unavailable(UnavailableReason::Io(e.to_string()));
            }
        };

        log::info!("Found {} cached transcript file(s)", candidates.len());

        let resolver = Arc::new(resolver);
        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut pending = candidates.into_iter();
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        loop {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                // Tasks not yet started never run; running ones finish whole.
                tasks.abort_all();
                log::info!("Scan cancelled after {} file(s)", outcomes.len());
            }

            if !cancelled {
                while tasks.len() < self.workers {
                    let Some(candidate) = pending.next() else {
                        break;
                    };
                    let resolver = resolver.clone();
                    let options = self.options;
                    tasks.spawn_blocking(move || process_guarded(candidate, &resolver, &options));
                }
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {}
                next = tasks.join_next() => match next {
                    Some(Ok(outcome)) => self.record(outcome, &mut outcomes),
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => log::error!("Transcript worker failed: {}", e),
                    None => break,
                },
            }
        }

        finish(outcomes, resolver.database_available(), cancelled)
    }

    fn record(&self, outcome: FileOutcome, outcomes: &mut Vec<FileOutcome>) {
        let path = outcome.path().to_path_buf();
        outcomes.push(outcome);
        if let Some(progress) = &self.progress {
            progress(outcomes.len(), &path);
        }
    }

    /// Single-threaded variant of [`Pipeline::run`] for callers without a runtime.
    pub fn run_blocking(&self, cancel: &CancellationToken) -> Library {
        let candidates = match self.scanner.scan() {
            Ok(candidates) => candidates,
            Err(ScanError::CacheUnavailable { root, reason }) => {
                log::warn!("Transcript cache unavailable at {}: {}", root.display(), reason);
                return Library::cache_unavailable(reason);
            }
        };
        let resolver = self.open_resolver();

        let mut outcomes = Vec::new();
        let mut cancelled = false;
        for candidate in candidates {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let outcome = process_guarded(candidate, &resolver, &self.options);
            self.record(outcome, &mut outcomes);
        }

        finish(outcomes, resolver.database_available(), cancelled)
    }
}

/// A panic while handling one file skips that file instead of losing it.
fn process_guarded(
    candidate: CandidateFile,
    resolver: &MetadataResolver,
    options: &ParseOptions,
) -> FileOutcome {
    let path = candidate.path.clone();
    catch_file_panic(path, || process_file(candidate, resolver, options))
}

fn catch_file_panic<F>(path: PathBuf, work: F) -> FileOutcome
where
    F: FnOnce() -> FileOutcome,
{
    std::panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|_| {
        log::error!("Transcript worker panicked on {}", path.display());
        FileOutcome::Skipped(SkippedFile {
            path,
            reason: "internal error while reading transcript".to_string(),
        })
    })
}

/// Parse first; a file that does not parse is never resolved.
fn process_file(
    candidate: CandidateFile,
    resolver: &MetadataResolver,
    options: &ParseOptions,
) -> FileOutcome {
    match parser::parse_file(&candidate.path, options) {
        Ok(transcript) => {
            let metadata = resolver.resolve(&candidate);
            FileOutcome::Loaded {
                transcript: transcript.with_metadata(metadata),
                modified: candidate.modified,
            }
        }
        Err(e) => {
            log::warn!("Skipping {}: {}", candidate.path.display(), e);
            FileOutcome::Skipped(SkippedFile {
                path: candidate.path,
                reason: e.to_string(),
            })
        }
    }
}

fn finish(outcomes: Vec<FileOutcome>, database_available: bool, cancelled: bool) -> Library {
    let mut loaded = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Loaded {
                transcript,
                modified,
            } => loaded.push((transcript, modified)),
            FileOutcome::Skipped(file) => skipped.push(file),
        }
    }

    loaded.sort_by(|a, b| newest_first(a, b));
    skipped.sort_by(|a, b| a.path.cmp(&b.path));

    log::info!(
        "Loaded {} transcript(s), skipped {}",
        loaded.len(),
        skipped.len()
    );

    Library {
        transcripts: loaded.into_iter().map(|(t, _)| t).collect(),
        skipped,
        unavailable: None,
        database_available,
        cancelled,
    }
}

/// Publish date descending, then modification time descending. Undated
/// transcripts go last; the path breaks any remaining tie.
fn newest_first(a: &(Transcript, DateTime<Utc>), b: &(Transcript, DateTime<Utc>)) -> Ordering {
    let published = |t: &Transcript| t.metadata().and_then(|m| m.published_at);
    published(&b.0)
        .cmp(&published(&a.0))
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| a.0.source_path().cmp(b.0.source_path()))
}
