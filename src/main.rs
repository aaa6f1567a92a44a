use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use podpulp_lib::{Config, Library, Overrides, Pipeline, Transcript};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "podpulp", version)]
#[command(about = "Read the transcripts Apple Podcasts keeps in its local cache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// TTML cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Podcasts library database (MTLibrary.sqlite)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Files processed in parallel
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List cached transcripts, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print one transcript by its number in `list`
    Show {
        /// 1-based position in the list
        number: usize,
        /// One timestamped line per segment instead of paragraphs
        #[arg(long)]
        timestamps: bool,
    },
    /// List transcripts whose podcast or episode title matches
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct ListEntry<'a> {
    number: usize,
    podcast: &'a str,
    title: String,
    published: Option<String>,
    duration: String,
    words: usize,
    source: String,
    path: String,
}

impl<'a> ListEntry<'a> {
    fn new(number: usize, transcript: &'a Transcript) -> Self {
        let metadata = transcript.metadata();
        Self {
            number,
            podcast: transcript.podcast_name(),
            title: transcript.episode_title(),
            published: metadata
                .and_then(|m| m.published_at)
                .map(|d| d.format("%Y-%m-%d").to_string()),
            duration: metadata
                .map(|m| m.duration_formatted())
                .unwrap_or_else(|| "Unknown".to_string()),
            words: transcript.word_count(),
            source: metadata
                .map(|m| m.source.to_string())
                .unwrap_or_default(),
            path: transcript.source_path().display().to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "podpulp=debug,podpulp_lib=debug"
    } else {
        "podpulp=info,podpulp_lib=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        cache_dir: cli.cache_dir,
        database_path: cli.database,
        workers: cli.workers,
    };
    let config =
        Config::load(cli.config.as_deref(), &overrides).context("Failed to load config")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, finishing up");
            on_interrupt.cancel();
        }
    });

    let library = Pipeline::from_config(&config).run(cancel).await;

    if let Some(reason) = &library.unavailable {
        bail!(
            "Transcript cache unavailable at {}: {}",
            config.cache_dir.display(),
            reason
        );
    }
    if library.cancelled {
        eprintln!("Scan interrupted; showing the transcripts finished so far.");
    }

    match cli.command {
        Commands::List { json } => {
            print_list(&library, library.transcripts.iter().collect(), json)?
        }
        Commands::Search { query, json } => print_list(&library, library.search(&query), json)?,
        Commands::Show { number, timestamps } => {
            let transcript = number
                .checked_sub(1)
                .and_then(|i| library.transcripts.get(i))
                .with_context(|| {
                    format!(
                        "No transcript #{} (library has {})",
                        number,
                        library.len()
                    )
                })?;
            print_transcript(transcript, timestamps);
        }
    }

    Ok(())
}

/// Numbers always refer to positions in the full list, so `show` works on a
/// number taken from `search` output.
fn print_list(library: &Library, shown: Vec<&Transcript>, json: bool) -> Result<()> {
    let entries: Vec<ListEntry> = shown
        .into_iter()
        .filter_map(|t| {
            let position = library
                .transcripts
                .iter()
                .position(|other| std::ptr::eq(other, t))?;
            Some(ListEntry::new(position + 1, t))
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No transcripts found.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{:>4}. {}  {} - {}  ({}, {} words)",
            entry.number,
            entry.published.as_deref().unwrap_or("----------"),
            entry.podcast,
            entry.title,
            entry.duration,
            entry.words
        );
    }
    if !library.skipped.is_empty() {
        eprintln!(
            "{} file(s) could not be read; run with --verbose for details.",
            library.skipped.len()
        );
    }
    Ok(())
}

fn print_transcript(transcript: &Transcript, timestamps: bool) {
    println!("{}", transcript.podcast_name());
    println!("{}", transcript.episode_title());
    if let Some(date) = transcript.metadata().and_then(|m| m.published_at) {
        println!("{}", date.format("%B %-d, %Y"));
    }
    println!();
    if timestamps {
        println!("{}", transcript.text_with_timestamps());
    } else {
        println!("{}", transcript.paragraph_text());
    }
}
