//! quire - chapter cache and preloader for extracted e-books

mod error;
mod logging;

use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser, Subcommand};
use exn::ResultExt;
use quire_cache::CacheManager;
use quire_config::Config;
use quire_preload::{PreloadOptions, ReadingSession, SessionOptions};
use quire_storage::backend::LocalChapterStore;
use quire_storage::{BookId, StoreHandle};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quire")]
#[command(version, about = "Chapter cache and predictive preloading for extracted e-books", long_about = None)]
#[command(after_help = "EXAMPLES:
    quire read moby-dick 3              Print chapter 3
    quire stats moby-dick               Show cache statistics
    quire replay moby-dick 0 1 2 3 9    Simulate a reader and show what gets preloaded")]
struct Cli {
    /// Config file (.toml, .yaml, .yml or .json)
    #[arg(short, long, global = true, env = "QUIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Library root holding extracted books, overrides the configured one
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one chapter's XHTML
    Read {
        book: String,
        index: usize,
        /// Bypass the memory cache
        #[arg(long)]
        force: bool,
        /// List referenced images and stylesheets instead of the markup
        #[arg(long)]
        resources: bool,
    },
    /// Show how many chapters are extracted and the cache capacity
    Stats { book: String },
    /// Delete a book's extracted chapters
    Clear { book: String },
    /// Walk a reading session through the given chapter positions
    Replay {
        book: String,
        #[arg(required = true)]
        positions: Vec<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).map_err(|err| err.raise(ErrorKind::Config))?;
    if let Some(library) = cli.library {
        config.library = Some(std::path::absolute(&library).or_raise(|| ErrorKind::Library)?);
    }
    let root = config.library_root().map_err(|err| err.raise(ErrorKind::Config))?;
    tracing::debug!(root = %root.display(), "Using library");
    let store: StoreHandle =
        Arc::new(LocalChapterStore::new("library", &root).map_err(|err| err.raise(ErrorKind::Library))?);

    match cli.command {
        Command::Read { book, index, force, resources } => {
            let cache = cache_manager(store, parse_book(&book)?, &config);
            let chapter = cache.get_chapter_content(index, force).await.map_err(|err| err.raise(ErrorKind::Cache))?;
            if resources {
                chapter.resources.iter().for_each(|path| println!("{path}"));
            } else {
                println!("{}", chapter.html);
            }
        },
        Command::Stats { book } => {
            let cache = cache_manager(store, parse_book(&book)?, &config);
            let stats = cache.get_cache_stats().await.map_err(|err| err.raise(ErrorKind::Cache))?;
            println!("Book: {book}");
            println!("Extracted chapters: {}", stats.disk_entry_count);
            println!("Memory capacity: {}", stats.memory_capacity);
        },
        Command::Clear { book } => {
            let cache = cache_manager(store, parse_book(&book)?, &config);
            cache.invalidate().await.map_err(|err| err.raise(ErrorKind::Cache))?;
            println!("Cleared {book}");
        },
        Command::Replay { book, positions } => replay(store, parse_book(&book)?, &config, &positions).await?,
    }
    Ok(())
}

async fn replay(store: StoreHandle, book: BookId, config: &Config, positions: &[usize]) -> Result<()> {
    let Some((&start_index, rest)) = positions.split_first() else {
        return Ok(());
    };
    let options = SessionOptions { start_index, ..session_options(config) };
    let mut session =
        ReadingSession::open_extracted(store, book, options).await.map_err(|err| err.raise(ErrorKind::Session))?;
    session.preloader().settle().await;
    report(&session);

    for &position in rest {
        if let Err(err) = session.page_changed(position).await {
            // Keep going: a missing chapter shouldn't end the replay.
            tracing::warn!(position, "{err:?}");
        }
        session.preloader().settle().await;
        report(&session);
    }
    session.close().await;
    Ok(())
}

fn report(session: &ReadingSession) {
    let state = session.prediction();
    let mut resident = session.cache().resident_indices();
    resident.sort_unstable();
    println!(
        "chapter {:>4}  forward {}  backward {}  resident {:?}",
        state.current_index, state.consecutive_forward_turns, state.consecutive_backward_turns, resident
    );
}

fn parse_book(book: &str) -> Result<BookId> {
    BookId::new(book).map_err(|err| err.raise(ErrorKind::Book))
}

fn memory_capacity(config: &Config) -> NonZeroUsize {
    NonZeroUsize::new(config.cache.memory_capacity).unwrap_or(CacheManager::DEFAULT_MEMORY_CAPACITY)
}

fn cache_manager(store: StoreHandle, book: BookId, config: &Config) -> CacheManager {
    CacheManager::with_capacity(store, book, memory_capacity(config))
}

fn session_options(config: &Config) -> SessionOptions {
    SessionOptions {
        memory_capacity: memory_capacity(config),
        preload: PreloadOptions {
            range: config.preload.range,
            prediction_threshold: config.preload.prediction_threshold,
            extended_span: config.preload.extended_span,
            throttle: config.preload.throttle(),
        },
        start_index: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["quire", "read", "moby-dick", "3"], 0)]
    #[case(&["quire", "-vv", "stats", "moby-dick"], 2)]
    #[case(&["quire", "replay", "moby-dick", "0", "1", "-vvv"], 3)]
    fn test_verbosity(#[case] args: &[&str], #[case] expected: u8) {
        assert_eq!(Cli::try_parse_from(args).unwrap().verbose, expected);
    }

    #[test]
    fn test_replay_needs_positions() {
        assert!(Cli::try_parse_from(["quire", "replay", "moby-dick"]).is_err());
    }

    #[test]
    fn test_session_options_follow_config() {
        let mut config = Config::default();
        config.preload.throttle_ms = 7;
        config.cache.memory_capacity = 8;
        let options = session_options(&config);
        assert_eq!(options.preload.throttle, std::time::Duration::from_millis(7));
        assert_eq!(options.memory_capacity.get(), 8);
        assert_eq!(options.preload.range, 2);
    }
}
