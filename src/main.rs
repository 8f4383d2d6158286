use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use mokuyomi::config::{self, Config};
use mokuyomi::parsing::ingest_volume;
use mokuyomi::storage::Database;
use mokuyomi::text::{normalize_text, LexiconTokenizer};
use mokuyomi::types::LibraryVolume;
use mokuyomi::{ContextSynchronizer, ReaderSession, SyncOutcome, SyncSink, ViewMode, VocabularyService, Volume};

#[derive(Parser, Debug)]
#[command(name = "mokuyomi", version, about = "Manga reader companion: spreads, tracked words and their appearances")]
struct Cli {
    /// Config file (defaults to ./mokuyomi.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize an ingested volume.
    Info { volume: PathBuf },
    /// Show what the reader displays at a page, or walk the whole volume.
    /// Without `--page`, resumes where the volume was last left.
    View {
        volume: PathBuf,
        #[arg(long)]
        mode: Option<ViewMode>,
        #[arg(long)]
        page: Option<usize>,
        /// Print every spread from `page` to the end.
        #[arg(long)]
        all: bool,
    },
    /// Track the word under `text` on a page and record where it was seen.
    Track {
        volume: PathBuf,
        #[arg(long)]
        page: usize,
        #[arg(long)]
        text: String,
        /// Block index on the page; defaults to the first block containing `text`.
        #[arg(long)]
        block: Option<usize>,
    },
    /// List tracked words with their recorded appearances.
    Appearances {
        lemma: Option<String>,
    },
    /// Rescan a volume for every tracked word.
    Sync {
        volume: PathBuf,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
    /// Manage the shelf of opened volumes.
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },
}

#[derive(Subcommand, Debug)]
enum LibraryAction {
    /// Most recently opened first.
    List,
    Rename { volume: PathBuf, title: String },
    /// Forget a volume. Its files and recorded appearances stay.
    Remove { volume: PathBuf },
}

fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")).unwrap_or_else(|_| EnvFilter::new("info")));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = config::load_config(cli.config.as_deref());
    init_tracing(loaded.as_ref().ok().and_then(|c| c.log_filter.as_deref()));
    let config = loaded.context("loading configuration")?;

    match cli.command {
        Commands::Info { volume } => {
            let db = open_database(&config)?;
            run_info(&open_volume(&config, &db, &volume)?.0)
        }
        Commands::View { volume, mode, page, all } => {
            let db = open_database(&config)?;
            let (volume, shelved) = open_volume(&config, &db, &volume)?;
            // a saved position past the end means the volume changed since
            let resume = shelved.map(|s| s.last_page_read).filter(|&p| p < volume.total_pages());
            let start = page.or(resume).unwrap_or(0);
            run_view(&db, volume, mode.unwrap_or(config.default_view_mode), start, all)
        }
        Commands::Track { volume, page, text, block } => {
            let service = open_service(&config)?;
            let (volume, _) = open_volume(&config, service.database(), &volume)?;
            run_track(&service, &volume, page, &text, block)
        }
        Commands::Appearances { lemma } => run_appearances(&open_service(&config)?, lemma.as_deref()),
        Commands::Sync { volume, yes } => run_sync(&config, &volume, yes),
        Commands::Library { action } => run_library(&config, &open_database(&config)?, action),
    }
}

/// Ingests the volume and puts it on the library shelf. A shelf failure
/// only costs the library entry, not the command.
fn open_volume(config: &Config, db: &Database, path: &Path) -> Result<(Volume, Option<LibraryVolume>)> {
    let dir = config.resolve_volume_path(path);
    let volume = ingest_volume(&dir).with_context(|| format!("loading volume {}", dir.display()))?;
    let shelved = match db.register_volume(&volume) {
        Ok(shelved) => Some(shelved),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "could not add volume to library");
            None
        }
    };
    Ok((volume, shelved))
}

fn open_database(config: &Config) -> Result<Database> {
    Database::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path.display()))
}

fn load_tokenizer(config: &Config) -> Result<LexiconTokenizer> {
    match &config.lexicon_path {
        Some(path) => Ok(LexiconTokenizer::load(path)?),
        None => {
            warn!("no lexicon_path configured; every character is its own word");
            Ok(LexiconTokenizer::default())
        }
    }
}

fn open_service(config: &Config) -> Result<VocabularyService<LexiconTokenizer>> {
    Ok(VocabularyService::new(open_database(config)?, load_tokenizer(config)?))
}

fn run_info(volume: &Volume) -> Result<()> {
    println!("{} ({})", volume.title, volume.path().display());
    println!("{} pages", volume.total_pages());
    for page in volume.pages() {
        let shape = if page.is_portrait() { "portrait" } else { "landscape" };
        println!("  [{:>3}] {}x{} {:<9} {} blocks", page.page_number, page.width, page.height, shape, page.blocks.len());
    }
    Ok(())
}

fn print_spread(session: &ReaderSession) -> Result<()> {
    let pages = session.visible_pages()?;
    let numbers: Vec<String> = pages.iter().map(|p| p.page_number.to_string()).collect();
    println!("== {} ==", numbers.join(" + "));
    for block in pages.iter().flat_map(|page| &page.blocks) {
        let text = normalize_text(&block.full_text());
        if !text.is_empty() {
            println!("{text}");
        }
    }
    Ok(())
}

fn run_view(db: &Database, volume: Volume, mode: ViewMode, page: usize, all: bool) -> Result<()> {
    let mut session = ReaderSession::new(mode);
    session.open_volume(volume)?;
    session.jump_to_page(page)?;
    println!("view mode: {}", session.view_mode());
    print_spread(&session)?;
    while all && session.next_page()? {
        print_spread(&session)?;
    }
    if let Some(volume) = session.volume() {
        if let Err(e) = db.save_reading_position(volume.path(), session.current_page()) {
            warn!(error = %e, "reading position not saved");
        }
    }
    Ok(())
}

fn run_track(
    service: &VocabularyService<LexiconTokenizer>,
    volume: &Volume,
    page_index: usize,
    text: &str,
    block_index: Option<usize>,
) -> Result<()> {
    let page = volume.get_page(page_index)?;
    let block = match block_index {
        Some(i) => page.blocks.get(i).with_context(|| format!("page {page_index} has no block {i}"))?,
        None => page
            .blocks
            .iter()
            .find(|b| b.full_text().contains(text))
            .with_context(|| format!("no block on page {page_index} contains '{text}'"))?,
    };

    let sentence = block.full_text();
    let Some((word, appearance)) =
        service.track_word_from_surface(text, volume.path(), page_index, &block.crop, &sentence)?
    else {
        bail!("'{text}' produced no tokens");
    };
    println!("tracking {} [{}] ({})", word.lemma, word.reading, word.part_of_speech);
    if appearance.is_none() {
        println!("appearance on page {page_index} was already recorded");
    }
    Ok(())
}

fn run_appearances(service: &VocabularyService<LexiconTokenizer>, lemma: Option<&str>) -> Result<()> {
    let words = service.list_tracked_words()?;
    for word in words.iter().filter(|w| lemma.map_or(true, |l| w.lemma == l)) {
        println!("{} [{}] {} (added {})", word.lemma, word.reading, word.part_of_speech, word.date_added);
        for appearance in service.list_appearances(word.id)? {
            let volume = appearance.volume_name.as_deref().unwrap_or("?");
            println!("  {volume} p.{}: {}", appearance.page_index + 1, appearance.sentence_text);
        }
    }
    Ok(())
}

/// Terminal front end for the synchronizer's callbacks.
struct ConsoleSink {
    auto_confirm: bool,
}

impl SyncSink for ConsoleSink {
    fn confirm(&mut self, title: &str, prompt: &str) -> bool {
        if self.auto_confirm {
            return true;
        }
        print!("{title}: {prompt} [y/N] ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn notify_progress(&mut self, done: usize, total: usize) {
        eprint!("\rscanning page {done}/{total}");
        if done == total {
            eprintln!();
        }
    }

    fn notify_info(&mut self, title: &str, message: &str) {
        println!("{title}: {message}");
    }

    fn notify_error(&mut self, title: &str, message: &str) {
        eprintln!("{title}: {message}");
    }
}

fn run_sync(config: &Config, volume: &Path, yes: bool) -> Result<()> {
    let service = open_service(config)?;
    let (volume, _) = open_volume(config, service.database(), volume)?;
    let synchronizer = ContextSynchronizer::new(&service, load_tokenizer(config)?);
    let mut sink = ConsoleSink { auto_confirm: yes };
    match synchronizer.synchronize(Some(&volume), &mut sink)? {
        SyncOutcome::Completed(_) | SyncOutcome::Declined | SyncOutcome::NoTrackedWords => Ok(()),
        SyncOutcome::NoVolume => bail!("no volume loaded"),
    }
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn run_library(config: &Config, db: &Database, action: LibraryAction) -> Result<()> {
    match action {
        LibraryAction::List => {
            for shelved in db.list_library_volumes()? {
                println!(
                    "{}  {}  (page {}, opened {})",
                    shelved.title,
                    shelved.folder_path.display(),
                    shelved.last_page_read + 1,
                    format_timestamp(shelved.last_opened)
                );
            }
        }
        LibraryAction::Rename { volume, title } => {
            let renamed = db.rename_library_volume(&config.resolve_volume_path(&volume), &title)?;
            println!("renamed to {}", renamed.title);
        }
        LibraryAction::Remove { volume } => {
            let dir = config.resolve_volume_path(&volume);
            db.remove_library_volume(&dir)?;
            println!("removed {} from the library", dir.display());
        }
    }
    Ok(())
}
