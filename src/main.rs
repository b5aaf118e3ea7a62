use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proseline::analysis::{AnalysisBackend, HttpBackend, SuggestionKind};
use proseline::cache::SuggestionCache;
use proseline::clock::{Clock, SystemClock};
use proseline::config::{self, Config, ConfigResult, StorageConfig};
use proseline::document::RichTextDocument;
use proseline::quota::QuotaTracker;
use proseline::report::{render_metrics, render_report};
use proseline::scheduler::{AnalysisEvent, AnalysisScheduler, AnalysisServices, validate_text};
use proseline::store::{DurableStore, JsonFileStore, MemoryStore};
use proseline::{AnchorResolver, SuggestionManager};

/// Grammar, style and readability checker
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Check prose for grammar, style and readability issues anchored to the text"
)]
struct Args {
    /// Text file to check (if not provided, reads from stdin)
    input: Option<PathBuf>,

    /// Config file to use instead of ~/.config/proseline/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Identity charged against the analysis quota
    #[arg(long, default_value = "local")]
    identity: String,

    /// Accept every suggestion of this kind and print the corrected text
    #[arg(long, value_name = "KIND", value_parser = parse_kind)]
    apply: Option<SuggestionKind>,

    /// Discard every suggestion of this kind before reporting
    #[arg(long, value_name = "KIND", value_parser = parse_kind)]
    reject: Option<SuggestionKind>,
}

fn parse_kind(s: &str) -> Result<SuggestionKind, String> {
    SuggestionKind::parse_kind(s)
        .ok_or_else(|| format!("unknown kind '{s}' (expected grammar, style or readability)"))
}

fn main() -> Result<()> {
    // Writes to /tmp/proseline-debug.log at DEBUG level
    #[cfg(debug_assertions)]
    {
        use std::io::Write;

        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/proseline-debug.log")
            .expect("Failed to open /tmp/proseline-debug.log");

        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .target(env_logger::Target::Pipe(Box::new(log_file)))
            .format(|buf, record| {
                use std::time::SystemTime;
                let datetime: chrono::DateTime<chrono::Local> = SystemTime::now().into();
                writeln!(
                    buf,
                    "[{}] [{}] {}",
                    datetime.format("%Y-%m-%dT%H:%M:%S%.3f"),
                    record.level(),
                    record.args()
                )
            })
            .init();

        log::debug!("=== PROSELINE DEBUG SESSION STARTED ===");
    }

    #[cfg(not(debug_assertions))]
    env_logger::init();

    color_eyre::install()?;

    let args = Args::parse();

    let config_result = match &args.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let ConfigResult { config, warning } = config_result;
    if let Some(warning) = warning {
        eprintln!("Warning: {}", warning);
    }

    let text = read_input(args.input.as_deref())?;

    // Reject empty or oversized input before touching the backend
    validate_text(&text, config.analysis.max_text_chars)?;

    let backend = HttpBackend::from_config(&config.backend)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to start async runtime")?;
    runtime.block_on(run(args, config, text, Arc::new(backend)))?;

    #[cfg(debug_assertions)]
    log::debug!("=== PROSELINE DEBUG SESSION ENDED ===");

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .wrap_err("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Open the configured store, falling back to memory when it is unavailable.
fn open_store(config: &StorageConfig, clock: Arc<dyn Clock>) -> Arc<dyn DurableStore> {
    if config.ephemeral {
        return Arc::new(MemoryStore::new(clock));
    }

    let opened = match &config.path {
        Some(path) => JsonFileStore::open(path, clock.clone()),
        None => JsonFileStore::open_default(),
    };
    match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::warn!("Durable store unavailable, using memory: {}", e);
            Arc::new(MemoryStore::new(clock))
        }
    }
}

async fn run(
    args: Args,
    config: Config,
    text: String,
    backend: Arc<dyn AnalysisBackend>,
) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = open_store(&config.storage, clock.clone());

    let quota = QuotaTracker::new(config.quota.clone(), store.clone(), clock.clone());
    let cache = Arc::new(SuggestionCache::new(&config.cache, store, clock));
    let services = Arc::new(AnalysisServices {
        backend,
        quota: quota.clone(),
        cache: cache.clone(),
    });

    let mut scheduler = AnalysisScheduler::new(services, args.identity, config.analysis.clone());
    scheduler.analyze_now(&text)?;
    let event = scheduler.next_event().await;

    quota.flush_all().await;
    let purged = cache.purge_expired().await + quota.purge_stale().await;
    if purged > 0 {
        log::debug!("Purged {} expired store entries", purged);
    }

    let (result, cache_hit) = match event {
        Some(AnalysisEvent::Completed {
            result,
            cache_hit,
            dropped_entries,
            ..
        }) => {
            if dropped_entries > 0 {
                log::warn!("Backend returned {} malformed suggestions", dropped_entries);
            }
            (result, cache_hit)
        }
        Some(AnalysisEvent::Failed { error, .. }) => {
            return Err(eyre!("{}", error).wrap_err(error.user_message()));
        }
        None => return Err(eyre!("Analysis finished without a result")),
    };
    log::debug!("Analysis complete (cache hit: {})", cache_hit);

    let metrics = render_metrics(&result.readability_metrics);
    let mut doc = RichTextDocument::from_plain_text(&text);
    let mut manager = SuggestionManager::new(
        AnchorResolver::from_config(&config.anchor),
        &config.lifecycle,
    );
    manager.replace_all(result);
    manager.render(&doc);

    if let Some(kind) = args.reject {
        let outcome = manager.reject_all(kind);
        eprintln!("Rejected {} {} suggestion(s)", outcome.applied, kind);
    }

    match args.apply {
        Some(kind) => {
            let outcome = manager.accept_all(&mut doc, kind);
            eprintln!(
                "Applied {} {} suggestion(s), {} could not be applied",
                outcome.applied, kind, outcome.failed
            );
            manager.render(&doc);
            eprintln!("{}", render_report(&doc, &manager));
            print!("{}", document_text(&doc));
        }
        None => {
            println!("{}", render_report(&doc, &manager));
            if let Some(metrics) = metrics {
                println!("{}", metrics);
            }
        }
    }

    Ok(())
}

fn document_text(doc: &RichTextDocument) -> String {
    let mut text = doc.plain_text();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
