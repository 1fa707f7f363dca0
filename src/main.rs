use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use filenav::app::App;
use filenav::config::{AppConfig, GeneralConfig, NavigatorSection, WatcherConfig};
use filenav::error::{AppError, Result};
use filenav::event::{Event, EventHandler};
use filenav::fs::local::LocalFileSource;
use filenav::fs::memory::MemoryFileSource;
use filenav::fs::source::FileSource;
use filenav::fs::watcher::{ChangeFilter, FsWatcher};

/// Browse a directory or a listing snapshot as a lazily loaded tree.
#[derive(Parser, Debug)]
#[command(name = "filenav", version, about)]
struct Cli {
    /// Directory to browse (defaults to the configured path, then ".")
    path: Option<PathBuf>,

    /// Explicit config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sub folder to show as the root
    #[arg(long)]
    base: Option<String>,

    /// Path to open after the root is loaded (repeatable)
    #[arg(long = "open", value_name = "PATH")]
    open: Vec<String>,

    /// Comma separated file patterns to show
    #[arg(long)]
    wildcards: Option<String>,

    /// Load whole subtrees with recursive listings
    #[arg(long)]
    recursive: bool,

    /// Browse a JSON array of file entries instead of a directory
    #[arg(long, value_name = "JSON")]
    listing: Option<PathBuf>,

    /// File or folder to delete before printing (repeatable)
    #[arg(long = "delete", value_name = "PATH")]
    delete: Vec<String>,

    /// Keep running and refresh on filesystem changes
    #[arg(long)]
    watch: bool,

    /// Disable filesystem watcher (auto-refresh)
    #[arg(long)]
    no_watcher: bool,
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                default_path: self.path.as_ref().map(|p| p.display().to_string()),
            },
            navigator: NavigatorSection {
                base_path: self.base.clone(),
                wildcards: self.wildcards.clone(),
                fetch_all: self.recursive.then_some(true),
            },
            watcher: WatcherConfig {
                enabled: self.no_watcher.then_some(false),
                debounce_ms: None,
            },
            ..Default::default()
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    init_logging(config.log_level());

    if let Some(listing) = &cli.listing {
        let source = MemoryFileSource::from_json_file(listing)?.with_delete();
        let app = App::new(source, config)?;
        return run(app, &cli, None).await;
    }

    let path = PathBuf::from(config.default_path());
    let root = path.canonicalize().map_err(|_| {
        AppError::InvalidPath(format!("{} does not exist", path.display()))
    })?;
    let app = App::new(LocalFileSource::new(&root), config)?.with_watch_root(&root);
    run(app, &cli, Some(root)).await
}

async fn run<S: FileSource>(mut app: App<S>, cli: &Cli, watch_root: Option<PathBuf>) -> Result<()> {
    let mut events = EventHandler::new();
    let event_tx = events.sender();

    app.navigator.idle().await;
    if !cli.delete.is_empty() {
        let deleted = app.delete_paths(&cli.delete, &event_tx).await?;
        while let Some(event) = events.try_next() {
            if let Event::DeleteProgress(progress) = event {
                eprintln!("deleted {} ({}/{})", progress.current, progress.deleted, progress.total);
            }
        }
        tracing::info!("deleted {} file(s)", deleted);
    }
    app.open_paths(&cli.open).await;
    print!("{}", app.render());

    let Some(root) = watch_root.filter(|_| cli.watch) else {
        return Ok(());
    };
    if !app.config.watcher_enabled() {
        tracing::warn!("--watch ignored: the watcher is disabled");
        return Ok(());
    }

    let _watcher = FsWatcher::new(
        ChangeFilter::new(&root),
        Duration::from_millis(app.config.debounce_ms()),
        event_tx.clone(),
    )?;

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(Event::Shutdown);
        }
    });

    loop {
        match events.next().await? {
            Event::FsChange(paths) => {
                if !app.handle_fs_change(paths).is_empty() {
                    app.navigator.idle().await;
                    println!();
                    print!("{}", app.render());
                }
            }
            Event::DeleteProgress(_) => {}
            Event::Shutdown => app.should_quit = true,
        }

        if app.should_quit {
            break;
        }
    }

    app.navigator.dispose();
    Ok(())
}
