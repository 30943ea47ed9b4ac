//! Link Smasher CLI
//!
//! Command-line interface for Link Smasher - saved links and keyboard shortcuts.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use smasher_core::{
    Config, FileStore, KeyValueStore, LinkRepository, ShortcutConfigStore, StorageError,
};

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "smasher")]
#[command(about = "Link Smasher - one link per URL, bound to your keyboard")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// List all tags
    Tags,
    /// Manage keyboard shortcuts
    Shortcut {
        #[command(subcommand)]
        command: Option<ShortcutCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Save a link (merges into an existing link with the same URL)
    #[command(alias = "create")]
    Add {
        /// URL to save
        url: String,
        /// Title (defaults to the URL)
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
        /// Notes (truncated to 200 characters)
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// List all links
    #[command(alias = "ls")]
    List {
        /// Only links saved for this hostname
        #[arg(long)]
        host: Option<String>,
    },
    /// Show link details
    Show {
        /// Link ID (full ID or prefix)
        id: String,
    },
    /// Edit a link (prompts when no field flags are given)
    Edit {
        /// Link ID (full ID or prefix)
        id: String,
        /// New URL
        #[arg(long)]
        url: Option<String>,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Replace tags
        #[arg(short, long)]
        tag: Vec<String>,
        /// Remove all tags
        #[arg(long, conflicts_with = "tag")]
        clear_tags: bool,
        /// New notes ("" clears them)
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Delete a link
    #[command(alias = "rm")]
    Delete {
        /// Link ID (full ID or prefix)
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Search links
    Search {
        /// Search query
        query: String,
    },
    /// Open a link in the system browser
    Open {
        /// Link ID (full ID or prefix)
        id: String,
    },
    /// Export all links as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import links from a JSON export
    Import {
        /// File produced by `smasher link export`
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ShortcutCommands {
    /// List shortcuts with their current bindings
    #[command(alias = "ls")]
    List,
    /// Bind a shortcut to a new key combination
    Set {
        /// Shortcut ID (e.g. SAVE_LINK or save-link)
        id: String,
        /// Key combination (e.g. meta+ctrl+b)
        combo: String,
    },
    /// Restore a shortcut's default binding
    Reset {
        /// Shortcut ID
        id: String,
    },
    /// Restore every default binding
    ResetAll,
    /// Read key presses and report which shortcut they trigger (Esc exits)
    Listen,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            if let Some(hint) = storage_hint(&err) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::from_config(&config));
    info!("Using store at {:?}", config.store_path());

    match cli.command {
        Commands::Link { command } => {
            let links = LinkRepository::new(store);
            handle_link_command(command, &links, &output).await
        }
        Commands::Tags => {
            let links = LinkRepository::new(store);
            commands::tag::list(&links, &output).await
        }
        Commands::Shortcut { command } => {
            let shortcuts = ShortcutConfigStore::new(store);
            handle_shortcut_command(command, &shortcuts, &config.store_path(), &output).await
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_link_command(
    command: LinkCommands,
    links: &LinkRepository,
    output: &Output,
) -> Result<()> {
    match command {
        LinkCommands::Add {
            url,
            title,
            tag,
            notes,
        } => commands::link::add(links, url, title, tag, notes, output).await,
        LinkCommands::List { host } => commands::link::list(links, host, output).await,
        LinkCommands::Show { id } => commands::link::show(links, id, output).await,
        LinkCommands::Edit {
            id,
            url,
            title,
            tag,
            clear_tags,
            notes,
        } => {
            let tags = if clear_tags {
                Some(Vec::new())
            } else if tag.is_empty() {
                None
            } else {
                Some(tag)
            };
            let edits = commands::link::LinkEdits {
                url,
                title,
                tags,
                notes,
            };
            commands::link::edit(links, id, edits, output).await
        }
        LinkCommands::Delete { id, yes } => commands::link::delete(links, id, yes, output).await,
        LinkCommands::Search { query } => commands::link::search(links, query, output).await,
        LinkCommands::Open { id } => commands::link::open(links, id, output).await,
        LinkCommands::Export { output: path } => {
            commands::link::export(links, path.as_deref(), output).await
        }
        LinkCommands::Import { file } => commands::link::import(links, &file, output).await,
    }
}

async fn handle_shortcut_command(
    command: Option<ShortcutCommands>,
    shortcuts: &ShortcutConfigStore,
    store_path: &Path,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ShortcutCommands::List) | None => commands::shortcut::list(shortcuts, output).await,
        Some(ShortcutCommands::Set { id, combo }) => {
            commands::shortcut::set(shortcuts, id, combo, output).await
        }
        Some(ShortcutCommands::Reset { id }) => {
            commands::shortcut::reset(shortcuts, id, output).await
        }
        Some(ShortcutCommands::ResetAll) => commands::shortcut::reset_all(shortcuts, output).await,
        Some(ShortcutCommands::Listen) => {
            commands::shortcut::listen(shortcuts, store_path, output).await
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Suggestion for the first store failure anywhere in the error chain
fn storage_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        let storage = match cause.downcast_ref::<smasher_core::Error>() {
            Some(smasher_core::Error::Store(storage)) => storage,
            Some(_) => return None,
            None => cause.downcast_ref::<StorageError>()?,
        };
        storage.recovery_suggestion()
    })
}

/// Initialize logging
///
/// SMASHER_LOG sets the level for the smasher crates; otherwise RUST_LOG is
/// honored, and the default is `warn`. Logs go to `log_file` when
/// configured, stderr otherwise.
fn init_logging(config: &Config) {
    let env_filter = match std::env::var("SMASHER_LOG") {
        Ok(level) if !level.is_empty() => {
            EnvFilter::new(format!("smasher_core={},smasher_cli={}", level, level))
        }
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let Some(log_path) = &config.log_file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();
}
