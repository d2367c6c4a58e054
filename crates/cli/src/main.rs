mod commands;
mod config;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zmna_store::{source, DeploymentMode, ResourceSource, VerbDataStore};

use crate::config::{Overrides, Settings};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Georgian verb conjugation lookup.
#[derive(Parser)]
#[command(name = "zmna", version, about = "Georgian verb conjugation lookup")]
struct Cli {
    /// Directory holding the verb data files
    #[arg(long, global = true, conflicts_with = "url")]
    data: Option<PathBuf>,

    /// Base URL the verb data files are served from
    #[arg(long, global = true)]
    url: Option<String>,

    /// Data layout (bundled or per-verb)
    #[arg(long, global = true)]
    mode: Option<DeploymentMode>,

    /// TOML file with [store], [lazy] and [index] tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a verb's conjugation table
    Show {
        /// Verb id, or a page anchor such as #verb-to_go
        verb: String,
        /// Preverb to show the forms under (default: the verb's own)
        #[arg(long)]
        preverb: Option<String>,
    },

    /// Find verbs by any conjugated form
    Search {
        /// Form or fragment of a form
        term: String,
        /// Show at most this many matches
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List every verb in the catalog
    List,

    /// Load every verb and report cache statistics
    Stats,
}

/// What every command runs against.
pub(crate) struct App {
    pub(crate) store: Arc<VerbDataStore<Box<dyn ResourceSource>>>,
    pub(crate) settings: Settings,
    pub(crate) output: OutputFormat,
    pub(crate) quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = Overrides {
        data: cli.data,
        url: cli.url,
        mode: cli.mode,
    };
    let settings = match config::resolve(cli.config.as_deref(), &overrides, |key| {
        std::env::var(key).ok()
    }) {
        Ok(settings) => settings,
        Err(e) => {
            report_error(&format!("error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    tracing::debug!(?settings, "resolved configuration");

    let source = source::from_config(&settings.store.source);
    let app = App {
        store: Arc::new(VerbDataStore::new(source, settings.store.clone())),
        settings,
        output: cli.output,
        quiet: cli.quiet,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("error: failed to start runtime: {}", e),
                app.output,
                app.quiet,
            );
            process::exit(1);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Show { verb, preverb } => {
                commands::show::cmd_show(&app, &verb, preverb.as_deref()).await
            }
            Commands::Search { term, limit } => {
                commands::search::cmd_search(&app, &term, limit).await
            }
            Commands::List => commands::list::cmd_list(&app).await,
            Commands::Stats => commands::stats::cmd_stats(&app).await,
        }
    });

    if let Err(msg) = result {
        report_error(&msg, app.output, app.quiet);
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` overrides.
fn init_tracing(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    let default = format!(
        "zmna={level},zmna_core={level},zmna_store={level},zmna_search={level}"
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
