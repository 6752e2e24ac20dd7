//! CLI command definitions, routing, and tracing setup.

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use newsrag_core::pipeline::{self, IngestReport, ProgressReporter};
use newsrag_core::retrieval::{ContextRequest, assemble_context};
use newsrag_shared::{AppConfig, RetrievalConfig, init_config, load_config, parse_timestamp};
use newsrag_storage::{MemoryIndex, VectorIndex};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// newsrag: AI/ML news retrieval for grounded answers.
#[derive(Parser)]
#[command(
    name = "newsrag",
    version,
    about = "Ingest AI/ML news and research into a local index and build cited context for questions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch all sources, build documents, and (re)build the vector index.
    Ingest {
        /// Global item budget across all sources.
        #[arg(long)]
        max_docs: Option<usize>,

        /// Add to the existing index instead of replacing it.
        #[arg(long)]
        append: bool,
    },

    /// Assemble the citation-annotated context for a question.
    Query {
        /// The question.
        text: String,

        /// Number of chunks in the bundle.
        #[arg(short)]
        k: Option<usize>,

        /// Take the top chunks without balancing across sources.
        #[arg(long)]
        no_diversify: bool,

        /// Earliest publish date (inclusive), e.g. 2025-01-01.
        #[arg(long)]
        from: Option<String>,

        /// Latest publish date (inclusive), e.g. 2025-06-30.
        #[arg(long)]
        to: Option<String>,

        /// Print the whole bundle as JSON instead of the prompt text.
        #[arg(long)]
        json: bool,
    },

    /// List the active source registry.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsrag=info",
        1 => "newsrag=debug",
        _ => "newsrag=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest { max_docs, append } => cmd_ingest(max_docs, append).await,
        Command::Query {
            text,
            k,
            no_diversify,
            from,
            to,
            json,
        } => cmd_query(&text, k, no_diversify, from.as_deref(), to.as_deref(), json),
        Command::Sources => cmd_sources(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(max_docs: Option<usize>, append: bool) -> Result<()> {
    let config = load_config()?;
    let max_docs = max_docs.unwrap_or(config.defaults.max_docs);

    let mut index = if append {
        pipeline::open_index(&config)?
    } else {
        MemoryIndex::new(Box::new(newsrag_storage::HashingEmbedder::new(
            config.index.dimensions,
        )))
    };

    info!(max_docs, append, sources = config.sources().len(), "starting ingest");

    let reporter = CliProgress::new();
    let report = pipeline::ingest(&config, &mut index, max_docs, &reporter).await?;

    println!();
    println!("  Index built successfully!");
    println!("  Fetched:   {} items", report.fetched_items);
    println!("  Cached:    {} documents", report.cached_docs);
    println!("  Records:   {} documents", report.record_docs);
    println!("  Documents: {} (after dedup)", report.documents);
    println!("  Chunks:    {} (index total {})", report.chunks, index.len());
    println!("  Path:      {}", report.index_dir.display());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_query(
    text: &str,
    k: Option<usize>,
    no_diversify: bool,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let retrieval = RetrievalConfig::from(&config);

    let date_from = from.map(|raw| parse_date_bound(raw, false)).transpose()?;
    let date_to = to.map(|raw| parse_date_bound(raw, true)).transpose()?;

    let mut request = ContextRequest::new(text, &retrieval).with_window(date_from, date_to);
    if let Some(k) = k {
        request = request.with_k(k);
    }
    if no_diversify {
        request = request.with_diversify(false);
    }

    let index = match pipeline::load_index(&config) {
        Ok(index) => Some(index),
        Err(e) => {
            warn!(error = %e, "index could not be loaded");
            None
        }
    };

    let bundle = assemble_context(
        index.as_ref().map(|i| i as &dyn VectorIndex),
        &request,
        &retrieval,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&bundle)?);
    } else {
        println!("{}", bundle.prompt);
    }
    Ok(())
}

/// Parse a `--from`/`--to` value. A bare `YYYY-MM-DD` upper bound covers the whole day.
fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let ts = parse_timestamp(raw).ok_or_else(|| eyre!("unrecognized date '{raw}'"))?;
    if end_of_day && raw.trim().len() == 10 {
        return Ok(ts + TimeDelta::days(1) - TimeDelta::seconds(1));
    }
    Ok(ts)
}

fn cmd_sources() -> Result<()> {
    let config: AppConfig = load_config()?;
    let sources = config.sources();

    println!();
    for source in &sources {
        println!(
            "  {:<24} {:<11} {:<6} {}",
            source.name,
            source.category.as_str(),
            source.kind.as_str(),
            source.url
        );
    }
    println!();
    println!("  {} sources", sources.len());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn items_fetched(&self, count: usize) {
        self.spinner.println(format!("  fetched {count} unique items"));
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_date_bound_covers_whole_day() {
        let to = parse_date_bound("2025-03-01", true).unwrap();
        assert_eq!(to.to_rfc3339(), "2025-03-01T23:59:59+00:00");

        let from = parse_date_bound("2025-03-01", false).unwrap();
        assert_eq!(from.to_rfc3339(), "2025-03-01T00:00:00+00:00");

        assert!(parse_date_bound("next tuesday", false).is_err());
    }

    #[test]
    fn query_flags_parse() {
        let cli = Cli::try_parse_from([
            "newsrag", "query", "latest agents", "-k", "4", "--no-diversify", "--from", "2025-01-01",
        ])
        .unwrap();
        match cli.command {
            Command::Query {
                text,
                k,
                no_diversify,
                from,
                to,
                json,
            } => {
                assert_eq!(text, "latest agents");
                assert_eq!(k, Some(4));
                assert!(no_diversify);
                assert_eq!(from.as_deref(), Some("2025-01-01"));
                assert!(to.is_none());
                assert!(!json);
            }
            _ => panic!("expected query command"),
        }
    }
}
