//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use jobflow_core::pipeline::ProgressReporter;
use jobflow_core::queries::{QuerySources, resolve_queries};
use jobflow_retriever::HttpListingSource;
use jobflow_shared::{
    AppConfig, FetchOptions, PipelineResult, RunConfig, init_config, load_layered,
};
use jobflow_sink::SheetsSink;
use jobflow_storage::SeenStore;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// jobflow: fetch job listings, filter them, and deliver only the new ones.
#[derive(Parser)]
#[command(
    name = "jobflow",
    version,
    about = "Fetch job listings, filter and dedupe them, and optionally append new ones to a sheet.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.jobflow/jobflow.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Run the fetch pipeline once.
    Fetch(FetchArgs),

    /// Print the query phrases a fetch would use.
    Queries {
        /// Add one search query (repeatable).
        #[arg(long = "query")]
        queries: Vec<String>,

        /// Load queries from a file (.json array or one per line).
        #[arg(long)]
        queries_file: Option<String>,
    },

    /// Inspect or clear the seen set.
    Seen {
        #[command(subcommand)]
        action: SeenAction,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `jobflow fetch`.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct FetchArgs {
    /// Append new jobs to the configured sheet.
    #[arg(long)]
    pub update_sheet: bool,

    /// Print the full result as JSON.
    #[arg(long)]
    pub json: bool,

    /// Add one search query (repeatable).
    #[arg(long = "query")]
    pub queries: Vec<String>,

    /// Load queries from a file (.json array or one per line).
    #[arg(long)]
    pub queries_file: Option<String>,

    /// Override the location.
    #[arg(long)]
    pub location: Option<String>,

    /// Override the time window in hours.
    #[arg(long)]
    pub hours_old: Option<u32>,

    /// Override results per query.
    #[arg(long)]
    pub results_wanted: Option<u32>,

    /// Clear the seen set before fetching.
    #[arg(long)]
    pub reset_seen: bool,

    /// Include the query list in the output.
    #[arg(long)]
    pub return_queries: bool,

    /// Require titles to contain one of the query phrases.
    #[arg(long)]
    pub include_from_queries: bool,

    /// Disable description exclusion filtering.
    #[arg(long)]
    pub no_desc_filter: bool,
}

impl From<&FetchArgs> for FetchOptions {
    fn from(args: &FetchArgs) -> Self {
        Self {
            update_sheet: args.update_sheet,
            queries: (!args.queries.is_empty()).then(|| args.queries.clone()),
            queries_file: args.queries_file.clone(),
            location: args.location.clone(),
            hours_old: args.hours_old,
            results_wanted: args.results_wanted,
            reset_seen: args.reset_seen,
            return_queries: args.return_queries,
            // Unset flags defer to env and config
            include_from_queries: args.include_from_queries.then_some(true),
            filter_description: args.no_desc_filter.then_some(false),
        }
    }
}

/// Seen-set subcommands.
#[derive(Subcommand)]
pub(crate) enum SeenAction {
    /// Print the seen-set path, size, and keys.
    Show,
    /// Delete the seen set so every listing is new again.
    Reset,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration (file plus environment).
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "jobflow=info",
        1 => "jobflow=debug",
        _ => "jobflow=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `--json` output stays parseable
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Fetch(args) => cmd_fetch(config_path, &args).await,
        Command::Queries {
            queries,
            queries_file,
        } => cmd_queries(config_path, queries, queries_file),
        Command::Seen { action } => match action {
            SeenAction::Show => cmd_seen_show(config_path).await,
            SeenAction::Reset => cmd_seen_reset(config_path).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(config_path: Option<&Path>, args: &FetchArgs) -> Result<()> {
    let config = load_layered(config_path)?;
    let run_config = RunConfig::resolve(&config, &FetchOptions::from(args));

    let source = HttpListingSource::new(&config.backend.endpoint, config.backend.timeout_secs)?;
    let sink = SheetsSink::new()?;

    info!(
        endpoint = %config.backend.endpoint,
        update_sheet = run_config.update_sheet,
        "starting fetch"
    );

    let reporter = CliProgress::new()?;
    let result = jobflow_core::pipeline::run(&run_config, &source, &sink, &reporter).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_summary(result: &PipelineResult) {
    let sheet = result
        .sheet_result
        .map_or_else(|| "None".to_string(), |s| s.to_string());
    println!("New: {}, Sheet: {sheet}", result.new_count);
    for item in &result.items {
        println!(
            "  - {} | {} | {} | {}",
            item.title, item.company, item.location, item.job_url
        );
    }
    if let Some(queries) = &result.queries {
        println!("Queries: {}", queries.join(", "));
    }
}

fn cmd_queries(
    config_path: Option<&Path>,
    queries: Vec<String>,
    queries_file: Option<String>,
) -> Result<()> {
    let config = load_layered(config_path)?;
    let opts = FetchOptions {
        queries: (!queries.is_empty()).then_some(queries),
        queries_file,
        ..FetchOptions::default()
    };
    let run_config = RunConfig::resolve(&config, &opts);
    for phrase in resolve_queries(&QuerySources::from(&run_config)) {
        println!("{phrase}");
    }
    Ok(())
}

async fn cmd_seen_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_layered(config_path)?;
    let store = SeenStore::new(&config.seen.path);
    let seen = store.load().await;

    println!("Seen set: {}", store.path().display());
    println!("Keys:     {}", seen.len());
    for key in seen.iter() {
        println!("  {key}");
    }
    Ok(())
}

async fn cmd_seen_reset(config_path: Option<&Path>) -> Result<()> {
    let config = load_layered(config_path)?;
    let store = SeenStore::new(&config.seen.path);
    if store.reset().await {
        println!("Seen set cleared: {}", store.path().display());
    } else {
        println!("Nothing to clear at {}", store.path().display());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_layered(config_path)?;
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
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn query_fetched(&self, term: &str, current: usize, total: usize, rows: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {term} ({rows} listings)"));
    }

    fn done(&self, _result: &PipelineResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn fetch_flags_map_to_options() {
        let cli = Cli::try_parse_from([
            "jobflow",
            "fetch",
            "--query",
            "\"it support\"",
            "--query",
            "help desk",
            "--hours-old",
            "24",
            "--no-desc-filter",
            "--update-sheet",
        ])
        .unwrap();
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        let opts = FetchOptions::from(&args);
        assert_eq!(
            opts.queries,
            Some(vec!["\"it support\"".to_string(), "help desk".to_string()])
        );
        assert_eq!(opts.hours_old, Some(24));
        assert_eq!(opts.filter_description, Some(false));
        assert_eq!(opts.include_from_queries, None);
        assert!(opts.update_sheet);
    }

    #[test]
    fn unset_flags_defer_to_config() {
        let opts = FetchOptions::from(&FetchArgs::default());
        assert_eq!(opts.queries, None);
        assert_eq!(opts.filter_description, None);
        assert_eq!(opts.include_from_queries, None);
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["jobflow", "seen", "show", "--config", "/tmp/jobflow.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/jobflow.toml")));
        assert!(matches!(
            cli.command,
            Command::Seen {
                action: SeenAction::Show
            }
        ));
    }

    #[test]
    fn rejects_non_numeric_hours() {
        assert!(Cli::try_parse_from(["jobflow", "fetch", "--hours-old", "soon"]).is_err());
    }
}
