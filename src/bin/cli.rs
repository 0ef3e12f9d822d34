//! mrcli: rank Medicare providers from the command line
//!
//! Loads a CMS billing extract, ranks providers for one procedure and prints
//! top lists, state cohorts and individual standings.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{debug, warn};

use medrank::config::{self, MedrankConfig};
use medrank::display;
use medrank::export::ExportOptions;
use medrank::prelude::*;

#[derive(Parser)]
#[command(name = "mrcli")]
#[command(version, about = "Medicare provider rankings - top lists, state cohorts and provider standings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Billing data file (.json, .jsonl, .csv, .js) or a directory holding one
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// HCPCS procedure code to rank (27447 knee, 27130 hip)
    #[arg(short, long, global = true)]
    procedure: Option<String>,

    /// Metric to rank by
    #[arg(short, long, global = true, value_enum)]
    metric: Option<MetricOpt>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the national top providers
    Top(TopArgs),
    /// Find a provider and show where they stand
    Search(SearchArgs),
    /// Show the providers of one state
    State(StateArgs),
    /// Show summary statistics for the dataset and current ranking
    Stats(StatsArgs),
    /// Export the current ranking to JSON, JSON Lines, or CSV
    Export(ExportArgs),
    /// Show, remember, or forget the default procedure and metric
    Select(SelectArgs),
}

#[derive(Args)]
struct TopArgs {
    /// Number of providers to show
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct SearchArgs {
    /// Provider first name
    first_name: String,
    /// Provider last name (credentials optional, e.g. "Doe, MD")
    last_name: String,
}

#[derive(Args)]
struct StateArgs {
    /// Two-letter state code (e.g. CA, NY)
    state: String,
    /// Number of providers to show
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct StatsArgs {
    /// Number of states listed in the per-state table
    #[arg(long, default_value_t = 10)]
    states: usize,
}

#[derive(Args)]
struct ExportArgs {
    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
    /// Export format (defaults to the configured format)
    #[arg(long, value_enum)]
    format: Option<ExportFormatOpt>,
    /// Only export providers from this state
    #[arg(long)]
    state: Option<String>,
    /// Only export the national top N
    #[arg(long)]
    limit: Option<usize>,
    /// Write JSON on a single line instead of indented
    #[arg(long)]
    compact: bool,
    /// CSV field delimiter (e.g. ';' or a tab)
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// Leave out the CSV header row
    #[arg(long)]
    no_headers: bool,
}

#[derive(Args)]
struct SelectArgs {
    /// Remember the current --procedure / --metric for later runs
    #[arg(long, conflicts_with = "clear")]
    save: bool,
    /// Forget the remembered selection
    #[arg(long)]
    clear: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum MetricOpt {
    Services,
    Payment,
}

impl From<MetricOpt> for RankingMetric {
    fn from(opt: MetricOpt) -> Self {
        match opt {
            MetricOpt::Services => RankingMetric::ServiceCount,
            MetricOpt::Payment => RankingMetric::PaymentAmount,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ExportFormatOpt {
    Json,
    Jsonl,
    Csv,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Json => ExportFormat::Json,
            ExportFormatOpt::Jsonl => ExportFormat::JsonLines,
            ExportFormatOpt::Csv => ExportFormat::Csv,
        }
    }
}

/// Per-run state shared by every subcommand; settings live in the global config
struct RunContext {
    selection: Selection,
    store: Option<SelectionStore>,
    data: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = e
            .downcast_ref::<MedrankError>()
            .and_then(|err| err.user_message().split_once("\n\n").map(|(_, hint)| hint.to_string()))
        {
            eprintln!("\n{}", hint);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = build_context(&cli)?;

    match cli.command {
        Commands::Top(args) => cmd_top(&ctx, args),
        Commands::Search(args) => cmd_search(&ctx, args),
        Commands::State(args) => cmd_state(&ctx, args),
        Commands::Stats(args) => cmd_stats(&ctx, args),
        Commands::Export(args) => cmd_export(&ctx, args),
        Commands::Select(args) => cmd_select(&ctx, args),
    }
}

fn build_context(cli: &Cli) -> Result<RunContext> {
    // An explicit --config must exist; the platform default may not
    let config = match &cli.config {
        Some(path) => MedrankConfig::layered(Some(path.as_path()), true),
        None => MedrankConfig::layered(MedrankConfig::default_config_path().as_deref(), false),
    }
    .context("Failed to load configuration")?;
    debug!("Effective configuration: {:?}", config);

    let store = if config.remember_selection {
        SelectionStore::default_location()
    } else {
        None
    };

    let fallback = Selection::from_config(&config);
    let mut selection = match &store {
        Some(store) => store.load_or(fallback),
        None => fallback,
    };
    if let Some(code) = &cli.procedure {
        selection.procedure = ProcedureCode::new(code.as_str());
    }
    if let Some(metric) = cli.metric {
        selection.metric = metric.into();
    }

    let data = cli.data.clone().or_else(|| config.data_path.clone());
    config::set_global_config(config);

    Ok(RunContext { selection, store, data })
}

fn load_dataset(ctx: &RunContext) -> Result<BillingDataset> {
    let path = ctx.data.as_ref().context(
        "No billing data given; pass --data or set data_path in the config file (or MEDRANK_DATA_PATH)",
    )?;
    let dataset = BillingDatasetBuilder::from_config(&config::global_config())
        .data_file(path)
        .build()
        .with_context(|| format!("Failed to load billing data from {}", path.display()))?;
    if dataset.is_empty() {
        warn!("{} contains no billing records", path.display());
    }
    Ok(dataset)
}

fn open_session(ctx: &RunContext) -> Result<RankingSession> {
    let dataset = load_dataset(ctx)?;
    let options = config::global_config().aggregation_options();
    Ok(dataset.into_session(ctx.selection.clone(), options)?)
}

fn print_header(session: &RankingSession) {
    let selection = session.selection();
    println!("{}", display::procedure_headline(&selection.procedure));
    println!("Ranked by {} ({} providers)\n", selection.metric, session.ranking().len());
}

fn cmd_top(ctx: &RunContext, args: TopArgs) -> Result<()> {
    let session = open_session(ctx)?;
    print_header(&session);
    let limit = args.limit.unwrap_or(config::global_config().top_n);
    println!("{}", display::render_top(session.ranking(), limit));
    Ok(())
}

fn cmd_search(ctx: &RunContext, args: SearchArgs) -> Result<()> {
    let session = open_session(ctx)?;

    match session.lookup_provider(&args.first_name, &args.last_name)? {
        Some(index) => {
            print_header(&session);
            println!("{}", display::render_standings(&session.standings(index)));
        }
        None => println!("{}", display::not_found_message(&args.first_name, &args.last_name)),
    }
    Ok(())
}

fn cmd_state(ctx: &RunContext, args: StateArgs) -> Result<()> {
    let session = open_session(ctx)?;
    let limit = args.limit.unwrap_or(config::global_config().top_n);
    let cohort = session.state_cohort(&args.state);

    println!("{}", display::state_view_subtitle(&session.selection().procedure, limit));
    println!(
        "Top {} Providers in {}\n",
        limit,
        display::state_name(&args.state.to_uppercase())
    );
    println!("{}", display::render_state(&cohort, limit));
    Ok(())
}

fn cmd_stats(ctx: &RunContext, args: StatsArgs) -> Result<()> {
    let session = open_session(ctx)?;
    session.dataset().statistics()?.print_summary();
    println!();
    RankingAnalytics::new(session.ranking()).print_state_summary(args.states)?;
    Ok(())
}

fn cmd_export(ctx: &RunContext, args: ExportArgs) -> Result<()> {
    anyhow::ensure!(args.delimiter.is_ascii(), "The CSV delimiter must be a single ASCII character");
    let options = ExportOptions {
        pretty_print: !args.compact,
        include_headers: !args.no_headers,
        delimiter: args.delimiter as u8,
    };

    let session = open_session(ctx)?;
    let format = args
        .format
        .map(ExportFormat::from)
        .unwrap_or(config::global_config().default_export_format);
    let ranking = session.ranking();

    let state = args.state.as_deref().map(str::trim);
    let limit = args.limit.unwrap_or(usize::MAX);
    ranking
        .export_subset_with(
            &args.output,
            |p| {
                p.national_rank <= limit
                    && state.map_or(true, |s| p.state.eq_ignore_ascii_case(s))
            },
            format,
            &options,
        )
        .with_context(|| format!("Failed to export ranking to {}", args.output.display()))?;

    println!("Exported {} ranking to {}", format, args.output.display());
    Ok(())
}

fn cmd_select(ctx: &RunContext, args: SelectArgs) -> Result<()> {
    if args.clear || args.save {
        let store = ctx
            .store
            .as_ref()
            .context("Remembering selections is disabled (remember_selection = false) or no data directory is available")?;
        if args.clear {
            if store.clear()? {
                println!("Forgot the remembered selection");
            } else {
                println!("No selection was remembered");
            }
            return Ok(());
        }
        store.save(&ctx.selection)?;
        println!("Remembered selection in {}", store.path().display());
    }

    let selection = &ctx.selection;
    let label = selection
        .procedure
        .surgery_name()
        .map(|name| format!(" (total {})", name))
        .unwrap_or_default();
    println!("Procedure: {}{}", selection.procedure, label);
    println!("Metric:    {} ({})", selection.metric, selection.metric.as_str());
    Ok(())
}
