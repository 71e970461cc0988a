use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use stops_datasets::app::{App, StageOptions};
use stops_datasets::catalog::GoogleSheetClient;
use stops_datasets::config::ConfigLoader;
use stops_datasets::das::DasgoClient;
use stops_datasets::domain::{Period, Tier};
use stops_datasets::error::DatasetError;
use stops_datasets::output::{JsonOutput, OutputMode, PlainOutput};
use stops_datasets::staging::XrdcpCopier;
use stops_datasets::tools;

#[derive(Parser)]
#[command(name = "stops-datasets")]
#[command(about = "Datasets of the StopsCompressed analysis: list file locations and stage them locally")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Enable debug output")]
    debug: bool,

    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,

    #[arg(long, global = true, help = "Path to a JSON config file")]
    config: Option<String>,

    #[arg(long, global = true, help = "Local cache directory for staged files")]
    cache_root: Option<Utf8PathBuf>,

    #[arg(long, global = true, help = "Maximum number of parallel copies")]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "List dataset content")]
    List(ListArgs),
    #[command(about = "Stage dataset")]
    Stage(StageArgs),
    #[command(about = "List the datasets of a period")]
    Catalog(CatalogArgs),
    #[command(about = "Show the external tools in use")]
    Tools,
}

#[derive(Args)]
struct ListArgs {
    dataset: String,

    #[arg(long, value_enum, ignore_case = true, default_value_t = Period::Run2016preVFP, help = "CMS datataking period")]
    period: Period,

    #[arg(long, value_enum, ignore_case = true, default_value_t = Tier::NTuple, help = "CMS data tier")]
    tier: Tier,
}

#[derive(Args)]
struct StageArgs {
    dataset: String,

    #[arg(long, value_enum, ignore_case = true, default_value_t = Period::Run2016preVFP, help = "CMS datataking period")]
    period: Period,

    #[arg(long = "type", alias = "tier", value_enum, ignore_case = true, default_value_t = Tier::NTuple, help = "CMS data tier")]
    tier: Tier,

    #[arg(long, default_value_t = 0, help = "Stage at most this many files (0 = all)")]
    max_files: usize,
}

#[derive(Args)]
struct CatalogArgs {
    #[arg(long, value_enum, ignore_case = true, default_value_t = Period::Run2016preVFP, help = "CMS datataking period")]
    period: Period,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DatasetError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DatasetError) -> u8 {
    match error {
        DatasetError::UnknownDatasetOrTier { .. }
        | DatasetError::InvalidPeriod(_)
        | DatasetError::InvalidTier(_) => 2,
        DatasetError::SourceUnavailable(_)
        | DatasetError::SourceStatus { .. }
        | DatasetError::QueryFailed { .. }
        | DatasetError::EnumerationFailed { .. }
        | DatasetError::StagingFailed { .. }
        | DatasetError::MissingTool(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Plain
    };

    if let Command::Tools = cli.command {
        let report = tools::report();
        return match output_mode {
            OutputMode::Json => JsonOutput::print_tools(&report),
            OutputMode::Plain => PlainOutput::print_tools(&report),
        }
        .into_diagnostic();
    }

    let mut settings = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(cache_root) = cli.cache_root {
        settings.cache_root = cache_root;
    }
    if let Some(jobs) = cli.jobs {
        settings.max_copies = jobs.max(1);
    }

    let app = App::new(
        settings,
        GoogleSheetClient::new()?,
        DasgoClient::new(),
        XrdcpCopier::new(),
    );

    match cli.command {
        Command::List(args) => {
            let result = app.list(&args.dataset, args.period, args.tier)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_list(&result),
                OutputMode::Plain => PlainOutput::print_list(&result),
            }
            .into_diagnostic()
        }
        Command::Stage(args) => {
            let options = StageOptions {
                max_files: args.max_files,
            };
            let result = app.stage(&args.dataset, args.period, args.tier, options)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_stage(&result),
                OutputMode::Plain => PlainOutput::print_stage(&result),
            }
            .into_diagnostic()
        }
        Command::Catalog(args) => {
            let result = app.catalog(args.period)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_catalog(&result),
                OutputMode::Plain => PlainOutput::print_catalog(&result),
            }
            .into_diagnostic()
        }
        Command::Tools => Ok(()),
    }
}
