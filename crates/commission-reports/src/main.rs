//! Commission Reports
//!
//! Builds filtered commission reports from a commissions CSV and ranks end
//! customers by revenue.

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use commission_reports::reports::print_summary;
use commission_reports::{
    Config, CsvExporter, CustomerSelector, DateBasis, DateRange, FileConfig, FilterSpec, PrincipalSelector,
    ReferenceData, ReportJob, ReportRunner, Session, Tier,
};

#[derive(Parser, Debug)]
#[command(name = "commission-reports")]
#[command(about = "Filtered commission reports with customers ranked by revenue")]
struct Args {
    /// Config file (optional; defaults apply when missing)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Directory holding the lookup sheets (overrides config)
    #[arg(long, global = true)]
    lookup_dir: Option<PathBuf>,

    /// Output directory for generated reports (overrides config)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a report
    Run(RunArgs),

    /// List the customers and principals that can be selected
    Options {
        /// Commissions CSV file
        dataset: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Commissions CSV file
    dataset: PathBuf,

    /// Customer tier
    #[arg(long, value_enum, default_value_t = TierArg::All, conflicts_with = "customer")]
    tier: TierArg,

    /// Single customer by exact name
    #[arg(long)]
    customer: Option<String>,

    /// Principal by full name (default: all)
    #[arg(long)]
    principal: Option<String>,

    /// Date column to filter on
    #[arg(long, value_enum, default_value_t = DateBasisArg::Na)]
    date_basis: DateBasisArg,

    /// Start date, YYYY-MM-DD (default: January 1 of the current year)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date, YYYY-MM-DD (default: today)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Skip the console summary
    #[arg(long)]
    no_summary: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TierArg {
    All,
    Top10,
    Top25,
    Top50,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DateBasisArg {
    Paid,
    Invoice,
    Na,
}

impl From<DateBasisArg> for DateBasis {
    fn from(arg: DateBasisArg) -> Self {
        match arg {
            DateBasisArg::Paid => DateBasis::Paid,
            DateBasisArg::Invoice => DateBasis::Invoice,
            DateBasisArg::Na => DateBasis::NotApplicable,
        }
    }
}

impl RunArgs {
    fn filter_spec(&self, today: NaiveDate) -> FilterSpec {
        let customer = match (&self.customer, self.tier) {
            (Some(name), _) => CustomerSelector::ExactName(name.clone()),
            (None, TierArg::All) => CustomerSelector::All,
            (None, TierArg::Top10) => CustomerSelector::Tier(Tier::Top10),
            (None, TierArg::Top25) => CustomerSelector::Tier(Tier::Top25),
            (None, TierArg::Top50) => CustomerSelector::Tier(Tier::Top50),
        };

        let principal = match &self.principal {
            Some(name) => PrincipalSelector::Named(name.clone()),
            None => PrincipalSelector::All,
        };

        let start = self
            .start
            .or_else(|| NaiveDate::from_ymd_opt(today.year(), 1, 1))
            .unwrap_or(today);
        let end = self.end.unwrap_or(today);

        FilterSpec {
            customer,
            principal,
            date_basis: self.date_basis.into(),
            date_range: DateRange::new(start, end),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let file_config = FileConfig::load_or_default(&args.config)?;
    let config = Config::from_file(file_config, args.lookup_dir, args.output_dir);

    let reference = ReferenceData::load(&config.lookup).context("Failed to load lookup sheets")?;
    let reference = Arc::new(reference);

    match args.command {
        Command::Run(run) => run_report(run, &config, reference).await,
        Command::Options { dataset } => list_options(&dataset, &reference),
    }
}

async fn run_report(run: RunArgs, config: &Config, reference: Arc<ReferenceData>) -> Result<()> {
    let session = Session::open(&run.dataset, &reference)?;
    let spec = run.filter_spec(Local::now().date_naive());

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output directory {}", config.output_dir.display()))?;

    let job = ReportJob::new(reference, &session, spec, &config.output_dir);
    info!("Output: {}", job.output_base().display());

    let runner = ReportRunner::new();
    let summary = runner
        .submit_report(job, CsvExporter)?
        .await
        .context("Report task panicked")??;

    if !run.no_summary {
        print_summary(&summary);
    }

    Ok(())
}

fn list_options(dataset: &std::path::Path, reference: &ReferenceData) -> Result<()> {
    let session = Session::open(dataset, reference)?;
    let options = session.options(reference);

    println!("\nCustomers ({}):", options.customers.len());
    for customer in &options.customers {
        println!("  {}", customer);
    }

    println!("\nPrincipals ({}):", options.principals.len());
    for principal in &options.principals {
        println!("  {}", principal);
    }

    Ok(())
}
