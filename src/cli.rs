use crate::error::{ReportError, Result};
use crate::filter::FilterParams;
use crate::loader::CsvSources;
use crate::period::Period;
use crate::util::parse_timestamp_safe;
use chrono::{NaiveDateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "brokerage-report")]
#[command(about = "Revenue, commission, pipeline and email analytics for a brokerage CRM", long_about = None)]
#[command(version)]
pub struct Cli {
    /// JSON snapshot with contacts, projets, contrats and campagnes arrays
    #[arg(long, global = true, conflicts_with_all = ["contacts", "projects", "contracts", "campaigns"])]
    pub snapshot: Option<PathBuf>,

    /// Contacts CSV export
    #[arg(long, global = true)]
    pub contacts: Option<PathBuf>,

    /// Projects CSV export
    #[arg(long, global = true)]
    pub projects: Option<PathBuf>,

    /// Contracts CSV export
    #[arg(long, global = true)]
    pub contracts: Option<PathBuf>,

    /// Email campaign statistics CSV export
    #[arg(long, global = true)]
    pub campaigns: Option<PathBuf>,

    /// TOML file overriding analytics constants
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Analysis window: 7d, 30d, 90d, 1m, 3m, 6m, 1y, ytd or all
    #[arg(short, long, global = true, default_value = "3m")]
    pub period: String,

    /// Only count projects and contracts credited to this agent
    #[arg(long, global = true)]
    pub agent: Option<String>,

    /// Only count email campaigns of this type
    #[arg(long, global = true)]
    pub campaign_type: Option<String>,

    /// Reference instant (defaults to the current UTC time)
    #[arg(long, global = true)]
    pub now: Option<String>,

    /// Directory receiving JSON and CSV exports
    #[arg(short, long, global = true)]
    pub out_dir: Option<PathBuf>,

    /// Print the report as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Premium, commission and portfolio figures
    Revenue,
    /// Commission rollups by agent and company
    Commissions,
    /// Stage distribution, agent performance and time to sign
    Pipeline,
    /// Email deliverability and engagement
    Email,
    /// Every report in one document
    All,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Revenue => "revenue",
            Commands::Commissions => "commissions",
            Commands::Pipeline => "pipeline",
            Commands::Email => "email",
            Commands::All => "all",
        }
    }
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }

    pub fn reference_time(&self) -> Result<NaiveDateTime> {
        match self.now.as_deref() {
            None => Ok(Utc::now().naive_utc()),
            Some(raw) => parse_timestamp_safe(Some(raw))
                .ok_or_else(|| ReportError::InvalidTimestamp(raw.to_string())),
        }
    }

    pub fn filter_params(&self) -> Result<FilterParams> {
        Ok(
            FilterParams::new(Period::from_code(&self.period), self.reference_time()?)
                .with_agent(self.agent.as_deref())
                .with_campaign_type(self.campaign_type.as_deref()),
        )
    }

    pub fn csv_sources(&self) -> CsvSources {
        CsvSources {
            contacts: self.contacts.clone(),
            projects: self.projects.clone(),
            contracts: self.contracts.clone(),
            campaigns: self.campaigns.clone(),
        }
    }
}
