//! Analytics core of a brokerage CRM.
//!
//! A [`Snapshot`] of contacts, projects, contracts and email campaigns is
//! filtered to a window ([`filter`]), folded into per-key groups
//! ([`aggregate`]), turned into ratios and projections ([`metrics`]) and
//! assembled into serializable reports ([`reports`]).

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod period;
pub mod reports;
pub mod types;
pub mod util;

pub use config::{load_config, AnalyticsConfig, MissingDatePolicy};
pub use error::{ReportError, Result};
pub use filter::{filter_snapshot, FilterParams, FilteredSnapshot};
pub use period::Period;
pub use reports::{
    build_report, generate_commission_report, generate_email_report, generate_pipeline_report,
    generate_revenue_report, Analysis, AnalyticsReport, CommissionReport, EmailReport,
    PipelineReport, RevenueReport,
};
pub use types::{Contact, Contract, EmailCampaign, Project, RecordId, Snapshot};
