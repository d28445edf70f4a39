// Entry point: parse arguments, load one snapshot, print and export the
// requested report.
use brokerage_report::cli::{Cli, Commands};
use brokerage_report::loader::{load_snapshot_csv, load_snapshot_json};
use brokerage_report::output::{
    agent_rows, campaign_type_rows, commission_headlines, commission_rows, email_headlines,
    month_rows, pipeline_headlines, preview_table, revenue_headlines, rollup_rows, stage_rows,
    write_csv, write_json,
};
use brokerage_report::{
    build_report, load_config, AnalyticsConfig, AnalyticsReport, ReportError, Result, Snapshot,
};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

const PREVIEW_ROWS: usize = 5;

fn load_snapshot(cli: &Cli) -> Result<Snapshot> {
    if let Some(path) = &cli.snapshot {
        return load_snapshot_json(path);
    }
    let sources = cli.csv_sources();
    if sources.is_empty() {
        return Err(ReportError::NoInput);
    }
    let (snapshot, load_report) = load_snapshot_csv(&sources)?;
    if load_report.parse_errors > 0 {
        warn!(
            "{} of {} rows skipped due to parse errors",
            load_report.parse_errors, load_report.total_rows
        );
    }
    Ok(snapshot)
}

/// Write one CSV export into `out_dir` and mention it under the preview.
fn export<T: Serialize>(out_dir: Option<&Path>, file: &str, rows: &[T]) -> Result<()> {
    if let Some(dir) = out_dir {
        let path = dir.join(file);
        write_csv(&path, rows)?;
        println!("(Full table exported to {})\n", path.display());
    }
    Ok(())
}

fn print_revenue(report: &AnalyticsReport, out_dir: Option<&Path>) -> Result<()> {
    let r = &report.revenue;
    let note = format!("period {}", report.period);
    preview_table("Revenue", Some(note.as_str()), &revenue_headlines(r), usize::MAX);

    let companies = rollup_rows(&r.top_companies);
    preview_table("Top companies", Some("by annual premium"), &companies, PREVIEW_ROWS);
    export(out_dir, "revenue_companies.csv", &companies)?;

    let products = rollup_rows(&r.top_products);
    preview_table("Top products", Some("by annual premium"), &products, PREVIEW_ROWS);
    export(out_dir, "revenue_products.csv", &products)?;

    let months = month_rows(&r.monthly);
    preview_table("Monthly revenue", None, &months, usize::MAX);
    export(out_dir, "revenue_monthly.csv", &months)
}

fn print_commissions(report: &AnalyticsReport, out_dir: Option<&Path>) -> Result<()> {
    let r = &report.commissions;
    let note = format!("period {}", report.period);
    preview_table("Commissions", Some(note.as_str()), &commission_headlines(r), usize::MAX);

    let agents = commission_rows(&r.top_agents);
    preview_table("Top agents", Some("by year-1 commission"), &agents, PREVIEW_ROWS);
    export(out_dir, "commissions_agents.csv", &agents)?;

    let companies = commission_rows(&r.top_companies);
    preview_table("Top companies", Some("by year-1 commission"), &companies, PREVIEW_ROWS);
    export(out_dir, "commissions_companies.csv", &companies)
}

fn print_pipeline(report: &AnalyticsReport, out_dir: Option<&Path>) -> Result<()> {
    let r = &report.pipeline;
    let note = format!("period {}", report.period);
    preview_table("Pipeline", Some(note.as_str()), &pipeline_headlines(r), usize::MAX);

    let stages = stage_rows(&r.stages);
    preview_table("Stages", None, &stages, usize::MAX);
    export(out_dir, "pipeline_stages.csv", &stages)?;

    let agents = agent_rows(&r.agents);
    preview_table("Agent performance", Some("by revenue"), &agents, PREVIEW_ROWS);
    export(out_dir, "pipeline_agents.csv", &agents)
}

fn print_email(report: &AnalyticsReport, out_dir: Option<&Path>) -> Result<()> {
    let r = &report.email;
    let note = format!("period {}", report.period);
    preview_table("Email", Some(note.as_str()), &email_headlines(r), usize::MAX);

    let types = campaign_type_rows(&r.by_type);
    preview_table("Performance by campaign type", None, &types, usize::MAX);
    export(out_dir, "email_types.csv", &types)
}

fn emit<T: Serialize>(cli: &Cli, name: &str, value: &T) -> Result<()> {
    if cli.json {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| ReportError::json("<stdout>", e))?;
        println!("{}", text);
    }
    if let Some(dir) = &cli.out_dir {
        let path = dir.join(format!("{}.json", name));
        write_json(&path, value)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AnalyticsConfig::default(),
    };
    let params = cli.filter_params()?;
    let snapshot = load_snapshot(cli)?;

    if let Some(dir) = &cli.out_dir {
        std::fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
    }

    let report = build_report(&snapshot, &params, &config);
    let name = cli.command.name();

    match cli.command {
        Commands::Revenue => emit(cli, name, &report.revenue)?,
        Commands::Commissions => emit(cli, name, &report.commissions)?,
        Commands::Pipeline => emit(cli, name, &report.pipeline)?,
        Commands::Email => emit(cli, name, &report.email)?,
        Commands::All => emit(cli, name, &report)?,
    }
    if cli.json {
        return Ok(());
    }

    let out_dir = cli.out_dir.as_deref();
    match cli.command {
        Commands::Revenue => print_revenue(&report, out_dir),
        Commands::Commissions => print_commissions(&report, out_dir),
        Commands::Pipeline => print_pipeline(&report, out_dir),
        Commands::Email => print_email(&report, out_dir),
        Commands::All => {
            print_revenue(&report, out_dir)?;
            print_commissions(&report, out_dir)?;
            print_pipeline(&report, out_dir)?;
            print_email(&report, out_dir)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
