//! Console previews and file exports of assembled reports.
//!
//! Reports themselves only carry raw numbers; the row types here are the
//! only place figures are turned into display strings.

use crate::aggregate::{GroupSummary, StageTally};
use crate::error::{ReportError, Result};
use crate::reports::{
    AgentPerformance, CommissionReport, CommissionRollup, EmailReport, MonthlyBucket,
    PipelineReport, RevenueReport, TypePerformance,
};
use crate::util::{format_int, format_number};
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| ReportError::csv(path, e))?;
    for r in rows {
        wtr.serialize(r).map_err(|e| ReportError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| ReportError::io(path, e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).map_err(|e| ReportError::json(path, e))?;
    std::fs::write(path, s).map_err(|e| ReportError::io(path, e))?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows, or `(no rows)`.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
}

fn money(v: f64) -> String {
    format_number(v, 2)
}

fn pct(v: f64) -> String {
    format!("{}%", format_number(v, 1))
}

fn count(n: usize) -> String {
    format_int(n)
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HeadlineRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

fn headline(metric: &str, value: String) -> HeadlineRow {
    HeadlineRow {
        metric: metric.to_string(),
        value,
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RollupRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "Contracts")]
    #[tabled(rename = "Contracts")]
    pub contracts: usize,
    #[serde(rename = "Premium")]
    #[tabled(rename = "Premium")]
    pub premium: String,
    #[serde(rename = "Commission")]
    #[tabled(rename = "Commission")]
    pub commission: String,
    #[serde(rename = "CommissionRate")]
    #[tabled(rename = "CommissionRate")]
    pub commission_rate: String,
    #[serde(rename = "AvgPremium")]
    #[tabled(rename = "AvgPremium")]
    pub average_premium: String,
}

pub fn rollup_rows(groups: &[GroupSummary]) -> Vec<RollupRow> {
    groups
        .iter()
        .enumerate()
        .map(|(i, g)| RollupRow {
            rank: i + 1,
            key: g.key.clone(),
            contracts: g.contracts,
            premium: money(g.premium),
            commission: money(g.commission_year1),
            commission_rate: pct(g.commission_rate),
            average_premium: money(g.average_premium),
        })
        .collect()
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CommissionRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "Contracts")]
    #[tabled(rename = "Contracts")]
    pub contracts: usize,
    #[serde(rename = "Year1Commission")]
    #[tabled(rename = "Year1Commission")]
    pub commission_year1: String,
    #[serde(rename = "RecurringCommission")]
    #[tabled(rename = "RecurringCommission")]
    pub commission_recurring: String,
    #[serde(rename = "RecurringPotential")]
    #[tabled(rename = "RecurringPotential")]
    pub recurring_potential: String,
}

pub fn commission_rows(rollups: &[CommissionRollup]) -> Vec<CommissionRow> {
    rollups
        .iter()
        .enumerate()
        .map(|(i, r)| CommissionRow {
            rank: i + 1,
            key: r.group.key.clone(),
            contracts: r.group.contracts,
            commission_year1: money(r.group.commission_year1),
            commission_recurring: money(r.group.commission_recurring),
            recurring_potential: money(r.recurring_potential),
        })
        .collect()
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Contracts")]
    #[tabled(rename = "Contracts")]
    pub contracts: usize,
    #[serde(rename = "Revenue")]
    #[tabled(rename = "Revenue")]
    pub revenue: String,
    #[serde(rename = "Commission")]
    #[tabled(rename = "Commission")]
    pub commissions: String,
    #[serde(rename = "AvgPremium")]
    #[tabled(rename = "AvgPremium")]
    pub average_premium: String,
}

pub fn month_rows(months: &[MonthlyBucket]) -> Vec<MonthRow> {
    months
        .iter()
        .map(|m| MonthRow {
            month: m.month.clone(),
            contracts: m.contracts,
            revenue: money(m.revenue),
            commissions: money(m.commissions),
            average_premium: money(m.average_premium),
        })
        .collect()
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StageRow {
    #[serde(rename = "Stage")]
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[serde(rename = "Projects")]
    #[tabled(rename = "Projects")]
    pub count: usize,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

pub fn stage_rows(stages: &[StageTally]) -> Vec<StageRow> {
    stages
        .iter()
        .map(|s| StageRow {
            stage: s.stage.clone(),
            count: s.count,
            value: money(s.value),
        })
        .collect()
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AgentRow {
    #[serde(rename = "Agent")]
    #[tabled(rename = "Agent")]
    pub agent: String,
    #[serde(rename = "Projects")]
    #[tabled(rename = "Projects")]
    pub projects: usize,
    #[serde(rename = "Contracts")]
    #[tabled(rename = "Contracts")]
    pub contracts: usize,
    #[serde(rename = "Revenue")]
    #[tabled(rename = "Revenue")]
    pub revenue: String,
    #[serde(rename = "ConversionRate")]
    #[tabled(rename = "ConversionRate")]
    pub conversion_rate: String,
}

pub fn agent_rows(agents: &[AgentPerformance]) -> Vec<AgentRow> {
    agents
        .iter()
        .map(|a| AgentRow {
            agent: a.agent.clone(),
            projects: a.projects,
            contracts: a.contracts,
            revenue: money(a.revenue),
            conversion_rate: pct(a.conversion_rate),
        })
        .collect()
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CampaignTypeRow {
    #[serde(rename = "Type")]
    #[tabled(rename = "Type")]
    pub campaign_type: String,
    #[serde(rename = "Sent")]
    #[tabled(rename = "Sent")]
    pub sent: String,
    #[serde(rename = "DeliveryRate")]
    #[tabled(rename = "DeliveryRate")]
    pub delivery_rate: String,
    #[serde(rename = "OpenRate")]
    #[tabled(rename = "OpenRate")]
    pub open_rate: String,
    #[serde(rename = "ClickRate")]
    #[tabled(rename = "ClickRate")]
    pub click_rate: String,
}

pub fn campaign_type_rows(types: &[TypePerformance]) -> Vec<CampaignTypeRow> {
    types
        .iter()
        .map(|t| CampaignTypeRow {
            campaign_type: t.campaign_type.clone(),
            sent: format_int(t.sent),
            delivery_rate: pct(t.delivery_rate),
            open_rate: pct(t.open_rate),
            click_rate: pct(t.click_rate),
        })
        .collect()
}

pub fn revenue_headlines(r: &RevenueReport) -> Vec<HeadlineRow> {
    vec![
        headline("Total premium", money(r.total_premium)),
        headline("Year-1 commission", money(r.total_commission)),
        headline("Recurring commission", money(r.total_recurring_commission)),
        headline("Contracts", count(r.contract_count)),
        headline("Projects", count(r.project_count)),
        headline("Conversion rate", pct(r.conversion_rate)),
        headline("Global margin", pct(r.global_margin)),
        headline("Portfolio valuation", money(r.portfolio_valuation)),
        headline("Projected annual revenue", money(r.projected_annual_revenue)),
        headline("Revenue growth", pct(r.revenue_growth)),
        headline("Performance vs target", pct(r.performance_vs_target)),
        headline(
            "Best month",
            r.best_month
                .as_ref()
                .map(|m| format!("{} ({})", m.month, money(m.revenue)))
                .unwrap_or_else(|| "-".to_string()),
        ),
        headline("Trend", format!("{:?}", r.trend).to_lowercase()),
    ]
}

pub fn commission_headlines(r: &CommissionReport) -> Vec<HeadlineRow> {
    vec![
        headline("Year-1 commission", money(r.total_commission_year1)),
        headline("Recurring commission", money(r.total_commission_recurring)),
        headline("Annual premium", money(r.total_annual_premium)),
        headline("Contracts", count(r.contract_count)),
        headline("Average commission rate", pct(r.average_commission_rate)),
        headline("Recurring potential", money(r.recurring_potential)),
        headline("Projected annual commission", money(r.projected_annual_commission)),
        headline("Commission growth", pct(r.commission_growth)),
        headline("Customer lifetime value", money(r.customer_lifetime_value)),
    ]
}

pub fn pipeline_headlines(r: &PipelineReport) -> Vec<HeadlineRow> {
    let m = &r.metrics;
    vec![
        headline("Projects", count(m.total_projects)),
        headline("Signed", count(m.signed)),
        headline("Conversion rate", pct(m.conversion_rate)),
        headline("Revenue", money(m.total_revenue)),
        headline("Average revenue", money(m.average_revenue)),
        headline("Average days to sign", format_number(m.average_conversion_days, 1)),
    ]
}

pub fn email_headlines(r: &EmailReport) -> Vec<HeadlineRow> {
    vec![
        headline("Sent", format_int(r.totals.sent)),
        headline("Delivery rate", pct(r.rates.delivery)),
        headline("Open rate", pct(r.rates.open)),
        headline("Click rate", pct(r.rates.click)),
        headline("Click-to-open rate", pct(r.rates.click_to_open)),
        headline("Bounce rate", pct(r.rates.bounce)),
        headline("Unsubscribe rate", pct(r.rates.unsubscribe)),
        headline("Health score", format!("{}/100", r.health_score)),
        headline("Contacts", count(r.segmentation.total)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_renders_placeholder() {
        let rows: Vec<HeadlineRow> = Vec::new();
        assert_eq!(render_table(&rows, 5), "(no rows)");
    }

    #[test]
    fn table_is_truncated_to_max_rows() {
        let stages = vec![
            StageTally {
                stage: "Nouveau".into(),
                count: 3,
                value: 1234.5,
                lost: false,
            },
            StageTally {
                stage: "Perdu".into(),
                count: 1,
                value: 0.0,
                lost: true,
            },
        ];
        let rows = stage_rows(&stages);
        assert_eq!(rows[0].value, "1,234.50");
        let table = render_table(&rows, 1);
        assert!(table.contains("Nouveau"));
        assert!(!table.contains("Perdu"));
    }

    #[test]
    fn csv_export_uses_row_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlines.csv");
        write_csv(&path, &[headline("Contracts", count(1200))]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Metric,Value\nContracts,\"1,200\"\n");
    }

    #[test]
    fn json_export_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}");
    }
}
