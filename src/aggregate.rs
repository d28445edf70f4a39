//! Grouping of contracts and projects into per-key accumulators.
//!
//! Every grouping is a left fold that threads an owned accumulator through
//! the records; derived per-group figures (averages, rates) are computed in a
//! separate pass over the finished fold. Money is summed through
//! [`OrderFreeSum`], so no figure depends on record order.

use crate::config::StageDefinition;
use crate::filter::{DateResolver, ProjectIndex};
use crate::types::{Contract, Project, RecordId};
use crate::util::{days_between, percent, safe_ratio, OrderFreeSum};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Bucket for records whose grouping dimension is absent.
pub const UNSPECIFIED: &str = "unspecified";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAccumulator {
    pub count: usize,
    pub sum_premium: OrderFreeSum,
    pub sum_monthly_premium: OrderFreeSum,
    pub sum_commission_year1: OrderFreeSum,
    pub sum_commission_recurring: OrderFreeSum,
    pub distinct_products: BTreeSet<String>,
    pub distinct_companies: BTreeSet<String>,
}

impl GroupAccumulator {
    pub fn absorb(mut self, contract: &Contract) -> Self {
        self.count += 1;
        self.sum_premium.add(contract.premium());
        self.sum_monthly_premium.add(contract.monthly());
        self.sum_commission_year1.add(contract.year1());
        self.sum_commission_recurring.add(contract.recurring());
        if let Some(product) = present(contract.product.as_deref()) {
            self.distinct_products.insert(product.to_string());
        }
        if let Some(company) = present(contract.company.as_deref()) {
            self.distinct_companies.insert(company.to_string());
        }
        self
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn dimension_or_unspecified(value: Option<&str>) -> String {
    present(value).unwrap_or(UNSPECIFIED).to_string()
}

pub fn month_key(date: NaiveDateTime) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn quarter_key(date: NaiveDateTime) -> String {
    format!("T{} {}", (date.month() - 1) / 3 + 1, date.year())
}

/// Chronological sort key of a `Tn YYYY` label; malformed labels sort first.
pub fn quarter_order(label: &str) -> (i32, u32) {
    let mut parts = label.split_whitespace();
    let quarter = parts
        .next()
        .and_then(|q| q.strip_prefix('T'))
        .and_then(|q| q.parse::<u32>().ok());
    let year = parts.next().and_then(|y| y.parse::<i32>().ok());
    match (year, quarter) {
        (Some(y), Some(q)) => (y, q),
        _ => (i32::MIN, 0),
    }
}

/// Dimension a contract collection can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Company,
    Product,
    Agent,
    Month,
    Quarter,
}

/// What a key extractor may consult besides the contract itself.
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'i, 'a> {
    pub projects: &'i ProjectIndex<'a>,
    pub dates: DateResolver,
}

impl GroupBy {
    pub fn key<'a>(&self, contract: &'a Contract, ctx: &KeyContext<'_, 'a>) -> String {
        match self {
            GroupBy::Company => dimension_or_unspecified(contract.company.as_deref()),
            GroupBy::Product => dimension_or_unspecified(contract.product.as_deref()),
            GroupBy::Agent => dimension_or_unspecified(ctx.projects.agent_of(contract)),
            GroupBy::Month => month_key(ctx.dates.bucket_date(contract.effective_date())),
            GroupBy::Quarter => quarter_key(ctx.dates.bucket_date(contract.effective_date())),
        }
    }
}

/// Finished fold: key → accumulator, remembering first-seen key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    order: Vec<String>,
    groups: HashMap<String, GroupAccumulator>,
}

impl Grouping {
    pub fn fold<'a, I, F>(contracts: I, key: F) -> Grouping
    where
        I: IntoIterator<Item = &'a Contract>,
        F: Fn(&'a Contract) -> String,
    {
        contracts
            .into_iter()
            .fold(Grouping::default(), |grouping, c| grouping.absorb(key(c), c))
    }

    pub fn by<'a, I>(contracts: I, group_by: GroupBy, ctx: &KeyContext<'_, 'a>) -> Grouping
    where
        I: IntoIterator<Item = &'a Contract>,
    {
        Self::fold(contracts, |c| group_by.key(c, ctx))
    }

    fn absorb(mut self, key: String, contract: &Contract) -> Self {
        let acc = match self.groups.remove(&key) {
            Some(acc) => acc,
            None => {
                self.order.push(key.clone());
                GroupAccumulator::default()
            }
        };
        self.groups.insert(key, acc.absorb(contract));
        self
    }

    pub fn get(&self, key: &str) -> Option<&GroupAccumulator> {
        self.groups.get(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Per-group summaries in first-seen order.
    pub fn summaries(&self) -> Vec<GroupSummary> {
        self.order
            .iter()
            .filter_map(|k| self.groups.get(k).map(|acc| GroupSummary::new(k, acc)))
            .collect()
    }

    /// Summaries sorted by `metric` descending; ties keep first-seen order.
    pub fn ranked_by<F>(&self, metric: F) -> Vec<GroupSummary>
    where
        F: Fn(&GroupSummary) -> f64,
    {
        let mut rows = self.summaries();
        rows.sort_by(|a, b| metric(b).partial_cmp(&metric(a)).unwrap_or(Ordering::Equal));
        rows
    }

    pub fn ranked_by_premium(&self) -> Vec<GroupSummary> {
        self.ranked_by(|s| s.premium)
    }

    pub fn ranked_by_commission(&self) -> Vec<GroupSummary> {
        self.ranked_by(|s| s.commission_year1)
    }

    /// Summaries ordered by their `YYYY-MM` key.
    pub fn by_month(&self) -> Vec<GroupSummary> {
        let mut rows = self.summaries();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }

    /// Summaries ordered chronologically by their `Tn YYYY` key.
    pub fn by_quarter(&self) -> Vec<GroupSummary> {
        let mut rows = self.summaries();
        rows.sort_by_key(|s| quarter_order(&s.key));
        rows
    }
}

/// One group after the derivation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    #[serde(rename = "cle")]
    pub key: String,
    #[serde(rename = "contrats")]
    pub contracts: usize,
    #[serde(rename = "revenus")]
    pub premium: f64,
    #[serde(rename = "primesMensuelles")]
    pub monthly_premium: f64,
    #[serde(rename = "commissions")]
    pub commission_year1: f64,
    #[serde(rename = "commissionsRecurrentes")]
    pub commission_recurring: f64,
    #[serde(rename = "primeMoyenne")]
    pub average_premium: f64,
    #[serde(rename = "commissionMoyenne")]
    pub average_commission: f64,
    #[serde(rename = "tauxCommission")]
    pub commission_rate: f64,
    #[serde(rename = "produits")]
    pub products: Vec<String>,
    #[serde(rename = "produitsCount")]
    pub product_count: usize,
    #[serde(rename = "compagnies")]
    pub companies: Vec<String>,
    #[serde(rename = "compagniesCount")]
    pub company_count: usize,
}

impl GroupSummary {
    fn new(key: &str, acc: &GroupAccumulator) -> Self {
        let premium = acc.sum_premium.total();
        let commission_year1 = acc.sum_commission_year1.total();
        GroupSummary {
            key: key.to_string(),
            contracts: acc.count,
            premium,
            monthly_premium: acc.sum_monthly_premium.total(),
            commission_year1,
            commission_recurring: acc.sum_commission_recurring.total(),
            average_premium: safe_ratio(premium, acc.count as f64),
            average_commission: safe_ratio(commission_year1, acc.count as f64),
            commission_rate: percent(commission_year1, premium),
            products: acc.distinct_products.iter().cloned().collect(),
            product_count: acc.distinct_products.len(),
            companies: acc.distinct_companies.iter().cloned().collect(),
            company_count: acc.distinct_companies.len(),
        }
    }
}

/// Global sums over a contract collection, orphans included.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub contracts: usize,
    pub premium: f64,
    pub monthly_premium: f64,
    pub commission_year1: f64,
    pub commission_recurring: f64,
}

impl Totals {
    pub fn of<'a, I>(contracts: I) -> Totals
    where
        I: IntoIterator<Item = &'a Contract>,
    {
        let acc = contracts
            .into_iter()
            .fold(GroupAccumulator::default(), GroupAccumulator::absorb);
        Totals {
            contracts: acc.count,
            premium: acc.sum_premium.total(),
            monthly_premium: acc.sum_monthly_premium.total(),
            commission_year1: acc.sum_commission_year1.total(),
            commission_recurring: acc.sum_commission_recurring.total(),
        }
    }
}

// ── Project-keyed aggregates ─────────────────────────────────────
//
// These join contracts to projects through `projet_id`. Contracts without a
// resolvable project are left out here; they still count in `Totals`.

/// First contract seen for each project id.
pub fn first_contract_by_project<'a, I>(contracts: I) -> HashMap<&'a RecordId, &'a Contract>
where
    I: IntoIterator<Item = &'a Contract>,
{
    contracts.into_iter().fold(HashMap::new(), |mut map, c| {
        if let Some(id) = c.project_id.as_ref() {
            map.entry(id).or_insert(c);
        }
        map
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTally {
    pub stage: String,
    pub count: usize,
    pub value: f64,
    #[serde(skip)]
    pub lost: bool,
}

/// Count projects per pipeline stage and value each stage at the premium of
/// its projects' first linked contract. A project whose status matches
/// several stages counts in each of them.
pub fn tally_stages<'a>(
    projects: &[&'a Project],
    contracts: &[&'a Contract],
    stages: &[StageDefinition],
) -> Vec<StageTally> {
    let first = first_contract_by_project(contracts.iter().copied());
    stages
        .iter()
        .map(|stage| {
            let (count, value) = projects
                .iter()
                .filter(|p| stage.matches(p.status.as_deref()))
                .fold((0usize, OrderFreeSum::default()), |(count, mut value), p| {
                    value.add(
                        p.link_id()
                            .and_then(|id| first.get(id))
                            .map(|c| c.premium())
                            .unwrap_or(0.0),
                    );
                    (count + 1, value)
                });
            StageTally {
                stage: stage.stage.clone(),
                count,
                value: value.total(),
                lost: stage.lost,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentPipeline {
    pub projects: usize,
    pub contracts: usize,
    pub revenue: f64,
}

/// Per-agent projects and the contracts linked to them, for agents present
/// on `projects`, in first-seen order.
pub fn fold_agent_pipeline<'a>(
    projects: &[&'a Project],
    contracts: &[&'a Contract],
) -> Vec<(String, AgentPipeline)> {
    let mut order: Vec<&'a str> = Vec::new();
    let mut project_owner: HashMap<&'a RecordId, &'a str> = HashMap::new();
    let mut stats: HashMap<&'a str, AgentPipeline> = HashMap::new();
    let mut revenue: HashMap<&'a str, OrderFreeSum> = HashMap::new();

    for p in projects {
        let Some(agent) = present(p.agent.as_deref()) else {
            continue;
        };
        let entry = stats.entry(agent).or_insert_with(|| {
            order.push(agent);
            AgentPipeline::default()
        });
        entry.projects += 1;
        if let Some(id) = p.link_id() {
            project_owner.entry(id).or_insert(agent);
        }
    }

    for c in contracts {
        let owner = c.project_id.as_ref().and_then(|id| project_owner.get(id));
        if let Some(&agent) = owner {
            if let Some(entry) = stats.get_mut(agent) {
                entry.contracts += 1;
                revenue.entry(agent).or_default().add(c.premium());
            }
        }
    }

    order
        .into_iter()
        .filter_map(|agent| {
            let mut s = stats.remove(agent)?;
            s.revenue = revenue.get(agent).map(OrderFreeSum::total).unwrap_or(0.0);
            Some((agent.to_string(), s))
        })
        .collect()
}

/// Mean whole days between a project's creation and the signing of a
/// contract linked to it. Only pairs where both sides carry their own date
/// take part.
pub fn average_conversion_days<'a>(projects: &[&'a Project], contracts: &[&'a Contract]) -> f64 {
    let index = ProjectIndex::build(projects.iter().copied());
    let (sum, n) = contracts
        .iter()
        .filter_map(|c| {
            let signed = c.explicit_date()?;
            let opened = index.parent(c)?.explicit_date()?;
            Some(days_between(opened, signed))
        })
        .fold((0i64, 0usize), |(sum, n), d| (sum + d, n + 1));
    safe_ratio(sum as f64, n as f64)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMonth {
    #[serde(rename = "mois")]
    pub month: String,
    #[serde(rename = "nouveauxProjets")]
    pub new_projects: usize,
    #[serde(rename = "contratsSignes")]
    pub signed_contracts: usize,
    #[serde(rename = "revenus")]
    pub revenue: f64,
}

/// Activity for each of the `months` calendar months ending with the month
/// of `dates.now`, oldest first. Months without activity are present with
/// zeros.
pub fn pipeline_months<'a>(
    projects: &[&'a Project],
    contracts: &[&'a Contract],
    dates: &DateResolver,
    months: u32,
) -> Vec<PipelineMonth> {
    let anchor = NaiveDate::from_ymd_opt(dates.now.year(), dates.now.month(), 1);
    let keys: Vec<String> = (0..months)
        .rev()
        .filter_map(|i| anchor.and_then(|a| a.checked_sub_months(Months::new(i))))
        .filter_map(|d| d.and_hms_opt(0, 0, 0))
        .map(month_key)
        .collect();
    let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();

    let mut series: HashMap<String, PipelineMonth> = HashMap::new();
    let mut revenue: HashMap<String, OrderFreeSum> = HashMap::new();
    for p in projects {
        let key = month_key(dates.bucket_date(p.effective_date()));
        if wanted.contains(key.as_str()) {
            series.entry(key).or_default().new_projects += 1;
        }
    }
    for c in contracts {
        let key = month_key(dates.bucket_date(c.effective_date()));
        if wanted.contains(key.as_str()) {
            revenue.entry(key.clone()).or_default().add(c.premium());
            series.entry(key).or_default().signed_contracts += 1;
        }
    }

    keys.into_iter()
        .map(|key| {
            let mut m = series.remove(&key).unwrap_or_default();
            m.revenue = revenue.get(&key).map(OrderFreeSum::total).unwrap_or(0.0);
            m.month = key;
            m
        })
        .collect()
}
