use crate::aggregate::{
    average_conversion_days, fold_agent_pipeline, pipeline_months, tally_stages, GroupBy,
    GroupSummary, Grouping, KeyContext, PipelineMonth, StageTally, Totals,
};
use crate::config::{AnalyticsConfig, EmailBenchmarks};
use crate::filter::{filter_snapshot, DateResolver, FilterParams, FilteredSnapshot, ProjectIndex};
use crate::metrics::{
    conversion_rate, customer_lifetime_value, global_margin, health_score, performance_vs_target,
    portfolio_valuation, project, recurring_potential, BenchmarkStatus, EmailRates, EmailTotals,
    Trend,
};
use crate::period::Period;
use crate::types::{ContactStatus, Contract, EmailCampaign, Snapshot};
use crate::util::{percent, safe_ratio};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;

/// Campaign categories reported by the mailing provider, in display order.
pub const CAMPAIGN_TYPES: [&str; 4] = ["newsletter", "promotional", "transactional", "follow-up"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucket {
    #[serde(rename = "mois")]
    pub month: String,
    #[serde(rename = "revenus")]
    pub revenue: f64,
    #[serde(rename = "commissions")]
    pub commissions: f64,
    #[serde(rename = "contrats")]
    pub contracts: usize,
    #[serde(rename = "primeMoyenne")]
    pub average_premium: f64,
}

impl From<GroupSummary> for MonthlyBucket {
    fn from(s: GroupSummary) -> Self {
        MonthlyBucket {
            month: s.key,
            revenue: s.premium,
            commissions: s.commission_year1,
            contracts: s.contracts,
            average_premium: s.average_premium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterBucket {
    #[serde(rename = "trimestre")]
    pub quarter: String,
    #[serde(rename = "revenus")]
    pub revenue: f64,
    #[serde(rename = "contrats")]
    pub contracts: usize,
}

impl From<GroupSummary> for QuarterBucket {
    fn from(s: GroupSummary) -> Self {
        QuarterBucket {
            quarter: s.key,
            revenue: s.premium,
            contracts: s.contracts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStep {
    pub name: String,
    pub value: usize,
}

impl FunnelStep {
    fn new(name: &str, value: usize) -> Self {
        FunnelStep {
            name: name.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueReport {
    #[serde(rename = "totalRevenuePrimes")]
    pub total_premium: f64,
    #[serde(rename = "totalCommissions")]
    pub total_commission: f64,
    #[serde(rename = "totalCommissionsRecurrentes")]
    pub total_recurring_commission: f64,
    #[serde(rename = "nombreContrats")]
    pub contract_count: usize,
    #[serde(rename = "nombreProjets")]
    pub project_count: usize,
    #[serde(rename = "revenueMoyenParContrat")]
    pub average_premium_per_contract: f64,
    #[serde(rename = "commissionMoyenneParContrat")]
    pub average_commission_per_contract: f64,
    #[serde(rename = "tauxConversion")]
    pub conversion_rate: f64,
    #[serde(rename = "panierMoyen")]
    pub average_monthly_premium: f64,
    #[serde(rename = "margeGlobale")]
    pub global_margin: f64,
    #[serde(rename = "potentielRecurrent")]
    pub recurring_potential: f64,
    #[serde(rename = "valorisationPortefeuille")]
    pub portfolio_valuation: f64,
    #[serde(rename = "topCompagnies")]
    pub top_companies: Vec<GroupSummary>,
    #[serde(rename = "topProduits")]
    pub top_products: Vec<GroupSummary>,
    #[serde(rename = "evolutionData")]
    pub monthly: Vec<MonthlyBucket>,
    #[serde(rename = "funnelData")]
    pub funnel: Vec<FunnelStep>,
    #[serde(rename = "saisonData")]
    pub quarterly: Vec<QuarterBucket>,
    #[serde(rename = "projectionAnnuelle")]
    pub projected_annual_revenue: f64,
    #[serde(rename = "croissanceRevenue")]
    pub revenue_growth: f64,
    #[serde(rename = "performanceVsObjectif")]
    pub performance_vs_target: f64,
    #[serde(rename = "meilleurMois")]
    pub best_month: Option<MonthlyBucket>,
    #[serde(rename = "tendanceGenerale")]
    pub trend: Trend,
}

/// Group rollup together with its recurring potential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionRollup {
    #[serde(flatten)]
    pub group: GroupSummary,
    #[serde(rename = "potentielRecurrent")]
    pub recurring_potential: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionReport {
    #[serde(rename = "totalCommissionsAnnee1")]
    pub total_commission_year1: f64,
    #[serde(rename = "totalCommissionsRecurrentes")]
    pub total_commission_recurring: f64,
    #[serde(rename = "totalPrimesAnnuelles")]
    pub total_annual_premium: f64,
    #[serde(rename = "totalPrimesMensuelles")]
    pub total_monthly_premium: f64,
    #[serde(rename = "nombreContrats")]
    pub contract_count: usize,
    #[serde(rename = "revenuMoyenParContrat")]
    pub average_commission_per_contract: f64,
    #[serde(rename = "tauxCommissionMoyen")]
    pub average_commission_rate: f64,
    #[serde(rename = "potentielRecurrentTotal")]
    pub recurring_potential: f64,
    #[serde(rename = "topCommerciaux")]
    pub top_agents: Vec<CommissionRollup>,
    #[serde(rename = "topCompagnies")]
    pub top_companies: Vec<CommissionRollup>,
    #[serde(rename = "evolutionData")]
    pub monthly: Vec<MonthlyBucket>,
    #[serde(rename = "projectionAnnuelle")]
    pub projected_annual_commission: f64,
    #[serde(rename = "croissanceMensuelle")]
    pub commission_growth: f64,
    #[serde(rename = "ratioCommissionPrime")]
    pub commission_premium_ratio: f64,
    #[serde(rename = "valeurVieClient")]
    pub customer_lifetime_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPerformance {
    #[serde(rename = "commercial")]
    pub agent: String,
    #[serde(rename = "projets")]
    pub projects: usize,
    #[serde(rename = "contrats")]
    pub contracts: usize,
    #[serde(rename = "revenus")]
    pub revenue: f64,
    #[serde(rename = "tauxConversion")]
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetrics {
    #[serde(rename = "totalProjets")]
    pub total_projects: usize,
    #[serde(rename = "projetsSignes")]
    pub signed: usize,
    #[serde(rename = "tauxConversionGlobal")]
    pub conversion_rate: f64,
    #[serde(rename = "revenuTotal")]
    pub total_revenue: f64,
    #[serde(rename = "revenuMoyen")]
    pub average_revenue: f64,
    #[serde(rename = "dureeMoyenne")]
    pub average_conversion_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    #[serde(rename = "stageData")]
    pub stages: Vec<StageTally>,
    #[serde(rename = "funnelData")]
    pub funnel: Vec<FunnelStep>,
    #[serde(rename = "monthlyEvolution")]
    pub monthly: Vec<PipelineMonth>,
    #[serde(rename = "commercialPerformance")]
    pub agents: Vec<AgentPerformance>,
    pub metrics: PipelineMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypePerformance {
    #[serde(rename = "type")]
    pub campaign_type: String,
    pub sent: u64,
    pub delivered: u64,
    pub opens: u64,
    pub clicks: u64,
    #[serde(rename = "deliveryRate")]
    pub delivery_rate: f64,
    #[serde(rename = "openRate")]
    pub open_rate: f64,
    #[serde(rename = "clickRate")]
    pub click_rate: f64,
    #[serde(rename = "clickToOpenRate")]
    pub click_to_open_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub date: String,
    pub name: String,
    pub sent: u64,
    pub delivered: u64,
    pub opens: u64,
    pub clicks: u64,
    #[serde(rename = "openRate")]
    pub open_rate: f64,
    #[serde(rename = "clickRate")]
    pub click_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContactSegmentation {
    pub prospects: usize,
    pub clients: usize,
    #[serde(rename = "inactifs")]
    pub inactive: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BenchmarkComparison {
    #[serde(rename = "deliveryRate")]
    pub delivery: BenchmarkStatus,
    #[serde(rename = "openRate")]
    pub open: BenchmarkStatus,
    #[serde(rename = "clickRate")]
    pub click: BenchmarkStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailReport {
    #[serde(flatten)]
    pub totals: EmailTotals,
    #[serde(flatten)]
    pub rates: EmailRates,
    #[serde(rename = "performanceByType")]
    pub by_type: Vec<TypePerformance>,
    #[serde(rename = "timelineData")]
    pub timeline: Vec<TimelinePoint>,
    #[serde(rename = "contactSegmentation")]
    pub segmentation: ContactSegmentation,
    #[serde(rename = "healthScore")]
    pub health_score: u32,
    pub benchmarks: EmailBenchmarks,
    #[serde(rename = "benchmarkStatus")]
    pub benchmark_status: BenchmarkComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedFilters {
    #[serde(rename = "commercial")]
    pub agent: Option<String>,
    #[serde(rename = "campaignType")]
    pub campaign_type: Option<String>,
}

/// Every view of one filtered snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub period: Period,
    #[serde(rename = "generatedAt")]
    pub generated_at: NaiveDateTime,
    pub filters: AppliedFilters,
    pub revenue: RevenueReport,
    pub commissions: CommissionReport,
    pub pipeline: PipelineReport,
    pub email: EmailReport,
}

/// A filtered snapshot plus everything needed to key and bucket it.
pub struct Analysis<'a> {
    pub filtered: FilteredSnapshot<'a>,
    pub projects: ProjectIndex<'a>,
    pub dates: DateResolver,
    pub config: &'a AnalyticsConfig,
}

impl<'a> Analysis<'a> {
    pub fn prepare(
        snapshot: &'a Snapshot,
        params: &FilterParams,
        config: &'a AnalyticsConfig,
    ) -> Analysis<'a> {
        Analysis {
            filtered: filter_snapshot(snapshot, params, config),
            projects: ProjectIndex::build(&snapshot.projects),
            dates: DateResolver::new(params, config.missing_date_policy),
            config,
        }
    }

    fn keys(&self) -> KeyContext<'_, 'a> {
        KeyContext {
            projects: &self.projects,
            dates: self.dates,
        }
    }

    fn contracts(&self) -> impl Iterator<Item = &'a Contract> + '_ {
        self.filtered.contracts.iter().copied()
    }

    fn group(&self, by: GroupBy) -> Grouping {
        Grouping::by(self.contracts(), by, &self.keys())
    }

    fn monthly(&self) -> Vec<MonthlyBucket> {
        self.group(GroupBy::Month)
            .by_month()
            .into_iter()
            .map(MonthlyBucket::from)
            .collect()
    }

    fn with_potential(&self, groups: Vec<GroupSummary>) -> Vec<CommissionRollup> {
        groups
            .into_iter()
            .map(|group| CommissionRollup {
                recurring_potential: recurring_potential(group.commission_recurring, self.config),
                group,
            })
            .collect()
    }
}

pub fn generate_revenue_report(a: &Analysis<'_>) -> RevenueReport {
    let totals = Totals::of(a.contracts());
    let project_count = a.filtered.projects.len();

    let monthly = a.monthly();
    let series: Vec<f64> = monthly.iter().map(|m| m.revenue).collect();
    let projection = project(&series, a.config);
    let best_month = monthly
        .iter()
        .fold(None::<&MonthlyBucket>, |best, m| match best {
            Some(b) if b.revenue >= m.revenue => Some(b),
            _ => Some(m),
        })
        .cloned();

    let count_status = |status: ContactStatus| {
        a.filtered
            .contacts
            .iter()
            .filter(|c| c.classification() == status)
            .count()
    };
    let funnel = vec![
        FunnelStep::new("Prospects", count_status(ContactStatus::Prospect)),
        FunnelStep::new("Projets", project_count),
        FunnelStep::new("Contrats", totals.contracts),
        FunnelStep::new("Clients", count_status(ContactStatus::Client)),
    ];

    let potential = recurring_potential(totals.commission_recurring, a.config);
    let n = totals.contracts as f64;

    RevenueReport {
        total_premium: totals.premium,
        total_commission: totals.commission_year1,
        total_recurring_commission: totals.commission_recurring,
        contract_count: totals.contracts,
        project_count,
        average_premium_per_contract: safe_ratio(totals.premium, n),
        average_commission_per_contract: safe_ratio(totals.commission_year1, n),
        conversion_rate: conversion_rate(totals.contracts, project_count),
        average_monthly_premium: safe_ratio(totals.monthly_premium, n),
        global_margin: global_margin(totals.commission_year1, totals.premium),
        recurring_potential: potential,
        portfolio_valuation: portfolio_valuation(totals.premium, potential),
        top_companies: a.group(GroupBy::Company).ranked_by_premium(),
        top_products: a.group(GroupBy::Product).ranked_by_premium(),
        quarterly: a
            .group(GroupBy::Quarter)
            .by_quarter()
            .into_iter()
            .map(QuarterBucket::from)
            .collect(),
        monthly,
        funnel,
        projected_annual_revenue: projection.annualised,
        revenue_growth: projection.growth_pct,
        performance_vs_target: performance_vs_target(projection.trailing_average, a.config),
        best_month,
        trend: projection.trend,
    }
}

pub fn generate_commission_report(a: &Analysis<'_>) -> CommissionReport {
    let totals = Totals::of(a.contracts());
    let monthly = a.monthly();
    let series: Vec<f64> = monthly.iter().map(|m| m.commissions).collect();
    let projection = project(&series, a.config);

    CommissionReport {
        total_commission_year1: totals.commission_year1,
        total_commission_recurring: totals.commission_recurring,
        total_annual_premium: totals.premium,
        total_monthly_premium: totals.monthly_premium,
        contract_count: totals.contracts,
        average_commission_per_contract: safe_ratio(totals.commission_year1, totals.contracts as f64),
        average_commission_rate: percent(totals.commission_year1, totals.premium),
        recurring_potential: recurring_potential(totals.commission_recurring, a.config),
        top_agents: a.with_potential(a.group(GroupBy::Agent).ranked_by_commission()),
        top_companies: a.with_potential(a.group(GroupBy::Company).ranked_by_commission()),
        monthly,
        projected_annual_commission: projection.annualised,
        commission_growth: projection.growth_pct,
        commission_premium_ratio: safe_ratio(totals.commission_year1, totals.premium),
        customer_lifetime_value: customer_lifetime_value(
            totals.commission_year1,
            totals.commission_recurring,
            totals.contracts,
            a.config,
        ),
    }
}

pub fn generate_pipeline_report(a: &Analysis<'_>) -> PipelineReport {
    let projects = &a.filtered.projects;
    let contracts = &a.filtered.contracts;

    let stages = tally_stages(projects, contracts, &a.config.pipeline_stages);
    let funnel = stages
        .iter()
        .filter(|s| s.count > 0 && !s.lost)
        .map(|s| FunnelStep::new(&s.stage, s.count))
        .collect();

    let mut agents: Vec<AgentPerformance> = fold_agent_pipeline(projects, contracts)
        .into_iter()
        .map(|(agent, p)| AgentPerformance {
            conversion_rate: conversion_rate(p.contracts, p.projects),
            agent,
            projects: p.projects,
            contracts: p.contracts,
            revenue: p.revenue,
        })
        .collect();
    agents.sort_by(|x, y| y.revenue.partial_cmp(&x.revenue).unwrap_or(Ordering::Equal));

    let totals = Totals::of(a.contracts());
    PipelineReport {
        stages,
        funnel,
        monthly: pipeline_months(projects, contracts, &a.dates, a.config.pipeline_months),
        agents,
        metrics: PipelineMetrics {
            total_projects: projects.len(),
            signed: totals.contracts,
            conversion_rate: conversion_rate(totals.contracts, projects.len()),
            total_revenue: totals.premium,
            average_revenue: safe_ratio(totals.premium, totals.contracts as f64),
            average_conversion_days: average_conversion_days(projects, contracts),
        },
    }
}

fn type_performance(campaign_type: &str, campaigns: &[&EmailCampaign]) -> TypePerformance {
    let t = EmailTotals::of(
        campaigns
            .iter()
            .copied()
            .filter(|c| c.campaign_type == campaign_type),
    );
    let r = EmailRates::from_totals(&t);
    TypePerformance {
        campaign_type: campaign_type.to_string(),
        sent: t.sent,
        delivered: t.delivered,
        opens: t.opens,
        clicks: t.clicks,
        delivery_rate: r.delivery,
        open_rate: r.open,
        click_rate: r.click,
        click_to_open_rate: r.click_to_open,
    }
}

pub fn generate_email_report(a: &Analysis<'_>) -> EmailReport {
    let totals = EmailTotals::of(a.filtered.campaigns.iter().copied());
    let rates = EmailRates::from_totals(&totals);

    let by_type = CAMPAIGN_TYPES
        .iter()
        .map(|t| type_performance(t, &a.filtered.campaigns_all_types))
        .filter(|t| t.sent > 0)
        .collect();

    let mut dated: Vec<(NaiveDateTime, &EmailCampaign)> = a
        .filtered
        .campaigns
        .iter()
        .map(|c| (a.dates.bucket_date(c.effective_date()), *c))
        .collect();
    dated.sort_by_key(|(d, _)| *d);
    let timeline = dated
        .into_iter()
        .map(|(date, c)| TimelinePoint {
            date: date.format("%Y-%m-%d").to_string(),
            name: c.name.clone(),
            sent: c.sent,
            delivered: c.delivered,
            opens: c.opens,
            clicks: c.clicks,
            open_rate: percent(c.opens as f64, c.delivered as f64),
            click_rate: percent(c.clicks as f64, c.delivered as f64),
        })
        .collect();

    let segmentation = a.filtered.contacts.iter().fold(
        ContactSegmentation::default(),
        |mut s, c| {
            match c.classification() {
                ContactStatus::Prospect => s.prospects += 1,
                ContactStatus::Client => s.clients += 1,
                ContactStatus::Inactive => s.inactive += 1,
                ContactStatus::Other => {}
            }
            s.total += 1;
            s
        },
    );

    let bench = a.config.benchmarks;
    let bands = &a.config.benchmark_bands;
    EmailReport {
        totals,
        rates,
        by_type,
        timeline,
        segmentation,
        health_score: health_score(&rates, &a.config.health),
        benchmarks: bench,
        benchmark_status: BenchmarkComparison {
            delivery: BenchmarkStatus::grade(rates.delivery, bench.delivery_rate, bands),
            open: BenchmarkStatus::grade(rates.open, bench.open_rate, bands),
            click: BenchmarkStatus::grade(rates.click, bench.click_rate, bands),
        },
    }
}

/// Filter `snapshot` and assemble every view of it.
pub fn build_report(
    snapshot: &Snapshot,
    params: &FilterParams,
    config: &AnalyticsConfig,
) -> AnalyticsReport {
    let analysis = Analysis::prepare(snapshot, params, config);
    AnalyticsReport {
        period: params.period,
        generated_at: params.now,
        filters: AppliedFilters {
            agent: params.agent.clone(),
            campaign_type: params.campaign_type.clone(),
        },
        revenue: generate_revenue_report(&analysis),
        commissions: generate_commission_report(&analysis),
        pipeline: generate_pipeline_report(&analysis),
        email: generate_email_report(&analysis),
    }
}
