//! Business constants behind the analytics, named and overridable.
//!
//! Every figure here used to be an inline literal on the dashboards. The
//! defaults reproduce those literals exactly; a TOML file can override any
//! subset of them.

use crate::error::{ReportError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a record whose relevant timestamps are all missing or
/// unparsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDatePolicy {
    /// Date the record "now": it passes every window filter.
    #[default]
    TreatAsNow,
    /// Drop the record whenever a window filter applies.
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierDirection {
    /// Higher values are better: a tier matches when `value >= threshold`.
    AtLeast,
    /// Lower values are better: a tier matches when `value <= threshold`.
    AtMost,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub threshold: f64,
    pub points: u32,
}

/// Ordered tiers; the first matching tier awards its points, none → 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    pub direction: TierDirection,
    pub tiers: Vec<Tier>,
}

impl TierTable {
    fn new(direction: TierDirection, tiers: &[(f64, u32)]) -> Self {
        TierTable {
            direction,
            tiers: tiers
                .iter()
                .map(|&(threshold, points)| Tier { threshold, points })
                .collect(),
        }
    }

    pub fn points_for(&self, value: f64) -> u32 {
        if !value.is_finite() {
            return 0;
        }
        self.tiers
            .iter()
            .find(|t| match self.direction {
                TierDirection::AtLeast => value >= t.threshold,
                TierDirection::AtMost => value <= t.threshold,
            })
            .map(|t| t.points)
            .unwrap_or(0)
    }
}

/// Email deliverability health score tiers (rates in percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub delivery: TierTable,
    pub open: TierTable,
    pub click: TierTable,
    pub bounce: TierTable,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        HealthThresholds {
            delivery: TierTable::new(TierDirection::AtLeast, &[(95.0, 25), (90.0, 20), (85.0, 15)]),
            open: TierTable::new(TierDirection::AtLeast, &[(25.0, 25), (20.0, 20), (15.0, 15)]),
            click: TierTable::new(TierDirection::AtLeast, &[(3.0, 25), (2.0, 20), (1.0, 15)]),
            bounce: TierTable::new(TierDirection::AtMost, &[(2.0, 25), (5.0, 20), (10.0, 15)]),
        }
    }
}

/// Insurance-industry reference rates, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailBenchmarks {
    #[serde(rename = "openRate", alias = "open_rate")]
    pub open_rate: f64,
    #[serde(rename = "clickRate", alias = "click_rate")]
    pub click_rate: f64,
    #[serde(rename = "deliveryRate", alias = "delivery_rate")]
    pub delivery_rate: f64,
    #[serde(rename = "bounceRate", alias = "bounce_rate")]
    pub bounce_rate: f64,
    #[serde(rename = "unsubscribeRate", alias = "unsubscribe_rate")]
    pub unsubscribe_rate: f64,
}

impl Default for EmailBenchmarks {
    fn default() -> Self {
        EmailBenchmarks {
            open_rate: 22.5,
            click_rate: 2.8,
            delivery_rate: 96.2,
            bounce_rate: 3.1,
            unsubscribe_rate: 0.8,
        }
    }
}

/// Multipliers of the benchmark that separate `excellent`, `good` and
/// `needs_improvement`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkBands {
    pub excellent: f64,
    pub good: f64,
}

impl Default for BenchmarkBands {
    fn default() -> Self {
        BenchmarkBands {
            excellent: 1.1,
            good: 0.9,
        }
    }
}

/// One stage of the sales pipeline and the project statuses that map to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub stage: String,
    pub statuses: Vec<String>,
    #[serde(default)]
    pub lost: bool,
}

impl StageDefinition {
    fn new(stage: &str, statuses: &[&str], lost: bool) -> Self {
        StageDefinition {
            stage: stage.to_string(),
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            lost,
        }
    }

    /// Case-insensitive substring match of any stage label in `status`.
    pub fn matches(&self, status: Option<&str>) -> bool {
        let Some(status) = status else {
            return false;
        };
        let status = status.to_lowercase();
        self.statuses
            .iter()
            .any(|label| status.contains(&label.to_lowercase()))
    }
}

pub static DEFAULT_PIPELINE_STAGES: Lazy<Vec<StageDefinition>> = Lazy::new(|| {
    vec![
        StageDefinition::new("Nouveau", &["Nouveau", "Contact initial"], false),
        StageDefinition::new("Qualification", &["Qualification", "Analyse"], false),
        StageDefinition::new("Proposition", &["Devis envoyé", "Proposition"], false),
        StageDefinition::new("Négociation", &["Négociation", "En cours"], false),
        StageDefinition::new("Closing", &["Signature", "Finalisation"], false),
        StageDefinition::new("Gagné", &["Terminé", "Signé", "Actif"], false),
        StageDefinition::new("Perdu", &["Perdu", "Annulé", "Refusé"], true),
    ]
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Flat multiplier turning yearly recurring commission into a "potential".
    /// A business convention, not a discounted valuation.
    pub recurring_years_multiplier: f64,
    /// Number of trailing monthly buckets behind projections and growth.
    pub projection_window_months: usize,
    /// Growth (in percent) at or beyond which the trend is no longer stable.
    pub trend_threshold_pct: f64,
    /// Lower bound applied to the growth-rate denominator.
    pub growth_denominator_floor: f64,
    pub monthly_revenue_target: f64,
    pub missing_date_policy: MissingDatePolicy,
    /// Calendar months covered by the pipeline evolution series.
    pub pipeline_months: u32,
    pub health: HealthThresholds,
    pub benchmarks: EmailBenchmarks,
    pub benchmark_bands: BenchmarkBands,
    pub pipeline_stages: Vec<StageDefinition>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            recurring_years_multiplier: 10.0,
            projection_window_months: 3,
            trend_threshold_pct: 5.0,
            growth_denominator_floor: 1.0,
            monthly_revenue_target: 50_000.0,
            missing_date_policy: MissingDatePolicy::default(),
            pipeline_months: 12,
            health: HealthThresholds::default(),
            benchmarks: EmailBenchmarks::default(),
            benchmark_bands: BenchmarkBands::default(),
            pipeline_stages: DEFAULT_PIPELINE_STAGES.clone(),
        }
    }
}

pub fn parse_config(text: &str) -> std::result::Result<AnalyticsConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Read an [`AnalyticsConfig`] from a TOML file; omitted keys keep defaults.
pub fn load_config(path: &Path) -> Result<AnalyticsConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    parse_config(&text).map_err(|source| ReportError::Config {
        path: path.to_path_buf(),
        source,
    })
}
