//! Ratios and derived figures computed from aggregated sums.
//!
//! Every function here is total: divisions are guarded and results are
//! always finite.

use crate::config::{AnalyticsConfig, BenchmarkBands, HealthThresholds};
use crate::types::EmailCampaign;
use crate::util::{average, percent, safe_ratio};
use serde::Serialize;

/// Contracts signed per project opened, in percent. Not capped: a window
/// can hold more contracts than projects.
pub fn conversion_rate(contracts: usize, projects: usize) -> f64 {
    percent(contracts as f64, projects as f64)
}

/// Year-1 commission as a percentage of premium.
pub fn global_margin(commission_year1: f64, premium: f64) -> f64 {
    percent(commission_year1, premium)
}

/// Recurring commission times a flat number of years. This is the
/// brokerage's rule of thumb, not a discounted present value.
pub fn recurring_potential(commission_recurring: f64, config: &AnalyticsConfig) -> f64 {
    finite(commission_recurring * config.recurring_years_multiplier)
}

pub fn portfolio_valuation(premium: f64, recurring_potential: f64) -> f64 {
    finite(premium + recurring_potential)
}

/// Average year-1 commission plus the per-contract recurring potential.
pub fn customer_lifetime_value(
    commission_year1: f64,
    commission_recurring: f64,
    contracts: usize,
    config: &AnalyticsConfig,
) -> f64 {
    let n = contracts as f64;
    finite(
        safe_ratio(commission_year1, n)
            + safe_ratio(commission_recurring, n) * config.recurring_years_multiplier,
    )
}

fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Positive,
    Stable,
    Negative,
}

impl Trend {
    pub fn from_growth(growth_pct: f64, threshold_pct: f64) -> Trend {
        if growth_pct >= threshold_pct {
            Trend::Positive
        } else if growth_pct <= -threshold_pct {
            Trend::Negative
        } else {
            Trend::Stable
        }
    }
}

/// Forward-looking figures derived from the tail of a monthly series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Mean of the trailing buckets (up to the configured window).
    pub trailing_average: f64,
    /// `trailing_average * 12`.
    pub annualised: f64,
    /// `(last - first) / max(first, floor) * 100` over the trailing buckets.
    /// The floor biases small bases towards lower growth; kept for
    /// continuity with historical figures.
    pub growth_pct: f64,
    pub trend: Trend,
}

/// Project a chronologically ordered series of monthly values.
pub fn project(monthly: &[f64], config: &AnalyticsConfig) -> Projection {
    let window = config.projection_window_months.max(1);
    let tail = &monthly[monthly.len().saturating_sub(window)..];
    let trailing_average = average(tail);
    let growth_pct = match (tail.first(), tail.last()) {
        (Some(first), Some(last)) => finite(
            (last - first) / first.max(config.growth_denominator_floor) * 100.0,
        ),
        _ => 0.0,
    };
    Projection {
        trailing_average,
        annualised: finite(trailing_average * 12.0),
        growth_pct,
        trend: Trend::from_growth(growth_pct, config.trend_threshold_pct),
    }
}

/// Trailing monthly average against the monthly target, in percent.
pub fn performance_vs_target(trailing_average: f64, config: &AnalyticsConfig) -> f64 {
    if trailing_average <= 0.0 {
        return 0.0;
    }
    percent(trailing_average, config.monthly_revenue_target)
}

// ── Email campaigns ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmailTotals {
    #[serde(rename = "totalSent")]
    pub sent: u64,
    #[serde(rename = "totalDelivered")]
    pub delivered: u64,
    #[serde(rename = "totalOpens")]
    pub opens: u64,
    #[serde(rename = "totalClicks")]
    pub clicks: u64,
    #[serde(rename = "totalUnsubscribes")]
    pub unsubscribes: u64,
    #[serde(rename = "totalBounces")]
    pub bounces: u64,
    #[serde(rename = "totalComplaints")]
    pub complaints: u64,
}

impl EmailTotals {
    pub fn of<'a, I>(campaigns: I) -> EmailTotals
    where
        I: IntoIterator<Item = &'a EmailCampaign>,
    {
        campaigns.into_iter().fold(EmailTotals::default(), |t, c| EmailTotals {
            sent: t.sent.saturating_add(c.sent),
            delivered: t.delivered.saturating_add(c.delivered),
            opens: t.opens.saturating_add(c.opens),
            clicks: t.clicks.saturating_add(c.clicks),
            unsubscribes: t.unsubscribes.saturating_add(c.unsubscribes),
            bounces: t.bounces.saturating_add(c.bounces),
            complaints: t.complaints.saturating_add(c.complaints),
        })
    }
}

/// Deliverability and engagement rates, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EmailRates {
    #[serde(rename = "deliveryRate")]
    pub delivery: f64,
    #[serde(rename = "openRate")]
    pub open: f64,
    #[serde(rename = "clickRate")]
    pub click: f64,
    #[serde(rename = "clickToOpenRate")]
    pub click_to_open: f64,
    #[serde(rename = "unsubscribeRate")]
    pub unsubscribe: f64,
    #[serde(rename = "bounceRate")]
    pub bounce: f64,
    #[serde(rename = "complaintRate")]
    pub complaint: f64,
}

impl EmailRates {
    pub fn from_totals(t: &EmailTotals) -> EmailRates {
        let sent = t.sent as f64;
        let delivered = t.delivered as f64;
        EmailRates {
            delivery: percent(delivered, sent),
            open: percent(t.opens as f64, delivered),
            click: percent(t.clicks as f64, delivered),
            click_to_open: percent(t.clicks as f64, t.opens as f64),
            unsubscribe: percent(t.unsubscribes as f64, delivered),
            bounce: percent(t.bounces as f64, sent),
            complaint: percent(t.complaints as f64, delivered),
        }
    }
}

/// Sum of the four tier awards, clamped to `0..=100`.
pub fn health_score(rates: &EmailRates, thresholds: &HealthThresholds) -> u32 {
    let score = thresholds.delivery.points_for(rates.delivery)
        + thresholds.open.points_for(rates.open)
        + thresholds.click.points_for(rates.click)
        + thresholds.bounce.points_for(rates.bounce);
    score.min(100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkStatus {
    Excellent,
    Good,
    NeedsImprovement,
}

impl BenchmarkStatus {
    /// Grade a higher-is-better rate against its benchmark.
    pub fn grade(actual: f64, benchmark: f64, bands: &BenchmarkBands) -> BenchmarkStatus {
        if actual >= benchmark * bands.excellent {
            BenchmarkStatus::Excellent
        } else if actual >= benchmark * bands.good {
            BenchmarkStatus::Good
        } else {
            BenchmarkStatus::NeedsImprovement
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AnalyticsConfig {
        AnalyticsConfig::default()
    }

    #[test]
    fn ratios_are_zero_without_denominator() {
        assert_eq!(conversion_rate(3, 0), 0.0);
        assert_eq!(global_margin(120.0, 0.0), 0.0);
        assert_eq!(conversion_rate(1, 1), 100.0);
        assert_eq!(conversion_rate(3, 2), 150.0);
        assert_eq!(global_margin(120.0, 1200.0), 10.0);
    }

    #[test]
    fn recurring_potential_uses_flat_multiplier() {
        assert_eq!(recurring_potential(50.0, &cfg()), 500.0);
        let five_years = AnalyticsConfig {
            recurring_years_multiplier: 5.0,
            ..cfg()
        };
        assert_eq!(recurring_potential(50.0, &five_years), 250.0);
        assert_eq!(portfolio_valuation(1000.0, 500.0), 1500.0);
    }

    #[test]
    fn lifetime_value() {
        assert_eq!(customer_lifetime_value(200.0, 20.0, 2, &cfg()), 200.0);
        assert_eq!(customer_lifetime_value(200.0, 20.0, 0, &cfg()), 0.0);
    }

    #[test]
    fn projection_over_last_three_buckets() {
        let p = project(&[10.0, 1000.0, 2000.0, 3000.0], &cfg());
        assert_eq!(p.trailing_average, 2000.0);
        assert_eq!(p.annualised, 24000.0);
        assert_eq!(p.growth_pct, 200.0);
        assert_eq!(p.trend, Trend::Positive);
    }

    #[test]
    fn projection_with_short_or_empty_series() {
        let two = project(&[100.0, 50.0], &cfg());
        assert_eq!(two.trailing_average, 75.0);
        assert_eq!(two.growth_pct, -50.0);
        assert_eq!(two.trend, Trend::Negative);

        let one = project(&[400.0], &cfg());
        assert_eq!(one.annualised, 4800.0);
        assert_eq!(one.growth_pct, 0.0);
        assert_eq!(one.trend, Trend::Stable);

        let none = project(&[], &cfg());
        assert_eq!((none.annualised, none.growth_pct), (0.0, 0.0));
    }

    #[test]
    fn growth_denominator_is_floored_at_one() {
        let p = project(&[0.0, 0.5, 3.0], &cfg());
        assert_eq!(p.growth_pct, 300.0);
        let q = project(&[0.5, 2.0], &cfg());
        assert_eq!(q.growth_pct, 150.0);
    }

    #[test]
    fn trend_thresholds_are_inclusive() {
        assert_eq!(Trend::from_growth(5.0, 5.0), Trend::Positive);
        assert_eq!(Trend::from_growth(4.99, 5.0), Trend::Stable);
        assert_eq!(Trend::from_growth(-5.0, 5.0), Trend::Negative);
        assert_eq!(Trend::from_growth(-4.99, 5.0), Trend::Stable);
    }

    #[test]
    fn performance_against_monthly_target() {
        assert_eq!(performance_vs_target(25_000.0, &cfg()), 50.0);
        assert_eq!(performance_vs_target(0.0, &cfg()), 0.0);
    }

    #[test]
    fn health_score_from_tier_table() {
        let rates = EmailRates {
            delivery: 96.0,
            open: 18.0,
            click: 1.5,
            bounce: 4.0,
            ..Default::default()
        };
        assert_eq!(health_score(&rates, &HealthThresholds::default()), 75);

        let perfect = EmailRates {
            delivery: 100.0,
            open: 60.0,
            click: 10.0,
            bounce: 0.0,
            ..Default::default()
        };
        assert_eq!(health_score(&perfect, &HealthThresholds::default()), 100);
    }

    #[test]
    fn health_score_of_no_traffic() {
        let rates = EmailRates::from_totals(&EmailTotals::default());
        // A zero bounce rate still earns the bounce tier.
        assert_eq!(health_score(&rates, &HealthThresholds::default()), 25);
    }

    #[test]
    fn email_rates_use_the_right_denominators() {
        let totals = EmailTotals {
            sent: 200,
            delivered: 100,
            opens: 50,
            clicks: 10,
            unsubscribes: 1,
            bounces: 4,
            complaints: 2,
        };
        let r = EmailRates::from_totals(&totals);
        assert_eq!(r.delivery, 50.0);
        assert_eq!(r.open, 50.0);
        assert_eq!(r.click, 10.0);
        assert_eq!(r.click_to_open, 20.0);
        assert_eq!(r.unsubscribe, 1.0);
        assert_eq!(r.bounce, 2.0);
        assert_eq!(r.complaint, 2.0);
    }

    #[test]
    fn benchmark_grading() {
        let bands = BenchmarkBands::default();
        assert_eq!(BenchmarkStatus::grade(25.0, 22.5, &bands), BenchmarkStatus::Excellent);
        assert_eq!(BenchmarkStatus::grade(21.0, 22.5, &bands), BenchmarkStatus::Good);
        assert_eq!(BenchmarkStatus::grade(10.0, 22.5, &bands), BenchmarkStatus::NeedsImprovement);
    }
}
