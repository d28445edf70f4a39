//! Property and scenario tests over the public analytics API.
//!
//! Invariants checked here:
//! - Totals and per-group sums do not depend on record order, bit for bit
//! - Wider windows never hold fewer contacts, projects or contracts
//! - Health score stays within 0..=100
//! - Every derived ratio is finite and conversion is never negative

use brokerage_report::aggregate::UNSPECIFIED;
use brokerage_report::config::HealthThresholds;
use brokerage_report::metrics::{health_score, EmailRates, EmailTotals};
use brokerage_report::{
    build_report, filter_snapshot, AnalyticsConfig, Contact, Contract, EmailCampaign,
    FilterParams, Period, Project, RecordId, Snapshot,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;

const COMPANIES: [&str; 3] = ["AXA", "Allianz", "Generali"];

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 10, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn dated(days_ago: i64) -> String {
    (now() - Duration::days(days_ago))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// A date up to two years back, or none at all.
fn maybe_dated() -> impl Strategy<Value = Option<String>> {
    prop::option::of((0i64..700).prop_map(dated))
}

fn contract_strategy() -> impl Strategy<Value = Contract> {
    (
        0.0f64..50_000.0,
        0.0f64..5_000.0,
        0.0f64..500.0,
        0usize..4,
        maybe_dated(),
    )
        .prop_map(|(premium, year1, recurring, company, date)| Contract {
            company: COMPANIES.get(company).map(|c| c.to_string()),
            annual_premium: Some(premium),
            commission_year1: Some(year1),
            commission_recurring: Some(recurring),
            contract_date: date,
            ..Default::default()
        })
}

fn project_strategy() -> impl Strategy<Value = Project> {
    (0i64..20, maybe_dated()).prop_map(|(id, date)| Project {
        project_id: Some(RecordId::from(id)),
        creation_date: date,
        ..Default::default()
    })
}

fn contact_strategy() -> impl Strategy<Value = Contact> {
    (prop::sample::select(vec!["Prospect", "Client", "Inactif"]), maybe_dated()).prop_map(
        |(status, date)| Contact {
            status: Some(status.to_string()),
            creation_date: date,
            ..Default::default()
        },
    )
}

fn company_sums(report: &brokerage_report::RevenueReport) -> BTreeMap<String, (usize, u64)> {
    report
        .top_companies
        .iter()
        .map(|g| (g.key.clone(), (g.contracts, g.premium.to_bits())))
        .collect()
}

proptest! {
    #[test]
    fn prop_totals_ignore_record_order(
        contracts in prop::collection::vec(contract_strategy(), 0..40)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let (forward, shuffled) = contracts;
        let cfg = AnalyticsConfig::default();
        let params = FilterParams::new(Period::All, now());
        let a = build_report(&Snapshot { contracts: forward, ..Default::default() }, &params, &cfg);
        let b = build_report(&Snapshot { contracts: shuffled, ..Default::default() }, &params, &cfg);

        prop_assert_eq!(a.revenue.total_premium.to_bits(), b.revenue.total_premium.to_bits());
        prop_assert_eq!(a.revenue.total_commission.to_bits(), b.revenue.total_commission.to_bits());
        prop_assert_eq!(
            a.commissions.total_commission_recurring.to_bits(),
            b.commissions.total_commission_recurring.to_bits()
        );
        prop_assert_eq!(company_sums(&a.revenue), company_sums(&b.revenue));
        prop_assert_eq!(&a.revenue.monthly, &b.revenue.monthly);
    }

    #[test]
    fn prop_wider_windows_hold_more_records(
        contacts in prop::collection::vec(contact_strategy(), 0..20),
        projects in prop::collection::vec(project_strategy(), 0..20),
        contracts in prop::collection::vec(contract_strategy(), 0..40)
    ) {
        let snapshot = Snapshot { contacts, projects, contracts, ..Default::default() };
        let cfg = AnalyticsConfig::default();
        let counts: Vec<[usize; 6]> = ["1m", "3m", "6m", "1y", "all"]
            .iter()
            .map(|code| {
                let params = FilterParams::new(Period::from_code(code), now());
                let filtered = filter_snapshot(&snapshot, &params, &cfg);
                let report = build_report(&snapshot, &params, &cfg);
                [
                    filtered.contacts.len(),
                    filtered.projects.len(),
                    filtered.contracts.len(),
                    report.revenue.project_count,
                    report.pipeline.metrics.total_projects,
                    report.email.segmentation.total,
                ]
            })
            .collect();
        for w in counts.windows(2) {
            prop_assert!(
                w[0].iter().zip(w[1].iter()).all(|(narrow, wide)| narrow <= wide),
                "counts {:?}",
                counts
            );
        }
        prop_assert_eq!(
            &counts[4][..3],
            &[snapshot.contacts.len(), snapshot.projects.len(), snapshot.contracts.len()][..]
        );
    }

    #[test]
    fn prop_health_score_is_bounded(
        sent in 0u64..1_000_000,
        delivered in 0u64..1_000_000,
        opens in 0u64..1_000_000,
        clicks in 0u64..1_000_000,
        bounces in 0u64..1_000_000
    ) {
        let totals = EmailTotals { sent, delivered, opens, clicks, bounces, ..Default::default() };
        let rates = EmailRates::from_totals(&totals);
        prop_assert!(health_score(&rates, &HealthThresholds::default()) <= 100);
    }

    #[test]
    fn prop_derived_figures_are_finite(
        contracts in prop::collection::vec(contract_strategy(), 0..20),
        project_count in 0i64..10,
        sent in 0u64..10_000,
        delivered in 0u64..10_000
    ) {
        let projects = (0..project_count)
            .map(|i| Project {
                project_id: Some(RecordId::from(i)),
                creation_date: Some(dated(i)),
                ..Default::default()
            })
            .collect();
        let snapshot = Snapshot {
            projects,
            contracts,
            campaigns: vec![EmailCampaign {
                sent,
                delivered,
                sent_date: Some(dated(1)),
                ..Default::default()
            }],
            ..Default::default()
        };
        let report = build_report(&snapshot, &FilterParams::new(Period::All, now()), &AnalyticsConfig::default());
        let r = &report.revenue;
        for v in [
            r.conversion_rate,
            r.global_margin,
            r.average_premium_per_contract,
            r.projected_annual_revenue,
            r.revenue_growth,
            r.performance_vs_target,
            report.commissions.customer_lifetime_value,
            report.pipeline.metrics.average_conversion_days,
            report.email.rates.delivery,
            report.email.rates.open,
            report.email.rates.click_to_open,
        ] {
            prop_assert!(v.is_finite());
        }
        prop_assert!(r.conversion_rate >= 0.0);
    }
}

#[test]
fn empty_snapshot_reports_zeros() {
    let report = build_report(
        &Snapshot::default(),
        &FilterParams::new(Period::default(), now()),
        &AnalyticsConfig::default(),
    );
    assert_eq!(report.revenue.total_premium, 0.0);
    assert_eq!(report.revenue.total_commission, 0.0);
    assert_eq!(report.revenue.conversion_rate, 0.0);
    assert_eq!(report.revenue.global_margin, 0.0);
}

#[test]
fn single_linked_contract() {
    let snapshot = Snapshot {
        projects: vec![Project {
            project_id: Some(RecordId::from(7)),
            creation_date: Some(dated(10)),
            ..Default::default()
        }],
        contracts: vec![Contract {
            project_id: Some(RecordId::from(7)),
            annual_premium: Some(1200.0),
            commission_year1: Some(120.0),
            contract_date: Some(dated(2)),
            ..Default::default()
        }],
        ..Default::default()
    };
    let report = build_report(
        &snapshot,
        &FilterParams::new(Period::default(), now()),
        &AnalyticsConfig::default(),
    );
    let r = &report.revenue;
    assert_eq!(r.total_premium, 1200.0);
    assert_eq!(r.total_commission, 120.0);
    assert_eq!(r.global_margin, 10.0);
    assert_eq!(r.contract_count, 1);
    assert_eq!(r.conversion_rate, 100.0);
    assert_eq!(report.pipeline.metrics.average_conversion_days, 8.0);
}

#[test]
fn health_score_from_campaign_counts() {
    let snapshot = Snapshot {
        campaigns: vec![EmailCampaign {
            name: "Relance automne".into(),
            campaign_type: "follow-up".into(),
            sent: 2500,
            delivered: 2400,
            opens: 432,
            clicks: 36,
            bounces: 100,
            sent_date: Some(dated(3)),
            ..Default::default()
        }],
        ..Default::default()
    };
    let report = build_report(
        &snapshot,
        &FilterParams::new(Period::from_code("30d"), now()),
        &AnalyticsConfig::default(),
    );
    assert_eq!(report.email.health_score, 75);
    assert_eq!(report.email.by_type.len(), 1);
}

#[test]
fn unspecified_company_and_product_still_count() {
    let snapshot = Snapshot {
        contracts: vec![
            Contract {
                annual_premium: Some(300.0),
                contract_date: Some(dated(5)),
                ..Default::default()
            },
            Contract {
                company: Some("AXA".into()),
                product: Some("Santé".into()),
                annual_premium: Some(700.0),
                contract_date: Some(dated(5)),
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let report = build_report(
        &snapshot,
        &FilterParams::new(Period::from_code("1m"), now()),
        &AnalyticsConfig::default(),
    );
    let r = &report.revenue;
    assert_eq!(r.total_premium, 1000.0);
    let keys: Vec<&str> = r.top_companies.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["AXA", UNSPECIFIED]);
    assert!(r.top_products.iter().any(|g| g.key == UNSPECIFIED && g.premium == 300.0));
}

#[test]
fn tenths_sum_to_the_same_total_in_either_order() {
    let contracts: Vec<Contract> = [0.1, 0.2, 0.3]
        .into_iter()
        .map(|premium| Contract {
            company: Some("AXA".into()),
            annual_premium: Some(premium),
            commission_recurring: Some(premium),
            contract_date: Some(dated(3)),
            ..Default::default()
        })
        .collect();
    let mut reversed = contracts.clone();
    reversed.reverse();
    let params = FilterParams::new(Period::All, now());
    let cfg = AnalyticsConfig::default();
    let a = build_report(&Snapshot { contracts, ..Default::default() }, &params, &cfg);
    let b = build_report(&Snapshot { contracts: reversed, ..Default::default() }, &params, &cfg);

    assert_eq!(a.revenue.total_premium.to_bits(), b.revenue.total_premium.to_bits());
    assert_eq!(
        a.revenue.top_companies[0].premium.to_bits(),
        b.revenue.top_companies[0].premium.to_bits()
    );
    assert_eq!(a.revenue.top_companies[0].premium, a.revenue.total_premium);
    assert_eq!(a.pipeline.metrics.total_revenue, b.pipeline.metrics.total_revenue);
    assert_eq!(
        a.commissions.recurring_potential.to_bits(),
        b.commissions.recurring_potential.to_bits()
    );
}
