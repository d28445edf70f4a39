//! Window and dimension filtering of a [`Snapshot`].
//!
//! Filtering never copies or mutates records: the result borrows from the
//! snapshot and only the containers are new.

use crate::config::{AnalyticsConfig, MissingDatePolicy};
use crate::period::Period;
use crate::types::{Contact, Contract, EmailCampaign, Project, RecordId, Snapshot};
use chrono::NaiveDateTime;
use log::debug;
use std::collections::HashMap;

/// Selector value meaning "no filter on this dimension".
pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    pub period: Period,
    pub agent: Option<String>,
    pub campaign_type: Option<String>,
    /// Reference instant for the window and for undated records.
    pub now: NaiveDateTime,
}

impl FilterParams {
    pub fn new(period: Period, now: NaiveDateTime) -> Self {
        FilterParams {
            period,
            agent: None,
            campaign_type: None,
            now,
        }
    }

    pub fn with_agent(mut self, agent: Option<&str>) -> Self {
        self.agent = dimension(agent);
        self
    }

    pub fn with_campaign_type(mut self, campaign_type: Option<&str>) -> Self {
        self.campaign_type = dimension(campaign_type);
        self
    }
}

fn dimension(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != ALL)
        .map(str::to_string)
}

/// Resolves the date a record is filtered and bucketed on.
#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    pub cutoff: Option<NaiveDateTime>,
    pub now: NaiveDateTime,
    pub policy: MissingDatePolicy,
}

impl DateResolver {
    pub fn new(params: &FilterParams, policy: MissingDatePolicy) -> Self {
        DateResolver {
            cutoff: params.period.cutoff(params.now),
            now: params.now,
            policy,
        }
    }

    /// Whether a record dated `date` belongs to the window.
    pub fn admits(&self, date: Option<NaiveDateTime>) -> bool {
        let Some(cutoff) = self.cutoff else {
            return true;
        };
        match (date, self.policy) {
            (Some(d), _) => d >= cutoff,
            (None, MissingDatePolicy::TreatAsNow) => self.now >= cutoff,
            (None, MissingDatePolicy::Exclude) => false,
        }
    }

    /// Date used for month/quarter bucketing; undated records land on `now`.
    pub fn bucket_date(&self, date: Option<NaiveDateTime>) -> NaiveDateTime {
        date.unwrap_or(self.now)
    }
}

/// Projects of a snapshot indexed by the id contracts link through.
#[derive(Debug, Default)]
pub struct ProjectIndex<'a> {
    by_id: HashMap<&'a RecordId, &'a Project>,
}

impl<'a> ProjectIndex<'a> {
    pub fn build<I>(projects: I) -> Self
    where
        I: IntoIterator<Item = &'a Project>,
    {
        let mut by_id = HashMap::new();
        for p in projects {
            if let Some(id) = p.link_id() {
                // First record wins on duplicate ids.
                by_id.entry(id).or_insert(p);
            }
        }
        ProjectIndex { by_id }
    }

    pub fn parent(&self, contract: &Contract) -> Option<&'a Project> {
        contract
            .project_id
            .as_ref()
            .and_then(|id| self.by_id.get(id).copied())
    }

    /// Agent credited with a contract: the parent project's agent, else the
    /// agent recorded on the contract itself.
    pub fn agent_of(&self, contract: &'a Contract) -> Option<&'a str> {
        self.parent(contract)
            .and_then(|p| p.agent.as_deref())
            .or(contract.agent.as_deref())
    }
}

/// Subsets of a snapshot that survived filtering.
#[derive(Debug, Clone, Default)]
pub struct FilteredSnapshot<'a> {
    pub contacts: Vec<&'a Contact>,
    pub projects: Vec<&'a Project>,
    pub contracts: Vec<&'a Contract>,
    pub campaigns: Vec<&'a EmailCampaign>,
    /// Window-filtered campaigns before the campaign-type filter.
    pub campaigns_all_types: Vec<&'a EmailCampaign>,
}

pub fn filter_snapshot<'a>(
    snapshot: &'a Snapshot,
    params: &FilterParams,
    config: &AnalyticsConfig,
) -> FilteredSnapshot<'a> {
    let dates = DateResolver::new(params, config.missing_date_policy);
    let index = ProjectIndex::build(&snapshot.projects);
    let agent = params.agent.as_deref();

    let contacts: Vec<&Contact> = snapshot
        .contacts
        .iter()
        .filter(|c| dates.admits(c.effective_date()))
        .collect();

    let projects: Vec<&Project> = snapshot
        .projects
        .iter()
        .filter(|p| dates.admits(p.effective_date()))
        .filter(|p| agent.is_none() || p.agent.as_deref() == agent)
        .collect();

    let contracts: Vec<&Contract> = snapshot
        .contracts
        .iter()
        .filter(|c| dates.admits(c.effective_date()))
        .filter(|c| agent.is_none() || index.agent_of(*c) == agent)
        .collect();

    let campaigns_all_types: Vec<&EmailCampaign> = snapshot
        .campaigns
        .iter()
        .filter(|c| dates.admits(c.effective_date()))
        .collect();

    let campaign_type = params.campaign_type.as_deref();
    let campaigns: Vec<&EmailCampaign> = campaigns_all_types
        .iter()
        .copied()
        .filter(|c| campaign_type.is_none() || Some(c.campaign_type.as_str()) == campaign_type)
        .collect();

    debug!(
        "period {}: kept {}/{} contacts, {}/{} projects, {}/{} contracts, {}/{} campaigns",
        params.period,
        contacts.len(),
        snapshot.contacts.len(),
        projects.len(),
        snapshot.projects.len(),
        contracts.len(),
        snapshot.contracts.len(),
        campaigns.len(),
        snapshot.campaigns.len()
    );

    FilteredSnapshot {
        contacts,
        projects,
        contracts,
        campaigns,
        campaigns_all_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn contract(date: Option<&str>, project: Option<i64>) -> Contract {
        Contract {
            contract_date: date.map(str::to_string),
            project_id: project.map(RecordId::from),
            annual_premium: Some(100.0),
            ..Default::default()
        }
    }

    fn project(id: i64, agent: Option<&str>, date: Option<&str>) -> Project {
        Project {
            project_id: Some(RecordId::from(id)),
            agent: agent.map(str::to_string),
            creation_date: date.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn window_keeps_records_on_or_after_cutoff() {
        let snapshot = Snapshot {
            contracts: vec![
                contract(Some("2024-09-15T12:00:00"), None),
                contract(Some("2024-09-15T11:59:59"), None),
                contract(Some("2024-10-01"), None),
            ],
            ..Default::default()
        };
        let params = FilterParams::new(Period::from_code("1m"), now());
        let f = filter_snapshot(&snapshot, &params, &AnalyticsConfig::default());
        assert_eq!(f.contracts.len(), 2);
    }

    #[test]
    fn undated_records_pass_by_default() {
        let snapshot = Snapshot {
            contracts: vec![contract(None, None), contract(Some("garbage"), None)],
            ..Default::default()
        };
        let params = FilterParams::new(Period::from_code("1m"), now());
        let f = filter_snapshot(&snapshot, &params, &AnalyticsConfig::default());
        assert_eq!(f.contracts.len(), 2);
    }

    #[test]
    fn exclude_policy_drops_undated_records_only_when_windowed() {
        let snapshot = Snapshot {
            contracts: vec![contract(None, None), contract(Some("2024-10-01"), None)],
            ..Default::default()
        };
        let config = AnalyticsConfig {
            missing_date_policy: MissingDatePolicy::Exclude,
            ..Default::default()
        };
        let windowed = FilterParams::new(Period::from_code("1m"), now());
        assert_eq!(filter_snapshot(&snapshot, &windowed, &config).contracts.len(), 1);
        let unbounded = FilterParams::new(Period::All, now());
        assert_eq!(filter_snapshot(&snapshot, &unbounded, &config).contracts.len(), 2);
    }

    #[test]
    fn unknown_period_is_pass_through() {
        let snapshot = Snapshot {
            contracts: vec![contract(Some("1999-01-01"), None)],
            ..Default::default()
        };
        let params = FilterParams::new(Period::from_code("forever"), now());
        let f = filter_snapshot(&snapshot, &params, &AnalyticsConfig::default());
        assert_eq!(f.contracts.len(), 1);
    }

    #[test]
    fn agent_filter_uses_parent_project_then_contract() {
        let mut orphan = contract(Some("2024-10-01"), Some(99));
        orphan.agent = Some("Alice".into());
        let snapshot = Snapshot {
            projects: vec![
                project(1, Some("Alice"), Some("2024-10-01")),
                project(2, Some("Bob"), Some("2024-10-01")),
            ],
            contracts: vec![
                contract(Some("2024-10-02"), Some(1)),
                contract(Some("2024-10-02"), Some(2)),
                orphan,
            ],
            ..Default::default()
        };
        let params = FilterParams::new(Period::All, now()).with_agent(Some("Alice"));
        let f = filter_snapshot(&snapshot, &params, &AnalyticsConfig::default());
        assert_eq!(f.projects.len(), 1);
        assert_eq!(f.contracts.len(), 2);
    }

    #[test]
    fn all_selector_disables_dimension_filters() {
        let params = FilterParams::new(Period::All, now())
            .with_agent(Some("all"))
            .with_campaign_type(Some(" "));
        assert_eq!(params.agent, None);
        assert_eq!(params.campaign_type, None);
    }

    #[test]
    fn campaign_type_filter_keeps_unfiltered_view() {
        let campaign = |kind: &str| EmailCampaign {
            campaign_type: kind.to_string(),
            sent_date: Some("2024-10-10".into()),
            ..Default::default()
        };
        let snapshot = Snapshot {
            campaigns: vec![campaign("newsletter"), campaign("promotional")],
            ..Default::default()
        };
        let params =
            FilterParams::new(Period::from_code("1m"), now()).with_campaign_type(Some("newsletter"));
        let f = filter_snapshot(&snapshot, &params, &AnalyticsConfig::default());
        assert_eq!(f.campaigns.len(), 1);
        assert_eq!(f.campaigns_all_types.len(), 2);
    }

    #[test]
    fn filtering_leaves_the_snapshot_untouched() {
        let snapshot = Snapshot {
            contracts: vec![contract(Some("1999-01-01"), None)],
            ..Default::default()
        };
        let params = FilterParams::new(Period::from_code("1m"), now());
        let f = filter_snapshot(&snapshot, &params, &AnalyticsConfig::default());
        assert!(f.contracts.is_empty());
        assert_eq!(snapshot.contracts.len(), 1);
    }
}
