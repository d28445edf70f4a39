//! Reading snapshots from disk: one JSON document or one CSV file per
//! collection.

use crate::error::{ReportError, Result};
use crate::types::{Contact, Contract, EmailCampaign, Project, Snapshot};
use csv::{ReaderBuilder, Trim};
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
}

impl LoadReport {
    fn merge(self, other: LoadReport) -> LoadReport {
        LoadReport {
            total_rows: self.total_rows + other.total_rows,
            loaded_rows: self.loaded_rows + other.loaded_rows,
            parse_errors: self.parse_errors + other.parse_errors,
        }
    }
}

/// Deserialize every row of a headed CSV file. Rows that fail to parse are
/// counted and skipped rather than failing the whole file.
pub fn load_csv<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| ReportError::csv(path, e))?;

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize::<T>().enumerate() {
        report.total_rows += 1;
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                report.parse_errors += 1;
                warn!("{}: skipping row {}: {}", path.display(), line + 2, e);
            }
        }
    }
    report.loaded_rows = rows.len();
    info!(
        "{}: loaded {} of {} rows",
        path.display(),
        report.loaded_rows,
        report.total_rows
    );
    Ok((rows, report))
}

pub fn parse_snapshot_json(text: &str) -> serde_json::Result<Snapshot> {
    serde_json::from_str(text)
}

/// Load a snapshot stored as one JSON object with `contacts`, `projets`,
/// `contrats` and `campagnes` arrays. Missing arrays are empty.
pub fn load_snapshot_json(path: &Path) -> Result<Snapshot> {
    let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    let snapshot = parse_snapshot_json(&text).map_err(|e| ReportError::json(path, e))?;
    info!(
        "{}: {} contacts, {} projects, {} contracts, {} campaigns",
        path.display(),
        snapshot.contacts.len(),
        snapshot.projects.len(),
        snapshot.contracts.len(),
        snapshot.campaigns.len()
    );
    Ok(snapshot)
}

/// One optional CSV export per collection.
#[derive(Debug, Clone, Default)]
pub struct CsvSources {
    pub contacts: Option<PathBuf>,
    pub projects: Option<PathBuf>,
    pub contracts: Option<PathBuf>,
    pub campaigns: Option<PathBuf>,
}

impl CsvSources {
    pub fn is_empty(&self) -> bool {
        self.contacts.is_none()
            && self.projects.is_none()
            && self.contracts.is_none()
            && self.campaigns.is_none()
    }
}

fn load_optional<T: DeserializeOwned>(path: Option<&Path>) -> Result<(Vec<T>, LoadReport)> {
    match path {
        Some(p) => load_csv(p),
        None => Ok((Vec::new(), LoadReport::default())),
    }
}

pub fn load_snapshot_csv(sources: &CsvSources) -> Result<(Snapshot, LoadReport)> {
    let (contacts, r1) = load_optional::<Contact>(sources.contacts.as_deref())?;
    let (projects, r2) = load_optional::<Project>(sources.projects.as_deref())?;
    let (contracts, r3) = load_optional::<Contract>(sources.contracts.as_deref())?;
    let (campaigns, r4) = load_optional::<EmailCampaign>(sources.campaigns.as_deref())?;
    let snapshot = Snapshot {
        contacts,
        projects,
        contracts,
        campaigns,
    };
    Ok((snapshot, r1.merge(r2).merge(r3).merge(r4)))
}
