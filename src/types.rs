use crate::util::{de_amount, de_count, first_timestamp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifier as stored by the backend. Numeric and textual ids are both
/// normalised to their string form so `12` and `"12"` link to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RecordId {
    fn from(v: i64) -> Self {
        RecordId(v.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(v: &str) -> Self {
        RecordId::new(v)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdRepr {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match IdRepr::deserialize(deserializer)? {
            IdRepr::Int(v) => RecordId::from(v),
            IdRepr::Float(v) if v.fract() == 0.0 => RecordId((v as i64).to_string()),
            IdRepr::Float(v) => RecordId(v.to_string()),
            IdRepr::Text(s) => RecordId::new(s),
        })
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Classification of a contact in the sales funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactStatus {
    Prospect,
    Client,
    Inactive,
    Other,
}

impl ContactStatus {
    pub fn classify(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("Prospect") => ContactStatus::Prospect,
            Some("Client") => ContactStatus::Client,
            Some("Inactif") | Some("Inactive") => ContactStatus::Inactive,
            _ => ContactStatus::Other,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "identifiant", default)]
    pub id: Option<RecordId>,
    #[serde(rename = "prenom", default)]
    pub first_name: Option<String>,
    #[serde(rename = "nom", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "statut", default)]
    pub status: Option<String>,
    #[serde(rename = "date_creation", default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Contact {
    pub fn classification(&self) -> ContactStatus {
        ContactStatus::classify(self.status.as_deref())
    }

    pub fn effective_date(&self) -> Option<NaiveDateTime> {
        first_timestamp(&[self.creation_date.as_deref(), self.created_at.as_deref()])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(rename = "projet_id", default)]
    pub project_id: Option<RecordId>,
    #[serde(default)]
    pub contact_id: Option<RecordId>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(rename = "statut", default)]
    pub status: Option<String>,
    #[serde(rename = "commercial", default)]
    pub agent: Option<String>,
    #[serde(rename = "origine", default)]
    pub source: Option<String>,
    #[serde(rename = "date_creation", default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Project {
    /// Key contracts use to point at this project.
    pub fn link_id(&self) -> Option<&RecordId> {
        self.project_id.as_ref().or(self.id.as_ref())
    }

    pub fn effective_date(&self) -> Option<NaiveDateTime> {
        first_timestamp(&[self.creation_date.as_deref(), self.created_at.as_deref()])
    }

    /// Creation date only when the project itself records one.
    pub fn explicit_date(&self) -> Option<NaiveDateTime> {
        first_timestamp(&[self.creation_date.as_deref()])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contract {
    #[serde(rename = "projet_id", default)]
    pub project_id: Option<RecordId>,
    #[serde(default)]
    pub contact_id: Option<RecordId>,
    #[serde(rename = "contrat_compagnie", default)]
    pub company: Option<String>,
    #[serde(rename = "contrat_produit", default)]
    pub product: Option<String>,
    #[serde(rename = "contrat_statut", default)]
    pub status: Option<String>,
    #[serde(rename = "prime_brute_annuelle", default, deserialize_with = "de_amount")]
    pub annual_premium: Option<f64>,
    #[serde(rename = "prime_brute_mensuelle", default, deserialize_with = "de_amount")]
    pub monthly_premium: Option<f64>,
    #[serde(rename = "commissionnement_annee1", default, deserialize_with = "de_amount")]
    pub commission_year1: Option<f64>,
    #[serde(
        rename = "commissionnement_autres_annees",
        default,
        deserialize_with = "de_amount"
    )]
    pub commission_recurring: Option<f64>,
    #[serde(rename = "contrat_date_creation", default)]
    pub contract_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(rename = "commercial", default)]
    pub agent: Option<String>,
}

impl Contract {
    pub fn premium(&self) -> f64 {
        self.annual_premium.unwrap_or(0.0)
    }

    pub fn monthly(&self) -> f64 {
        self.monthly_premium.unwrap_or(0.0)
    }

    pub fn year1(&self) -> f64 {
        self.commission_year1.unwrap_or(0.0)
    }

    pub fn recurring(&self) -> f64 {
        self.commission_recurring.unwrap_or(0.0)
    }

    pub fn effective_date(&self) -> Option<NaiveDateTime> {
        first_timestamp(&[self.contract_date.as_deref(), self.created_at.as_deref()])
    }

    /// Signing date only when the contract itself records one.
    pub fn explicit_date(&self) -> Option<NaiveDateTime> {
        first_timestamp(&[self.contract_date.as_deref()])
    }
}

/// Aggregated statistics of one email campaign as reported by the mailing
/// provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailCampaign {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "de_count")]
    pub sent: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub delivered: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub opens: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub clicks: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub unsubscribes: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub bounces: u64,
    #[serde(default, deserialize_with = "de_count")]
    pub complaints: u64,
    #[serde(rename = "sentDate", default)]
    pub sent_date: Option<String>,
    #[serde(rename = "type", default)]
    pub campaign_type: String,
}

impl EmailCampaign {
    pub fn effective_date(&self) -> Option<NaiveDateTime> {
        first_timestamp(&[self.sent_date.as_deref()])
    }
}

/// Everything the analytics read in one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(rename = "projets", default)]
    pub projects: Vec<Project>,
    #[serde(rename = "contrats", default)]
    pub contracts: Vec<Contract>,
    #[serde(rename = "campagnes", default)]
    pub campaigns: Vec<EmailCampaign>,
}
