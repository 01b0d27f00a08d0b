use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::form::FormId;

/// Lifecycle of a collect, in workflow order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CollectStatus {
    /// Field collection ongoing.
    #[default]
    Started,
    /// Field collection closed, scan form distributed.
    Ended,
    /// Results reconciled, documents and data exported.
    Finalized,
}

impl CollectStatus {
    pub const ALL: [Self; 3] = [Self::Started, Self::Ended, Self::Finalized];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Started => "Collecte terrain en cours",
            Self::Ended => "Collecte terminée, analyse des données",
            Self::Finalized => "Collecte finalisée avec documents",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Ended => "ended",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for CollectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CollectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectId(pub u64);

impl fmt::Display for CollectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollectId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// What the operator provides to open a collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCollect {
    pub commune: String,
    pub suffix: String,
}

/// A field collection campaign in one commune.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collect {
    pub id: CollectId,
    pub commune: String,
    pub suffix: String,
    pub status: CollectStatus,
    pub started_on: DateTime<Utc>,
    #[serde(default)]
    pub ended_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finalized_on: Option<DateTime<Utc>>,
    /// Remote key of the survey form.
    #[serde(default)]
    pub form_pk: Option<FormId>,
    /// Remote key of the scan form.
    #[serde(default)]
    pub scan_form_pk: Option<FormId>,
    #[serde(default)]
    pub nb_submissions: Option<u64>,
    #[serde(default)]
    pub nb_indigents: Option<u64>,
    #[serde(default)]
    pub nb_non_indigents: Option<u64>,
    #[serde(default)]
    pub nb_medias: Option<u64>,
    #[serde(default)]
    pub medias_size: Option<u64>,
}

impl Collect {
    #[must_use]
    pub fn new(id: CollectId, new: &NewCollect, now: DateTime<Utc>) -> Self {
        Self {
            id,
            commune: new.commune.clone(),
            suffix: new.suffix.clone(),
            status: CollectStatus::Started,
            started_on: now,
            ended_on: None,
            finalized_on: None,
            form_pk: None,
            scan_form_pk: None,
            nb_submissions: None,
            nb_indigents: None,
            nb_non_indigents: None,
            nb_medias: None,
            medias_size: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        format!("E.S {} {}", self.commune, self.suffix)
    }

    #[must_use]
    pub fn form_title(&self) -> String {
        format!("Enquête sociale {}/{}", self.commune, self.suffix)
    }

    #[must_use]
    pub fn scan_form_title(&self) -> String {
        format!("Scan certificats {}/{}", self.commune, self.suffix)
    }

    /// Form identifier of the survey form on the remote service.
    #[must_use]
    pub fn form_id(&self) -> String {
        format!("enquete-sociale-{}", self.id)
    }

    /// Form identifier of the scan form on the remote service.
    #[must_use]
    pub fn scan_form_id(&self) -> String {
        format!("scan-certificats-{}", self.id)
    }

    /// Folder holding everything exported for this collect.
    #[must_use]
    pub fn folder(&self) -> String {
        self.form_id()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.status, CollectStatus::Started | CollectStatus::Ended)
    }

    #[must_use]
    pub fn has_ended(&self) -> bool {
        matches!(self.status, CollectStatus::Ended | CollectStatus::Finalized)
    }

    /// Move to `status`, keeping the milestone timestamps consistent.
    pub fn change_status(&mut self, status: CollectStatus, now: DateTime<Utc>) {
        match status {
            CollectStatus::Started => {
                self.ended_on = None;
                self.finalized_on = None;
            }
            CollectStatus::Ended => {
                self.ended_on = Some(now);
                self.finalized_on = None;
            }
            CollectStatus::Finalized => {
                self.finalized_on = Some(now);
            }
        }
        self.status = status;
    }

    /// Clear the counters filled from survey submissions.
    pub fn reset_survey_counters(&mut self) {
        self.nb_submissions = None;
        self.nb_medias = None;
        self.medias_size = None;
        self.nb_indigents = None;
        self.nb_non_indigents = None;
    }
}
