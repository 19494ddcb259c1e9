use error_common::VisitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a visit.
///
/// The canonical vocabulary is the four-state set below. Legacy producers
/// still emit synonyms (`finished`, `in-progress`, `in_progress`,
/// `canceled`); those are accepted on parse and normalized, but storage and
/// output always use the canonical spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisitStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl VisitStatus {
    /// Canonical wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "inProgress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Parse a status string, tolerating legacy synonyms.
    ///
    /// Matching is case-insensitive and ignores `-`/`_` separators, so
    /// `in-progress`, `in_progress`, `IN_PROGRESS` and `inProgress` all
    /// normalize to [`VisitStatus::InProgress`].
    pub fn parse(input: &str) -> Result<Self, VisitError> {
        let normalized: String = input
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "planned" => Ok(Self::Planned),
            "inprogress" | "active" => Ok(Self::InProgress),
            "completed" | "finished" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(VisitError::Validation(format!(
                "unknown visit status '{input}'"
            ))),
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStatus {
    type Err = VisitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Provenance of the last sync-originated write on the extended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Synced,
    Pending,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }
}
