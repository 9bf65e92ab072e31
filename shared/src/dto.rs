use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Sensitivity categories, declared in ascending severity so that the derived
/// `Ord` is the severity ordering.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Label {
    Unclassified,
    Public,
    Internal,
    Confidential,
}

impl Label {
    /// Labels the classification service is allowed to return.
    pub const KNOWN: [Label; 3] = [Label::Public, Label::Internal, Label::Confidential];

    /// Parses a label reported by the classification service. `unclassified`
    /// is not a verdict the service may give, so it is rejected like any
    /// other unknown word.
    pub fn from_known(raw: &str) -> Option<Label> {
        Label::from_str(raw.trim())
            .ok()
            .filter(|l| Label::KNOWN.contains(l))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStatus {
    Queued,
    Extracting,
    Classifying,
    Completed,
    Failed,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Queued => "queued",
            ClassificationStatus::Extracting => "extracting",
            ClassificationStatus::Classifying => "classifying",
            ClassificationStatus::Completed => "completed",
            ClassificationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClassificationStatus::Completed | ClassificationStatus::Failed
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown classification status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ClassificationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ClassificationStatus::Queued),
            "extracting" => Ok(ClassificationStatus::Extracting),
            "classifying" => Ok(ClassificationStatus::Classifying),
            "completed" => Ok(ClassificationStatus::Completed),
            "failed" => Ok(ClassificationStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One row of the status store; also the shape the polling surface reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    pub id: i32,
    pub status: ClassificationStatus,
    pub label: Option<Label>,
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn queued(id: i32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: ClassificationStatus::Queued,
            label: None,
            error: None,
            queued_at: now,
        }
    }
}

/// Writes the orchestrator performs once it owns a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Classifying,
    /// `note` is only set for an inconclusive (`unclassified`) result.
    Completed { label: Label, note: Option<String> },
    Failed { message: String },
}

impl StatusUpdate {
    pub fn status(&self) -> ClassificationStatus {
        match self {
            StatusUpdate::Classifying => ClassificationStatus::Classifying,
            StatusUpdate::Completed { .. } => ClassificationStatus::Completed,
            StatusUpdate::Failed { .. } => ClassificationStatus::Failed,
        }
    }

    pub fn label(&self) -> Option<Label> {
        match self {
            StatusUpdate::Completed { label, .. } => Some(*label),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StatusUpdate::Completed { note, .. } => note.as_deref(),
            StatusUpdate::Failed { message } => Some(message),
            StatusUpdate::Classifying => None,
        }
    }
}

/// Published by the upload collaborator once the record exists in `queued`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentUploaded {
    pub document_id: i32,
    pub storage_ref: String,
}

/// Published by the retry collaborator; the runner performs the requeue.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryRequested {
    pub document_id: i32,
    pub storage_ref: String,
}
