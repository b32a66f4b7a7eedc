//! Job lifecycle states and the legal transitions between them.

use serde::{Deserialize, Serialize};

/// Lifecycle of a document job.
///
/// `uploaded → extracting → extracted → chunking → mining → completed`,
/// with `failed` reachable from any in-flight phase. `completed` and
/// `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Extracting,
    Extracted,
    Chunking,
    Mining,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::Chunking => "chunking",
            Self::Mining => "mining",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "extracting" => Some(Self::Extracting),
            "extracted" => Some(Self::Extracted),
            "chunking" => Some(Self::Chunking),
            "mining" => Some(Self::Mining),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether moving to `to` is legal from this state.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Uploaded, Extracting)
                | (Extracting, Extracted)
                | (Extracted, Chunking)
                | (Chunking, Mining)
                | (Mining, Completed)
                | (Extracting, Failed)
                | (Extracted, Failed)
                | (Chunking, Failed)
                | (Mining, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
