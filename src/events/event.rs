//! Progress event types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one submitted print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", &self.0.to_string()[..8])
    }
}

/// Lifecycle stage of a print document.
///
/// | Kind | Code | Meaning |
/// |------|------|---------|
/// | StartDoc | 1 | first data command after connect or end of document |
/// | EndDoc | 4 | document closed (end_doc or disconnect) |
/// | Cancel | 6 | document did not print completely |
/// | Finished | 7 | connection closed |
/// | Complete | 8 | document printed without error or cancellation |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressKind {
    StartDoc,
    EndDoc,
    Cancel,
    Finished,
    Complete,
}

impl ProgressKind {
    /// Numeric message code understood by existing point-of-sale front ends.
    pub fn code(self) -> u8 {
        match self {
            Self::StartDoc => 1,
            Self::EndDoc => 4,
            Self::Cancel => 6,
            Self::Finished => 7,
            Self::Complete => 8,
        }
    }
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartDoc => "StartDoc",
            Self::EndDoc => "EndDoc",
            Self::Cancel => "Cancel",
            Self::Finished => "Finished",
            Self::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    /// Job that produced the event, when the session runs on behalf of one
    pub job: Option<JobId>,
    /// Session byte counter when the event was raised
    pub bytes_written: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, job: Option<JobId>, bytes_written: u64) -> Self {
        Self {
            kind,
            job,
            bytes_written,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.kind, self.bytes_written)?;
        if let Some(job) = self.job {
            write!(f, " {}", job)?;
        }
        Ok(())
    }
}
