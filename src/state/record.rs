//! Workflow record and status types

use crate::constants::{steps, workflow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of one orchestration request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Steps are still running
    Processing,
    /// Every step ran (optional ones possibly degraded)
    Completed,
    /// A required step failed, or orchestration aborted
    Failed,
}

impl WorkflowStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid workflow status: {s}")),
        }
    }
}

/// Durable status/progress snapshot of one orchestration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: String,
    pub session_id: String,
    pub status: WorkflowStatus,
    pub progress: f64,
    pub current_step: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowRecord {
    /// Fresh record for a new workflow: processing, zero progress, `initialize`
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_workflow_id(),
            session_id: session_id.into(),
            status: WorkflowStatus::Processing,
            progress: 0.0,
            current_step: steps::INITIALIZE.to_string(),
            created_at: now,
            last_updated: now,
            error: None,
        }
    }

    /// Apply an update in place. Terminal records are left untouched and `false`
    /// is returned.
    pub fn apply(&mut self, update: &WorkflowUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(clamp_progress(progress));
        }
        if let Some(step) = &update.current_step {
            self.current_step = step.clone();
        }
        self.error = match update.status {
            WorkflowStatus::Failed => update.error.clone(),
            _ => None,
        };
        self.last_updated = Utc::now();
        true
    }
}

/// Status fields written by [`super::WorkflowStateStore::update`]
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowUpdate {
    pub status: WorkflowStatus,
    /// New progress; `None` keeps the stored value
    pub progress: Option<f64>,
    pub current_step: Option<String>,
    /// Kept only when `status` is Failed
    pub error: Option<String>,
}

impl WorkflowUpdate {
    /// Still processing, now running `step`
    pub fn step_started(step: impl Into<String>) -> Self {
        Self {
            status: WorkflowStatus::Processing,
            progress: None,
            current_step: Some(step.into()),
            error: None,
        }
    }

    /// Still processing, `step` finished and progress reached `progress`
    pub fn step_finished(step: impl Into<String>, progress: f64) -> Self {
        Self {
            status: WorkflowStatus::Processing,
            progress: Some(progress),
            current_step: Some(step.into()),
            error: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: WorkflowStatus::Completed,
            progress: Some(1.0),
            current_step: Some(steps::FINALIZATION.to_string()),
            error: None,
        }
    }

    /// Failed; stored progress is left where the last successful step put it
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: WorkflowStatus::Failed,
            progress: None,
            current_step: None,
            error: Some(error.into()),
        }
    }
}

/// `wf_<uuid-v4>`
pub fn generate_workflow_id() -> String {
    format!("{}{}", workflow::ID_PREFIX, Uuid::new_v4())
}

pub(crate) fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let record = WorkflowRecord::new("session-1");
        assert!(record.id.starts_with("wf_"));
        assert_eq!(record.status, WorkflowStatus::Processing);
        assert_eq!(record.progress, 0.0);
        assert_eq!(record.current_step, "initialize");
        assert_eq!(record.created_at, record.last_updated);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_status_serde_and_display() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!("failed".parse::<WorkflowStatus>().unwrap(), WorkflowStatus::Failed);
        assert_eq!(WorkflowStatus::Processing.to_string(), "processing");
        assert!("unknown".parse::<WorkflowStatus>().is_err());
    }

    #[test]
    fn test_apply_keeps_progress_monotonic_and_clamped() {
        let mut record = WorkflowRecord::new("s");
        assert!(record.apply(&WorkflowUpdate::step_finished("a", 0.5)));
        assert!(record.apply(&WorkflowUpdate::step_finished("b", 0.3)));
        assert_eq!(record.progress, 0.5);

        record.apply(&WorkflowUpdate::step_finished("c", 7.0));
        assert_eq!(record.progress, 1.0);
    }

    #[test]
    fn test_terminal_record_is_immutable() {
        let mut record = WorkflowRecord::new("s");
        record.apply(&WorkflowUpdate::step_finished("a", 0.3));
        record.apply(&WorkflowUpdate::failed("boom"));
        assert_eq!(record.status, WorkflowStatus::Failed);
        assert_eq!(record.progress, 0.3);
        assert_eq!(record.error.as_deref(), Some("boom"));

        let snapshot = record.clone();
        assert!(!record.apply(&WorkflowUpdate::completed()));
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_error_only_kept_for_failed() {
        let mut record = WorkflowRecord::new("s");
        let update = WorkflowUpdate {
            error: Some("ignored".to_string()),
            ..WorkflowUpdate::step_started("a")
        };
        record.apply(&update);
        assert!(record.error.is_none());
    }
}
