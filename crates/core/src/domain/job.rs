use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::turn::Sender;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

/// Summary record for one pipeline session, produced for the external
/// job-history store once the downstream stage completes. Storage mechanics
/// live outside this workspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_input: String,
    pub title: String,
    pub status: JobStatus,
    pub final_message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub job_id: Uuid,
    pub sender: Sender,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One agent's raw JSON output for a job, keyed by agent name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentOutputRecord {
    pub job_id: Uuid,
    pub agent_name: String,
    pub json_output: String,
    pub timestamp: DateTime<Utc>,
}
