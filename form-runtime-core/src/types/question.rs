//! Confirmation questions for operations that would discard unsaved changes

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{QueryCriteria, Record, RecordId};

/// Identity of an outstanding question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub Uuid);

impl QuestionId {
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The user's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    /// Save changes, then perform the operation
    Yes,
    /// Discard changes, then perform the operation
    No,
    /// Abandon the operation
    Cancel,
}

/// The operation parked behind a question, with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PendingOperation {
    Query { criteria: QueryCriteria },
    NextRecord,
    PreviousRecord,
    FocusRecord { record: Option<RecordId> },
    Insert { record: Box<Record> },
    ClearBlock,
    CloseForm,
}

impl PendingOperation {
    /// Short tag used in logs and question text
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Query { .. } => "query",
            Self::NextRecord => "next-record",
            Self::PreviousRecord => "previous-record",
            Self::FocusRecord { .. } => "focus-record",
            Self::Insert { .. } => "insert",
            Self::ClearBlock => "clear-block",
            Self::CloseForm => "close-form",
        }
    }

    /// Whether only the detail blocks' changes are at stake (the block itself keeps its own)
    pub fn affects_details_only(&self) -> bool {
        matches!(
            self,
            Self::NextRecord | Self::PreviousRecord | Self::FocusRecord { .. } | Self::Insert { .. }
        )
    }
}

/// A yes/no/cancel question handed to the messenger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    /// Originating block; `None` for form-level operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    pub operation: PendingOperation,
    pub text: String,
    pub asked_at: DateTime<Utc>,
}

impl Question {
    #[must_use]
    pub fn new(block: Option<String>, operation: PendingOperation) -> Self {
        let text = match &block {
            Some(b) => format!(
                "Block '{b}' has unsaved changes. Save them before {}?",
                operation.tag()
            ),
            None => format!("The form has unsaved changes. Save them before {}?", operation.tag()),
        };
        Self {
            id: QuestionId::new_v4(),
            block,
            operation,
            text,
            asked_at: Utc::now(),
        }
    }
}
