//! Context values handed to external collaborators

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RecordId;

/// Identity and parameters of a running form instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInfo {
    pub name: String,
    /// Host-supplied parameters (user id, session, ...)
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
}

impl FormInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: IndexMap::new(),
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

/// Where a hook is being invoked
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub form: &'a FormInfo,
    pub block: Option<&'a str>,
}

impl<'a> HookContext<'a> {
    pub fn form(form: &'a FormInfo) -> Self {
        Self { form, block: None }
    }

    pub fn block(form: &'a FormInfo, block: &'a str) -> Self {
        Self {
            form,
            block: Some(block),
        }
    }
}

/// Screen state of one block controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenMode {
    Browsing,
    Inserting,
    Updating,
    Querying,
}

/// The transition a record is being validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOperation {
    Insert,
    Update,
    Delete,
}

/// A pending screen edit pulled from a renderer by `synchronize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEdit {
    pub record: RecordId,
    pub item: String,
    pub value: Value,
}

/// LOV activity passed to `lov_activated` / `lov_completed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LovEvent {
    pub lov: String,
    pub block: String,
    pub item: String,
}

/// Result of an LOV validation or activation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum LovOutcome {
    /// Exactly one match: mappings applied without a picker
    Accepted,
    /// Zero or several matches: the picker is on screen, awaiting a choice
    PickerDisplayed { rows: usize },
    /// Empty item value: mapped fields cleared, no lookup
    Cleared,
}

/// Notifications delivered to form listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FormEvent {
    FocusChanged {
        block: String,
        record: Option<RecordId>,
    },
    ValueChanged {
        block: String,
        record: RecordId,
        item: String,
    },
    NewRecord {
        block: String,
        record: RecordId,
    },
}
