//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "code", content = "details")]
pub enum FormError {
    /// No controller registered under this block name
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// The record is not (or no longer) a member of the block
    #[error("Record {record} not found in block {block}")]
    RecordNotFound { block: String, record: String },

    /// No relation registered for this detail block
    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    /// No LOV registered under this name, or no LOV bound to the item
    #[error("LOV not found: {0}")]
    LovNotFound(String),

    /// The answered question is unknown or was already answered
    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    /// Raised by `validate_record` / `validate_query_criteria`
    #[error("Validation error: {0}")]
    Validation(String),

    /// Any other failure raised inside an action processor hook
    #[error("Action processor error in {hook}: {message}")]
    ActionProcessor { hook: String, message: String },

    /// Failure reported by a block service
    #[error("Service error: {service} - {message}")]
    Service { service: String, message: String },

    /// The framework connection could not be acquired or committed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid form definition (unknown blocks, two masters for one detail, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation called in the wrong screen mode or lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The host runtime owning the form is gone
    #[error("Form runtime unavailable: {0}")]
    Unavailable(String),
}

impl FormError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::RecordNotFound { .. }
                | Self::QuestionNotFound(_)
                | Self::InvalidState(_)
        )
    }

    /// Wrap a hook failure; validation failures keep their identity.
    #[must_use]
    pub fn from_hook(hook: &str, err: Self) -> Self {
        match err {
            Self::Validation(_) | Self::ActionProcessor { .. } => err,
            other => Self::ActionProcessor {
                hook: hook.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn record_not_found(block: &str, record: impl ToString) -> Self {
        Self::RecordNotFound {
            block: block.to_string(),
            record: record.to_string(),
        }
    }
}

/// Core layer Result type alias
pub type FormResult<T> = std::result::Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_errors_are_wrapped_except_validation() {
        let wrapped = FormError::from_hook(
            "pre_insert",
            FormError::Service {
                service: "orders".to_string(),
                message: "boom".to_string(),
            },
        );
        assert!(matches!(wrapped, FormError::ActionProcessor { ref hook, .. } if hook == "pre_insert"));

        let validation = FormError::from_hook("validate_record", FormError::Validation("bad".into()));
        assert_eq!(validation, FormError::Validation("bad".into()));
    }

    #[test]
    fn serializes_with_code_tag() {
        let json = serde_json::to_value(FormError::BlockNotFound("orders".into())).unwrap();
        assert_eq!(json["code"], "BlockNotFound");
        assert_eq!(json["details"], "orders");
    }

    #[test]
    fn expected_classification() {
        assert!(FormError::Validation("x".into()).is_expected());
        assert!(!FormError::Connection("x".into()).is_expected());
    }
}
