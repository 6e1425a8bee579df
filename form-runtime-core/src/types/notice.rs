//! User-messaged conditions
//!
//! These are expected refusals, not errors: the operation aborts and returns `Ok`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A message for the user, delivered through the messenger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum Notice {
    /// The block has no service; query and persistence are unavailable
    NoService { block: String },
    /// Detail block without a focused master record or with null join values
    MasterlessOperation { block: String },
    /// A master with live detail rows cannot be deleted
    DeleteBlockedByDetails {
        block: String,
        detail: String,
        message: String,
    },
    FirstPage { block: String },
    LastPage { block: String },
    FirstRecord { block: String },
    LastRecord { block: String },
    NoRecordFocused { block: String },
    OperationNotAllowed { block: String, operation: String },
    NothingToSave,
    Saved {
        inserted: usize,
        updated: usize,
        deleted: usize,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoService { block } => write!(f, "Block '{block}' has no data service"),
            Self::MasterlessOperation { block } => {
                write!(f, "Block '{block}' cannot be used without a master record")
            }
            Self::DeleteBlockedByDetails { message, .. } => f.write_str(message),
            Self::FirstPage { block } => write!(f, "Block '{block}' is on the first page"),
            Self::LastPage { block } => write!(f, "Block '{block}' is on the last page"),
            Self::FirstRecord { block } => write!(f, "Block '{block}' is at the first record"),
            Self::LastRecord { block } => write!(f, "Block '{block}' is at the last record"),
            Self::NoRecordFocused { block } => write!(f, "Block '{block}' has no focused record"),
            Self::OperationNotAllowed { block, operation } => {
                write!(f, "Operation '{operation}' is not allowed on block '{block}'")
            }
            Self::NothingToSave => f.write_str("There are no changes to save"),
            Self::Saved {
                inserted,
                updated,
                deleted,
            } => write!(
                f,
                "Changes saved ({inserted} inserted, {updated} updated, {deleted} deleted)"
            ),
        }
    }
}
