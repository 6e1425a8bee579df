//! Form Runtime Core Library
//!
//! Record/block lifecycle engine for data-entry forms, including:
//! - Blocks of records with dirty tracking and paging
//! - Master/detail relations with cascading queries
//! - Mirror views sharing one block
//! - Lists of values with auto-accept lookups
//! - Confirmation questions and ordered, transactional saves
//!
//! The library has no I/O of its own: persistence, rendering, business rules and user
//! messaging are abstracted through traits and injected with [`FormBuilder`].

pub mod controllers;
pub mod error;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use controllers::{
    EditableBlockController, FormBuilder, FormController, ItemLovController, LovController,
};
pub use error::{FormError, FormResult};
pub use traits::{ActionProcessor, BlockService, ConnectionProvider, Messenger, Renderer};
