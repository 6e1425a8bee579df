//! Host-side bootstrap for the form runtime.
//!
//! Provides ready-made adapters (`InMemoryBlockService`, `QueueMessenger`) and
//! `FormRuntime`, which confines a `FormController` to one tokio task and hands out
//! cloneable `FormHandle`s for marshalling host calls onto it.

pub mod adapters;
mod runtime;

pub use adapters::{HostMessage, InMemoryBlockService, QueueMessenger};
pub use runtime::{FormHandle, FormRuntime};
