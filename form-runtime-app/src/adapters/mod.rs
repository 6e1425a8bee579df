//! Platform-agnostic adapters for hosts without their own persistence or UI messaging.

mod in_memory_block_service;
mod queue_messenger;

pub use in_memory_block_service::InMemoryBlockService;
pub use queue_messenger::{HostMessage, QueueMessenger};
