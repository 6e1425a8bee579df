//! External collaborator abstraction trait definitions

mod action_processor;
mod block_service;
mod connection;
mod messenger;
mod renderer;

pub use action_processor::{ActionProcessor, NoopActionProcessor};
pub use block_service::BlockService;
pub use connection::{ConnectionProvider, ConnectionScope, NoopConnectionProvider};
pub use messenger::{LogMessenger, Messenger};
pub use renderer::Renderer;
