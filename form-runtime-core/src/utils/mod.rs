//! Small building blocks shared by the controllers

mod guard;
mod listeners;

pub use guard::{GuardScope, GuardState, ReentrancyGuard};
pub use listeners::{ListenerHandle, ListenerRegistry};
