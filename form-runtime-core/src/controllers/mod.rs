//! Block, LOV, question and form controllers

mod block_controller;
mod builder;
mod cascade;
mod editable;
mod form_controller;
mod hooks;
mod lov_controller;
mod mirror;
mod question_controller;
mod save;

pub use block_controller::{BlockController, ControllerKind};
pub use builder::FormBuilder;
pub use editable::EditableBlockController;
pub use form_controller::{FormController, FormLifecycle};
pub use hooks::{HookLevel, HookRegistry};
pub use lov_controller::{ItemLovController, LovController};
