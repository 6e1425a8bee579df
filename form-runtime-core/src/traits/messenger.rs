//! User messaging abstract Trait

use crate::error::FormError;
use crate::types::{Notice, Question};

/// Messenger Trait
///
/// Delivers notices, confirmation questions and surfaced errors to the user.
/// Answers come back through `FormController::handle_answered_question`, never as a
/// blocking return value.
pub trait Messenger: Send + Sync {
    /// Show a user-messaged condition
    fn notify(&self, notice: &Notice);

    /// Ask a yes/no/cancel question
    fn ask(&self, question: &Question);

    /// Surface an error that reached the host boundary
    fn report_error(&self, error: &FormError);
}

/// Messenger that only writes to the log
///
/// Default implementation for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessenger;

impl Messenger for LogMessenger {
    fn notify(&self, notice: &Notice) {
        log::info!("{notice}");
    }

    fn ask(&self, question: &Question) {
        log::info!("Question {}: {}", question.id, question.text);
    }

    fn report_error(&self, error: &FormError) {
        if error.is_expected() {
            log::warn!("{error}");
        } else {
            log::error!("{error}");
        }
    }
}
