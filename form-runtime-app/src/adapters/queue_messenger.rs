//! Messenger that queues everything for a host UI loop

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use form_runtime_core::error::FormError;
use form_runtime_core::traits::Messenger;
use form_runtime_core::types::{Notice, Question};
use serde::Serialize;

/// One message waiting for the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum HostMessage {
    Notice(Notice),
    Question(Question),
    Error(FormError),
}

/// Queueing messenger
///
/// The form pushes from its owning task; the host drains the queue between calls and
/// answers questions through `FormController::handle_answered_question`.
#[derive(Debug, Default)]
pub struct QueueMessenger {
    queue: Mutex<VecDeque<HostMessage>>,
}

impl QueueMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, message: HostMessage) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message);
    }

    /// Take every queued message, oldest first
    pub fn drain(&self) -> Vec<HostMessage> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Questions still queued, without removing anything
    pub fn pending_questions(&self) -> Vec<Question> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|m| match m {
                HostMessage::Question(q) => Some(q.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Messenger for QueueMessenger {
    fn notify(&self, notice: &Notice) {
        log::debug!("Queued notice: {notice}");
        self.push(HostMessage::Notice(notice.clone()));
    }

    fn ask(&self, question: &Question) {
        log::debug!("Queued question {}", question.id);
        self.push(HostMessage::Question(question.clone()));
    }

    fn report_error(&self, error: &FormError) {
        if error.is_expected() {
            log::warn!("{error}");
        } else {
            log::error!("{error}");
        }
        self.push(HostMessage::Error(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use form_runtime_core::types::PendingOperation;

    #[test]
    fn drains_in_arrival_order() {
        let m = QueueMessenger::new();
        m.notify(&Notice::NothingToSave);
        m.ask(&Question::new(None, PendingOperation::CloseForm));
        m.report_error(&FormError::Validation("bad".into()));

        assert_eq!(m.len(), 3);
        assert_eq!(m.pending_questions().len(), 1);
        let drained = m.drain();
        assert_eq!(drained[0], HostMessage::Notice(Notice::NothingToSave));
        assert!(matches!(drained[2], HostMessage::Error(FormError::Validation(_))));
        assert!(m.is_empty());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(HostMessage::Notice(Notice::NothingToSave)).unwrap();
        assert_eq!(json["kind"], "notice");
        assert_eq!(json["message"]["code"], "nothingToSave");
    }
}
