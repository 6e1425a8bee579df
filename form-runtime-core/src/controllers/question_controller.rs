//! Confirmation workflow for operations that would drop unsaved changes

use crate::error::{FormError, FormResult};
use crate::types::{Answer, PendingOperation, Question, QuestionId};

use super::FormController;

impl FormController {
    /// Park `operation` behind a yes/no/cancel question
    pub(crate) fn ask(&mut self, block: Option<usize>, operation: PendingOperation) {
        let question = Question::new(block.map(|b| self.controllers[b].name.clone()), operation);
        log::debug!(
            "Asking {} before {} on {}",
            question.id,
            question.operation.tag(),
            question.block.as_deref().unwrap_or("form")
        );
        self.messenger.ask(&question);
        self.questions.insert(question.id, question);
    }

    /// Resume a deferred operation: `Yes` saves first, `No` discards the changes at stake,
    /// `Cancel` abandons it.
    pub fn handle_answered_question(&mut self, id: QuestionId, answer: Answer) -> FormResult<()> {
        let question = self
            .questions
            .shift_remove(&id)
            .ok_or_else(|| FormError::QuestionNotFound(id.to_string()))?;
        self.hook(question.block.as_deref(), "question_answered", |p, ctx| {
            p.question_answered(ctx, &question, answer)
        })?;
        let idx = question.block.as_deref().map(|b| self.index_of(b)).transpose()?;
        log::debug!("Question {id} answered {answer:?} for {}", question.operation.tag());

        match answer {
            Answer::Cancel => return Ok(()),
            Answer::Yes => self.save_changes()?,
            Answer::No => self.discard_for(idx, &question.operation)?,
        }
        self.perform(idx, question.operation)
    }

    fn discard_for(&mut self, idx: Option<usize>, operation: &PendingOperation) -> FormResult<()> {
        match (idx, operation) {
            (_, PendingOperation::CloseForm) | (None, _) => self.clear_all(),
            (Some(i), op) if op.affects_details_only() => {
                for member in self.mirror_members(i) {
                    self.clear_details(member, true)?;
                }
                Ok(())
            }
            (Some(i), _) => self.clear_block_at(i, true),
        }
    }

    fn perform(&mut self, idx: Option<usize>, operation: PendingOperation) -> FormResult<()> {
        if let PendingOperation::CloseForm = operation {
            return self.close_unchecked();
        }
        let Some(idx) = idx else {
            return Err(FormError::InvalidState(format!(
                "{} question has no block",
                operation.tag()
            )));
        };
        match operation {
            PendingOperation::Query { criteria } => self.run_query(idx, criteria),
            PendingOperation::NextRecord => self.navigate_unchecked(idx, true),
            PendingOperation::PreviousRecord => self.navigate_unchecked(idx, false),
            PendingOperation::FocusRecord { record } => self.focus_and_cascade(idx, record),
            PendingOperation::Insert { record } => self.insert_record(idx, *record),
            PendingOperation::ClearBlock => self.clear_block_at(idx, true),
            PendingOperation::CloseForm => self.close_unchecked(),
        }
    }
}
