//! Business-rule hooks invoked around every lifecycle transition

use crate::error::FormResult;
use crate::types::{
    Answer, HookContext, LovEvent, QueryCriteria, Question, Record, RecordOperation, ScreenMode,
};

/// Action Processor Trait
///
/// Registered per form, per block or per LOV. Every method has a no-op default so an
/// implementation only overrides the hooks it cares about. A returned `Validation` error
/// aborts the transition; any other error is wrapped as `ActionProcessor`.
pub trait ActionProcessor: Send + Sync {
    fn new_form_instance(&self, _ctx: &HookContext<'_>) -> FormResult<()> {
        Ok(())
    }

    fn new_block_instance(&self, _ctx: &HookContext<'_>) -> FormResult<()> {
        Ok(())
    }

    fn pre_form_opened(&self, _ctx: &HookContext<'_>) -> FormResult<()> {
        Ok(())
    }

    fn pre_form_closed(&self, _ctx: &HookContext<'_>) -> FormResult<()> {
        Ok(())
    }

    /// Before an insert or update screen is shown
    fn pre_open_screen(
        &self,
        _ctx: &HookContext<'_>,
        _mode: ScreenMode,
        _record: &mut Record,
    ) -> FormResult<()> {
        Ok(())
    }

    /// Seed a freshly created record
    fn initialise_record(&self, _ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        Ok(())
    }

    fn validate_record(
        &self,
        _ctx: &HookContext<'_>,
        _record: &Record,
        _operation: RecordOperation,
    ) -> FormResult<()> {
        Ok(())
    }

    fn validate_query_criteria(
        &self,
        _ctx: &HookContext<'_>,
        _criteria: &QueryCriteria,
    ) -> FormResult<()> {
        Ok(())
    }

    fn pre_query(&self, _ctx: &HookContext<'_>, _criteria: &mut QueryCriteria) -> FormResult<()> {
        Ok(())
    }

    /// Once per fetched record
    fn post_query(&self, _ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        Ok(())
    }

    /// Once per query, after every record went through `post_query`
    fn post_block_query(&self, _ctx: &HookContext<'_>, _records: &[Record]) -> FormResult<()> {
        Ok(())
    }

    fn pre_insert(&self, _ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        Ok(())
    }

    fn post_insert(&self, _ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        Ok(())
    }

    fn pre_update(&self, _ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        Ok(())
    }

    fn post_update(&self, _ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        Ok(())
    }

    fn pre_delete(&self, _ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        Ok(())
    }

    fn post_delete(&self, _ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        Ok(())
    }

    fn lov_activated(&self, _ctx: &HookContext<'_>, _event: &LovEvent) -> FormResult<()> {
        Ok(())
    }

    fn lov_completed(
        &self,
        _ctx: &HookContext<'_>,
        _event: &LovEvent,
        _value_chosen: bool,
    ) -> FormResult<()> {
        Ok(())
    }

    /// Host-defined commands (buttons, menu entries)
    fn execute_action_command(&self, _ctx: &HookContext<'_>, _command: &str) -> FormResult<()> {
        Ok(())
    }

    fn when_insert_cancelled(&self, _ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        Ok(())
    }

    fn when_update_cancelled(&self, _ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        Ok(())
    }

    fn question_answered(
        &self,
        _ctx: &HookContext<'_>,
        _question: &Question,
        _answer: Answer,
    ) -> FormResult<()> {
        Ok(())
    }

    /// Friendlier text for a delete refused because `detail` still has rows
    fn master_detail_delete_violation_message(
        &self,
        _ctx: &HookContext<'_>,
        _detail: &str,
    ) -> Option<String> {
        None
    }
}

/// Action processor that does nothing; the form-level default
pub struct NoopActionProcessor;

impl ActionProcessor for NoopActionProcessor {}
