//! The form: owner of every block, controller, relation and outstanding question

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{FormError, FormResult};
use crate::traits::{ActionProcessor, ConnectionProvider, Messenger};
use crate::types::{
    Block, FormEvent, FormInfo, FormSettings, HookContext, ItemLovDefinition, Notice,
    PendingOperation, Question, QuestionId, RecordId, RelationDefinition,
};
use crate::utils::{ListenerHandle, ListenerRegistry};

use super::lov_controller::LovSession;
use super::mirror::MirrorGroup;
use super::{BlockController, ControllerKind, EditableBlockController, HookRegistry, LovController};

/// Open/closed state of the form instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormLifecycle {
    Built,
    Open,
    Closed,
}

/// Owns all runtime state of one form instance.
///
/// Controllers are addressed by name; operations go through the handles returned by
/// [`FormController::controller`] and [`FormController::lov`].
pub struct FormController {
    pub(crate) info: FormInfo,
    pub(crate) settings: FormSettings,
    pub(crate) blocks: Vec<Block>,
    pub(crate) controllers: IndexMap<String, BlockController>,
    pub(crate) relations: Vec<RelationDefinition>,
    pub(crate) mirrors: Vec<MirrorGroup>,
    pub(crate) item_lovs: Vec<ItemLovDefinition>,
    pub(crate) hooks: HookRegistry,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) connection: Arc<dyn ConnectionProvider>,
    pub(crate) questions: IndexMap<QuestionId, Question>,
    pub(crate) lov_session: Option<LovSession>,
    pub(crate) listeners: ListenerRegistry<FormEvent>,
    pub(crate) lifecycle: FormLifecycle,
    pub(crate) next_record_id: u64,
}

impl FormController {
    pub fn info(&self) -> &FormInfo {
        &self.info
    }

    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    pub fn lifecycle(&self) -> FormLifecycle {
        self.lifecycle
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn relations(&self) -> &[RelationDefinition] {
        &self.relations
    }

    pub fn controller_names(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    /// Editable handle for a block or mirror view
    pub fn controller(&mut self, name: &str) -> FormResult<EditableBlockController<'_>> {
        let index = self.index_of(name)?;
        if self.controllers[index].kind != ControllerKind::Editable {
            return Err(FormError::InvalidState(format!("'{name}' is a LOV, not a block")));
        }
        Ok(EditableBlockController::new(self, index))
    }

    /// Read-only handle for a LOV
    pub fn lov(&mut self, name: &str) -> FormResult<LovController<'_>> {
        let index = self
            .controllers
            .get_index_of(name)
            .filter(|i| self.controllers[*i].kind == ControllerKind::Lov)
            .ok_or_else(|| FormError::LovNotFound(name.to_string()))?;
        Ok(LovController::new(self, index))
    }

    /// Controller state, by name
    pub fn block_controller(&self, name: &str) -> FormResult<&BlockController> {
        self.controllers
            .get(name)
            .ok_or_else(|| FormError::BlockNotFound(name.to_string()))
    }

    /// Data behind a controller; mirror views return their parent's block
    pub fn block(&self, name: &str) -> FormResult<&Block> {
        let ctl = self.block_controller(name)?;
        Ok(&self.blocks[ctl.block])
    }

    /// Focused record id of a controller
    pub fn focused_record(&self, name: &str) -> FormResult<Option<RecordId>> {
        Ok(self.focused_id(self.index_of(name)?))
    }

    /// Whether any block holds unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.blocks.iter().any(Block::is_dirty)
    }

    pub fn pending_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.values()
    }

    pub fn subscribe(&self, listener: impl Fn(&FormEvent) + Send + Sync + 'static) -> ListenerHandle {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.listeners.unsubscribe(handle)
    }

    pub fn open(&mut self) -> FormResult<()> {
        self.hook(None, "pre_form_opened", |p, ctx| p.pre_form_opened(ctx))?;
        self.lifecycle = FormLifecycle::Open;
        log::info!("Form {} opened", self.info.name);
        Ok(())
    }

    /// Close the form; asks first when anything is unsaved
    pub fn close(&mut self) -> FormResult<()> {
        if self.is_dirty() {
            self.ask(None, PendingOperation::CloseForm);
            return Ok(());
        }
        self.close_unchecked()
    }

    pub(crate) fn close_unchecked(&mut self) -> FormResult<()> {
        self.hook(None, "pre_form_closed", |p, ctx| p.pre_form_closed(ctx))?;
        self.clear_all()?;
        self.lov_session = None;
        self.lifecycle = FormLifecycle::Closed;
        log::info!("Form {} closed", self.info.name);
        Ok(())
    }

    /// Clear every block, masters first so details follow through the relation tree
    pub(crate) fn clear_all(&mut self) -> FormResult<()> {
        for idx in 0..self.controllers.len() {
            if self.master_relation(idx).is_none() {
                self.clear_block_at(idx, true)?;
            }
        }
        for block in &mut self.blocks {
            block.clear(true);
        }
        Ok(())
    }

    /// Run a named command through the handler resolved for `block`
    pub fn execute_action_command(&mut self, block: Option<&str>, command: &str) -> FormResult<()> {
        if let Some(name) = block {
            self.index_of(name)?;
        }
        log::debug!("Action command {command} on {}", block.unwrap_or("form"));
        self.hook(block, "execute_action_command", |p, ctx| {
            p.execute_action_command(ctx, command)
        })
    }

    /// Host boundary: route an error to the messenger and log it
    pub fn report<T>(&self, result: FormResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                if e.is_expected() {
                    log::warn!("Form {}: {e}", self.info.name);
                } else {
                    log::error!("Form {}: {e}", self.info.name);
                }
                self.messenger.report_error(&e);
                None
            }
        }
    }

    pub(crate) fn index_of(&self, name: &str) -> FormResult<usize> {
        self.controllers
            .get_index_of(name)
            .ok_or_else(|| FormError::BlockNotFound(name.to_string()))
    }

    pub(crate) fn allocate_record_id(&mut self) -> RecordId {
        self.next_record_id += 1;
        RecordId(self.next_record_id)
    }

    pub(crate) fn notify(&self, notice: Notice) {
        log::debug!("Notice for form {}: {notice}", self.info.name);
        self.messenger.notify(&notice);
    }

    /// Invoke one hook on the handler resolved for `block`, wrapping its failure
    pub(crate) fn hook<F>(&self, block: Option<&str>, name: &str, f: F) -> FormResult<()>
    where
        F: FnOnce(&dyn ActionProcessor, &HookContext<'_>) -> FormResult<()>,
    {
        let (_, processor) = self.hooks.resolve(block);
        let ctx = HookContext {
            form: &self.info,
            block,
        };
        f(processor.as_ref(), &ctx).map_err(|e| FormError::from_hook(name, e))
    }
}
