//! Editable block operations: query, paging, insert, update, delete, screens, navigation

use std::sync::Arc;

use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::traits::{BlockService, ConnectionScope};
use crate::types::{
    Block, Criterion, FieldEdit, FieldValues, FormEvent, HookContext, LovOutcome, Notice, PageRequest,
    PendingOperation, QueryCriteria, QueryRequest, Record, RecordId, RecordOperation, ScreenMode,
};

use super::block_controller::Screen;
use super::mirror::MirrorOp;
use super::{BlockController, FormController};

/// Handle for lifecycle operations on one editable view.
///
/// Borrowed from [`FormController::controller`]; every operation may cascade into
/// details and mirror siblings, so the handle holds the whole form.
pub struct EditableBlockController<'f> {
    form: &'f mut FormController,
    index: usize,
}

impl<'f> EditableBlockController<'f> {
    pub(crate) fn new(form: &'f mut FormController, index: usize) -> Self {
        Self { form, index }
    }

    pub fn name(&self) -> &str {
        &self.state().name
    }

    pub fn state(&self) -> &BlockController {
        &self.form.controllers[self.index]
    }

    pub fn block(&self) -> &Block {
        &self.form.blocks[self.state().block]
    }

    pub fn mode(&self) -> ScreenMode {
        self.state().mode()
    }

    pub fn focused_record(&self) -> Option<&Record> {
        self.form
            .focused_id(self.index)
            .and_then(|id| self.block().record(id))
    }

    /// Scratch record of the open insert/update screen
    pub fn screen_record(&self) -> Option<&Record> {
        self.state().screen.record()
    }

    /// Criteria being edited on the open query screen
    pub fn screen_criteria(&self) -> Option<&QueryCriteria> {
        match &self.state().screen {
            Screen::Querying(c) => Some(c),
            _ => None,
        }
    }

    pub fn prevent_masterless_operations(&self) -> bool {
        self.form.prevent_masterless_operations(self.index)
    }

    /// Unsaved changes in this block or any detail below it
    pub fn is_dirty(&self) -> bool {
        self.form.subtree_dirty(self.index)
    }

    pub fn execute_query(&mut self, criteria: QueryCriteria) -> FormResult<()> {
        self.form.execute_query_at(self.index, criteria)
    }

    /// Re-run the block's last criteria
    pub fn requery(&mut self) -> FormResult<()> {
        let criteria = self.block().criteria().clone();
        self.form.execute_query_at(self.index, criteria)
    }

    pub fn next_page(&mut self) -> FormResult<()> {
        self.form.change_page_at(self.index, true)
    }

    pub fn previous_page(&mut self) -> FormResult<()> {
        self.form.change_page_at(self.index, false)
    }

    /// Run a deferred detail query; returns whether one was pending
    pub fn ensure_queried(&mut self) -> FormResult<bool> {
        self.form.ensure_queried_at(self.index)
    }

    /// A new, unattached record initialised from item defaults and `initialise_record`
    pub fn create_record(&mut self, apply_defaults: bool) -> FormResult<Record> {
        self.form.create_record_at(self.index, apply_defaults)
    }

    pub fn execute_insert(&mut self, record: Record) -> FormResult<()> {
        self.form.execute_insert_at(self.index, record)
    }

    pub fn execute_update(&mut self, record: Record) -> FormResult<()> {
        self.form.execute_update_at(self.index, record)
    }

    pub fn execute_delete(&mut self, record: RecordId) -> FormResult<()> {
        self.form.execute_delete_at(self.index, record)
    }

    /// Delete the focused record; user-messaged when nothing is focused
    pub fn delete_focused(&mut self) -> FormResult<()> {
        match self.form.focused_id(self.index) {
            Some(id) => self.form.execute_delete_at(self.index, id),
            None => {
                self.form.notify(Notice::NoRecordFocused {
                    block: self.name().to_string(),
                });
                Ok(())
            }
        }
    }

    /// Clear the block and its details; dropping changes asks first
    pub fn clear_block(&mut self, clear_changes: bool) -> FormResult<()> {
        if clear_changes && self.form.subtree_dirty(self.index) {
            self.form.ask(Some(self.index), PendingOperation::ClearBlock);
            return Ok(());
        }
        self.form.clear_block_at(self.index, clear_changes)
    }

    /// Grid edit of a live record
    pub fn set_item_value(&mut self, record: RecordId, item: &str, value: Value) -> FormResult<()> {
        self.form.set_item_value_at(self.index, record, item, value)
    }

    /// Pull pending screen edits from the renderer (and its mirrors) into the records
    pub fn synchronize(&mut self) -> FormResult<()> {
        self.form.synchronize_at(self.index)
    }

    pub fn select_record(&mut self, record: RecordId) -> FormResult<()> {
        if self.block().record(record).is_none() {
            return Err(FormError::record_not_found(self.name(), record));
        }
        self.form.new_record_instance_at(self.index, Some(record))
    }

    pub fn first_record(&mut self) -> FormResult<()> {
        let target = self.form.first_in_order(self.index);
        self.form.new_record_instance_at(self.index, target)
    }

    pub fn last_record(&mut self) -> FormResult<()> {
        let target = self.form.display_order(self.index).last().copied();
        self.form.new_record_instance_at(self.index, target)
    }

    pub fn next_record(&mut self) -> FormResult<()> {
        self.form.navigate_at(self.index, true)
    }

    pub fn previous_record(&mut self) -> FormResult<()> {
        self.form.navigate_at(self.index, false)
    }

    pub fn enter_insert(&mut self, apply_defaults: bool) -> FormResult<()> {
        self.form.enter_insert_at(self.index, apply_defaults)
    }

    pub fn enter_update(&mut self) -> FormResult<()> {
        self.form.enter_update_at(self.index)
    }

    pub fn enter_query(&mut self) -> FormResult<()> {
        self.form.enter_query_at(self.index)
    }

    /// Edit the open screen: the scratch record, or a criterion on the query screen
    pub fn set_screen_value(&mut self, item: &str, value: Value) -> FormResult<()> {
        let name = self.name().to_string();
        match &mut self.form.controllers[self.index].screen {
            Screen::Inserting(r) | Screen::Updating(r) => {
                r.set_value(item, value);
                Ok(())
            }
            Screen::Querying(criteria) => {
                if value.is_null() {
                    criteria.remove(item);
                } else {
                    criteria.set(item, Criterion::Equals(value));
                }
                Ok(())
            }
            Screen::Browsing => Err(FormError::InvalidState(format!("{name} has no open screen"))),
        }
    }

    /// Put a `LIKE` pattern on the query screen
    pub fn set_screen_pattern(&mut self, item: &str, pattern: &str) -> FormResult<()> {
        let name = self.name().to_string();
        match &mut self.form.controllers[self.index].screen {
            Screen::Querying(criteria) => {
                criteria.set(item, Criterion::Like(pattern.to_string()));
                Ok(())
            }
            _ => Err(FormError::InvalidState(format!("{name} is not in query mode"))),
        }
    }

    pub fn commit_insert(&mut self) -> FormResult<()> {
        match &self.state().screen {
            Screen::Inserting(r) => {
                let record = r.clone();
                self.form.execute_insert_at(self.index, record)
            }
            _ => Err(self.no_screen("insert")),
        }
    }

    pub fn commit_update(&mut self) -> FormResult<()> {
        match &self.state().screen {
            Screen::Updating(r) => {
                let record = r.clone();
                self.form.execute_update_at(self.index, record)
            }
            _ => Err(self.no_screen("update")),
        }
    }

    pub fn commit_query(&mut self) -> FormResult<()> {
        match std::mem::replace(&mut self.form.controllers[self.index].screen, Screen::Browsing) {
            Screen::Querying(criteria) => self.form.execute_query_at(self.index, criteria),
            other => {
                self.form.controllers[self.index].screen = other;
                Err(self.no_screen("query"))
            }
        }
    }

    pub fn cancel_insert(&mut self) -> FormResult<()> {
        match &self.state().screen {
            Screen::Inserting(r) => {
                let record = r.clone();
                let name = self.name().to_string();
                self.form.hook(Some(&name), "when_insert_cancelled", |p, ctx| {
                    p.when_insert_cancelled(ctx, &record)
                })?;
                self.form.controllers[self.index].screen = Screen::Browsing;
                Ok(())
            }
            _ => Err(self.no_screen("insert")),
        }
    }

    pub fn cancel_update(&mut self) -> FormResult<()> {
        match &self.state().screen {
            Screen::Updating(r) => {
                let record = r.clone();
                let name = self.name().to_string();
                self.form.hook(Some(&name), "when_update_cancelled", |p, ctx| {
                    p.when_update_cancelled(ctx, &record)
                })?;
                self.form.controllers[self.index].screen = Screen::Browsing;
                Ok(())
            }
            _ => Err(self.no_screen("update")),
        }
    }

    pub fn cancel_query(&mut self) -> FormResult<()> {
        match &self.state().screen {
            Screen::Querying(_) => {
                self.form.controllers[self.index].screen = Screen::Browsing;
                Ok(())
            }
            _ => Err(self.no_screen("query")),
        }
    }

    /// Look up `item` through its LOV: exact match, then prefix match, then picker
    pub fn validate_item_lov(&mut self, item: &str) -> FormResult<LovOutcome> {
        self.form.validate_item_lov_at(self.index, item)
    }

    /// Open the picker for `item` without auto-accepting a single match
    pub fn activate_lov(&mut self, item: &str) -> FormResult<LovOutcome> {
        self.form.activate_lov_at(self.index, item)
    }

    fn no_screen(&self, screen: &str) -> FormError {
        FormError::InvalidState(format!("{} has no open {screen} screen", self.name()))
    }
}

/// Whether the query goes page by page
fn paged(block: &Block, service: &dyn BlockService) -> bool {
    !block.query_all_rows() && service.can_query_in_pages()
}

impl FormController {
    fn refuse_query(&self, idx: usize) -> bool {
        let block = self.controllers[idx].name.clone();
        if self.prevent_masterless_operations(idx) {
            self.notify(Notice::MasterlessOperation { block });
            return true;
        }
        if self.controllers[idx].service.is_none() {
            self.notify(Notice::NoService { block });
            return true;
        }
        false
    }

    pub(crate) fn execute_query_at(&mut self, idx: usize, criteria: QueryCriteria) -> FormResult<()> {
        if self.refuse_query(idx) {
            return Ok(());
        }
        if self.subtree_dirty(idx) {
            self.ask(Some(idx), PendingOperation::Query { criteria });
            return Ok(());
        }
        self.run_query(idx, criteria)
    }

    /// Query without the unsaved-changes check
    pub(crate) fn run_query(&mut self, idx: usize, criteria: QueryCriteria) -> FormResult<()> {
        if self.refuse_query(idx) {
            return Ok(());
        }
        let Some(service) = self.controllers[idx].service.clone() else {
            return Ok(());
        };
        let scope = ConnectionScope::acquire(Arc::clone(&self.connection), "query")?;
        let result = self.query_in_scope(idx, &service, criteria);
        scope.finish(result)
    }

    fn query_in_scope(
        &mut self,
        idx: usize,
        service: &Arc<dyn BlockService>,
        mut criteria: QueryCriteria,
    ) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        let guard = self.controllers[idx].query_guard.clone();
        let Some(in_flight) = guard.try_enter() else {
            log::debug!("Query already running on {name}; ignored");
            return Ok(());
        };

        self.merge_master_criteria(idx, &mut criteria);
        self.hook(Some(&name), "validate_query_criteria", |p, ctx| {
            p.validate_query_criteria(ctx, &criteria)
        })?;
        self.hook(Some(&name), "pre_query", |p, ctx| p.pre_query(ctx, &mut criteria))?;

        self.clear_block_at(idx, true)?;
        let block = self.controllers[idx].block;
        self.blocks[block].set_criteria(criteria);
        let first_page = if paged(&self.blocks[block], service.as_ref()) { 1 } else { 0 };
        let fetched = self.load_page(idx, service, first_page)?;

        let first = self.first_in_order(idx);
        self.set_current(idx, first);
        self.fan_out(idx, &MirrorOp::NewRecordSelected(first));
        drop(in_flight);

        log::info!("Query on {name} fetched {fetched} rows");
        self.cascade_details(idx)
    }

    /// Fetch one page (or all rows when `number` is 0 / the service cannot page) into the block
    fn load_page(&mut self, idx: usize, service: &Arc<dyn BlockService>, number: u32) -> FormResult<usize> {
        let name = self.controllers[idx].name.clone();
        let block = self.controllers[idx].block;
        if let Some(renderer) = &self.controllers[idx].renderer {
            renderer.executing_query(&name);
        }

        let criteria = self.blocks[block].criteria().clone();
        let rows = if number > 0 && paged(&self.blocks[block], service.as_ref()) {
            let size = self.blocks[block].paging().page_size;
            let request = QueryRequest::paged(criteria, PageRequest { number, size });
            let rows = service.execute_query(&self.info, &request)?;
            let paging = self.blocks[block].paging_mut();
            paging.page_number = number;
            paging.has_more_pages = rows.len() >= size as usize && service.has_more_rows();
            rows
        } else {
            let max = self.blocks[block].max_results();
            let mut rows = service.execute_query(&self.info, &QueryRequest::all_rows(criteria, max))?;
            if let Some(max) = max {
                rows.truncate(max);
            }
            let paging = self.blocks[block].paging_mut();
            paging.page_number = 1;
            paging.has_more_pages = false;
            rows
        };

        let records: Vec<Record> = rows
            .into_iter()
            .map(|values| Record::fetched(self.allocate_record_id(), values))
            .collect();
        let records = self.post_process(idx, records)?;
        let fetched = records.len();
        self.blocks[block].populate(records);

        if let Some(renderer) = &self.controllers[idx].renderer {
            renderer.query_executed(&name, self.blocks[block].records());
        }
        self.fan_out(idx, &MirrorOp::QueryExecuted);
        Ok(fetched)
    }

    /// Post-query lookups, then `post_query` per record and `post_block_query`
    fn post_process(&self, idx: usize, mut records: Vec<Record>) -> FormResult<Vec<Record>> {
        let name = self.controllers[idx].name.clone();
        self.apply_post_query_lookups(idx, &mut records)?;
        for record in &mut records {
            self.hook(Some(&name), "post_query", |p, ctx| p.post_query(ctx, record))?;
        }
        self.hook(Some(&name), "post_block_query", |p, ctx| {
            p.post_block_query(ctx, &records)
        })?;
        Ok(records)
    }

    pub(crate) fn change_page_at(&mut self, idx: usize, forward: bool) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        let Some(service) = self.controllers[idx].service.clone() else {
            self.notify(Notice::NoService { block: name });
            return Ok(());
        };
        let block = self.controllers[idx].block;
        let paging = self.blocks[block].paging();
        let can_page = paged(&self.blocks[block], service.as_ref());
        let target = if forward {
            if !can_page || !paging.has_more_pages {
                self.notify(Notice::LastPage { block: name });
                return Ok(());
            }
            paging.page_number + 1
        } else {
            if !can_page || paging.page_number <= 1 {
                self.notify(Notice::FirstPage { block: name });
                return Ok(());
            }
            paging.page_number - 1
        };

        let guard = self.controllers[idx].query_guard.clone();
        let Some(in_flight) = guard.try_enter() else {
            log::debug!("Query already running on {name}; page change ignored");
            return Ok(());
        };
        let scope = ConnectionScope::acquire(Arc::clone(&self.connection), "page")?;
        let result = self.turn_page(idx, &service, target);
        scope.finish(result)?;
        drop(in_flight);

        log::info!("{name} moved to page {target}");
        let first = self.first_in_order(idx);
        self.new_record_instance_at(idx, first)
    }

    /// Visual clear (changes kept off screen), then fetch page `number`
    fn turn_page(&mut self, idx: usize, service: &Arc<dyn BlockService>, number: u32) -> FormResult<usize> {
        let block = self.controllers[idx].block;
        self.blocks[block].clear(false);
        let ctl = &mut self.controllers[idx];
        ctl.current = None;
        if let Some(renderer) = &ctl.renderer {
            renderer.block_cleared(&ctl.name);
        }
        self.fan_out(idx, &MirrorOp::BlockCleared { clear_changes: false });
        self.load_page(idx, service, number)
    }

    pub(crate) fn navigate_at(&mut self, idx: usize, forward: bool) -> FormResult<()> {
        if self.details_dirty(idx) {
            let operation = if forward {
                PendingOperation::NextRecord
            } else {
                PendingOperation::PreviousRecord
            };
            self.ask(Some(idx), operation);
            return Ok(());
        }
        self.navigate_unchecked(idx, forward)
    }

    pub(crate) fn navigate_unchecked(&mut self, idx: usize, forward: bool) -> FormResult<()> {
        match self.step(idx, forward) {
            Some(target) => self.focus_and_cascade(idx, Some(target)),
            None => Ok(()),
        }
    }

    pub(crate) fn create_record_at(&mut self, idx: usize, apply_defaults: bool) -> FormResult<Record> {
        let name = self.controllers[idx].name.clone();
        let values: FieldValues = self.controllers[idx]
            .items
            .iter()
            .map(|item| {
                let value = if apply_defaults {
                    item.default_value.clone().unwrap_or(Value::Null)
                } else {
                    Value::Null
                };
                (item.name.clone(), value)
            })
            .collect();
        let mut record = Record::new_record(self.allocate_record_id(), values);
        self.hook(Some(&name), "initialise_record", |p, ctx| {
            p.initialise_record(ctx, &mut record)
        })?;
        Ok(record)
    }

    pub(crate) fn execute_insert_at(&mut self, idx: usize, record: Record) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        if !self.permitted(idx, self.controllers[idx].permissions.insert, "insert") {
            return Ok(());
        }
        if self.prevent_masterless_operations(idx) {
            self.notify(Notice::MasterlessOperation { block: name });
            return Ok(());
        }
        if self.details_dirty(idx) {
            self.ask(Some(idx), PendingOperation::Insert { record: Box::new(record) });
            return Ok(());
        }
        self.insert_record(idx, record)
    }

    /// Insert without the unsaved-details check
    pub(crate) fn insert_record(&mut self, idx: usize, record: Record) -> FormResult<()> {
        let scope = ConnectionScope::acquire(Arc::clone(&self.connection), "insert")?;
        let result = self.insert_in_scope(idx, record);
        scope.finish(result)
    }

    fn insert_in_scope(&mut self, idx: usize, record: Record) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        let mut record = Record::new_record(record.id(), record.values().clone());
        self.merge_master_values(idx, &mut record);
        self.hook(Some(&name), "validate_record", |p, ctx| {
            p.validate_record(ctx, &record, RecordOperation::Insert)
        })?;
        self.hook(Some(&name), "pre_insert", |p, ctx| p.pre_insert(ctx, &mut record))?;

        let id = record.id();
        let block = self.controllers[idx].block;
        self.blocks[block].push_inserted(record.clone());
        if let Some(renderer) = &self.controllers[idx].renderer {
            renderer.record_inserted(&name, &record);
        }
        self.fan_out(idx, &MirrorOp::RecordInserted(id));
        self.listeners.fire(&FormEvent::NewRecord {
            block: name.clone(),
            record: id,
        });
        if matches!(self.controllers[idx].screen, Screen::Inserting(_)) {
            self.controllers[idx].screen = Screen::Browsing;
        }
        self.focus_and_cascade(idx, Some(id))?;
        self.hook(Some(&name), "post_insert", |p, ctx| p.post_insert(ctx, &record))
    }

    pub(crate) fn execute_update_at(&mut self, idx: usize, record: Record) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        let block = self.controllers[idx].block;
        if !self.blocks[block].contains(&record) {
            return Err(FormError::record_not_found(&name, record.membership_id()));
        }
        let allowed = self.controllers[idx].permissions.update
            || self.blocks[block].is_inserted(record.membership_id());
        if !self.permitted(idx, allowed, "update") {
            return Ok(());
        }
        let scope = ConnectionScope::acquire(Arc::clone(&self.connection), "update")?;
        let result = self.update_in_scope(idx, record);
        scope.finish(result)
    }

    fn update_in_scope(&mut self, idx: usize, mut record: Record) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        self.hook(Some(&name), "validate_record", |p, ctx| {
            p.validate_record(ctx, &record, RecordOperation::Update)
        })?;
        self.hook(Some(&name), "pre_update", |p, ctx| p.pre_update(ctx, &mut record))?;

        let target = record.membership_id();
        let block = self.controllers[idx].block;
        let updated = {
            let base = self.blocks[block]
                .record_mut(target)
                .ok_or_else(|| FormError::record_not_found(&name, target))?;
            base.copy_values_from(&record);
            base.clone()
        };
        self.blocks[block].mark_updated(target);
        if matches!(self.controllers[idx].screen, Screen::Updating(_)) {
            self.controllers[idx].screen = Screen::Browsing;
        }
        self.set_current(idx, Some(target));
        self.hook(Some(&name), "post_update", |p, ctx| p.post_update(ctx, &updated))?;
        self.post_change(idx, &updated);
        Ok(())
    }

    fn post_change(&mut self, idx: usize, record: &Record) {
        let ctl = &self.controllers[idx];
        if let Some(renderer) = &ctl.renderer {
            renderer.refresh_after_change(&ctl.name, record);
        }
        self.fan_out(idx, &MirrorOp::RefreshAfterChange(record.id()));
    }

    pub(crate) fn execute_delete_at(&mut self, idx: usize, id: RecordId) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        let block = self.controllers[idx].block;
        if self.blocks[block].record(id).is_none() {
            return Err(FormError::record_not_found(&name, id));
        }
        if !self.permitted(idx, self.controllers[idx].permissions.delete, "delete") {
            return Ok(());
        }
        for relation in self.detail_relations(idx) {
            let detail = self.relation_index(&relation, true)?;
            if self.blocks[self.controllers[detail].block].is_empty() {
                continue;
            }
            let (_, processor) = self.hooks.resolve(Some(&name));
            let ctx = HookContext::block(&self.info, &name);
            let message = processor
                .master_detail_delete_violation_message(&ctx, &relation.detail)
                .unwrap_or_else(|| {
                    format!("Cannot delete from {name} while {} has records", relation.detail)
                });
            self.notify(Notice::DeleteBlockedByDetails {
                block: name,
                detail: relation.detail,
                message,
            });
            return Ok(());
        }
        let scope = ConnectionScope::acquire(Arc::clone(&self.connection), "delete")?;
        let result = self.delete_in_scope(idx, id);
        scope.finish(result)
    }

    fn delete_in_scope(&mut self, idx: usize, id: RecordId) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        let block = self.controllers[idx].block;
        let record = self.blocks[block]
            .record(id)
            .cloned()
            .ok_or_else(|| FormError::record_not_found(&name, id))?;
        self.hook(Some(&name), "validate_record", |p, ctx| {
            p.validate_record(ctx, &record, RecordOperation::Delete)
        })?;
        self.hook(Some(&name), "pre_delete", |p, ctx| p.pre_delete(ctx, &record))?;

        let next = self
            .neighbour(idx, id, true)
            .or_else(|| self.neighbour(idx, id, false));
        self.blocks[block].remove(id);
        if let Some(renderer) = &self.controllers[idx].renderer {
            renderer.record_deleted(&name, id);
        }
        self.fan_out(idx, &MirrorOp::RecordDeleted { record: id, next });
        self.new_record_instance_at(idx, next)?;
        self.hook(Some(&name), "post_delete", |p, ctx| p.post_delete(ctx, &record))
    }

    pub(crate) fn set_item_value_at(
        &mut self,
        idx: usize,
        id: RecordId,
        item: &str,
        value: Value,
    ) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        let block = self.controllers[idx].block;
        let allowed = self.controllers[idx].permissions.update || self.blocks[block].is_inserted(id);
        if !self.permitted(idx, allowed, "update") {
            return Ok(());
        }
        let records = &mut self.blocks[block];
        records
            .record_mut(id)
            .ok_or_else(|| FormError::record_not_found(&name, id))?
            .set_value(item, value);
        records.mark_updated(id);
        self.listeners.fire(&FormEvent::ValueChanged {
            block: name,
            record: id,
            item: item.to_string(),
        });
        Ok(())
    }

    pub(crate) fn synchronize_at(&mut self, idx: usize) -> FormResult<()> {
        self.sync_renderer(idx)?;
        self.fan_out(idx, &MirrorOp::Synchronize);
        Ok(())
    }

    /// Apply the renderer's pending edits to the screen record or the live records
    pub(crate) fn sync_renderer(&mut self, idx: usize) -> FormResult<()> {
        let ctl = &self.controllers[idx];
        let edits: Vec<FieldEdit> = match &ctl.renderer {
            Some(renderer) => renderer.synchronize(&ctl.name),
            None => return Ok(()),
        };
        for edit in edits {
            if let Some(scratch) = self.controllers[idx]
                .screen
                .record_mut()
                .filter(|r| r.id() == edit.record)
            {
                scratch.set_value(edit.item, edit.value);
                continue;
            }
            self.set_item_value_at(idx, edit.record, &edit.item, edit.value)?;
        }
        Ok(())
    }

    pub(crate) fn enter_insert_at(&mut self, idx: usize, apply_defaults: bool) -> FormResult<()> {
        if !self.permitted(idx, self.controllers[idx].permissions.insert, "insert") {
            return Ok(());
        }
        let mut record = self.create_record_at(idx, apply_defaults)?;
        self.merge_master_values(idx, &mut record);
        self.open_screen(idx, ScreenMode::Inserting, record)
    }

    pub(crate) fn enter_update_at(&mut self, idx: usize) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        if !self.permitted(idx, self.controllers[idx].permissions.update, "update") {
            return Ok(());
        }
        let Some(focused) = self.focused_id(idx) else {
            self.notify(Notice::NoRecordFocused { block: name });
            return Ok(());
        };
        let scratch_id = self.allocate_record_id();
        let block = self.controllers[idx].block;
        let record = self.blocks[block]
            .record(focused)
            .map(|r| r.scratch_copy(scratch_id))
            .ok_or_else(|| FormError::record_not_found(&name, focused))?;
        self.open_screen(idx, ScreenMode::Updating, record)
    }

    fn open_screen(&mut self, idx: usize, mode: ScreenMode, mut record: Record) -> FormResult<()> {
        let name = self.controllers[idx].name.clone();
        self.hook(Some(&name), "pre_open_screen", |p, ctx| {
            p.pre_open_screen(ctx, mode, &mut record)
        })?;
        let ctl = &mut self.controllers[idx];
        if let Some(renderer) = &ctl.renderer {
            if mode == ScreenMode::Inserting {
                renderer.enter_insert(&name, &record);
            } else {
                renderer.enter_update(&name, &record);
            }
        }
        ctl.screen = if mode == ScreenMode::Inserting {
            Screen::Inserting(record)
        } else {
            Screen::Updating(record)
        };
        log::debug!("{name} entered {mode:?} screen");
        Ok(())
    }

    pub(crate) fn enter_query_at(&mut self, idx: usize) -> FormResult<()> {
        let criteria = QueryCriteria::new();
        let ctl = &mut self.controllers[idx];
        if let Some(renderer) = &ctl.renderer {
            renderer.enter_query(&ctl.name, &criteria);
        }
        ctl.screen = Screen::Querying(criteria);
        Ok(())
    }
}
