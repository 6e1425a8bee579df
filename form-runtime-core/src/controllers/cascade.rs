//! Master/detail relations: join values, masterless guard and detail cascade

use crate::error::{FormError, FormResult};
use crate::types::{
    Criterion, FieldValues, PendingOperation, QueryCriteria, Record, RecordId, RelationDefinition,
};

use super::mirror::MirrorOp;
use super::FormController;

impl FormController {
    /// Relations in which the controller at `idx` is the master
    pub(crate) fn detail_relations(&self, idx: usize) -> Vec<RelationDefinition> {
        let name = &self.controllers[idx].name;
        self.relations
            .iter()
            .filter(|r| &r.master == name)
            .cloned()
            .collect()
    }

    /// The one relation in which the controller at `idx` is the detail
    pub(crate) fn master_relation(&self, idx: usize) -> Option<&RelationDefinition> {
        let name = &self.controllers[idx].name;
        self.relations.iter().find(|r| &r.detail == name)
    }

    pub(crate) fn relation_index(&self, relation: &RelationDefinition, detail: bool) -> FormResult<usize> {
        let name = if detail { &relation.detail } else { &relation.master };
        self.controllers
            .get_index_of(name)
            .ok_or_else(|| FormError::RelationNotFound(format!("{} -> {}", relation.master, relation.detail)))
    }

    /// Detail join values taken from the master's focused record; `None` when there is no
    /// focused record or any join value is null
    pub(crate) fn join_values(&self, relation: &RelationDefinition) -> Option<FieldValues> {
        let master = self.controllers.get_index_of(&relation.master)?;
        let focused = self.focused_id(master)?;
        let record = self.blocks[self.controllers[master].block].record(focused)?;
        let mut values = FieldValues::new();
        for join in &relation.joins {
            let value = record.value(&join.master_item).filter(|v| !v.is_null())?;
            values.insert(join.detail_item.clone(), value.clone());
        }
        Some(values)
    }

    /// A detail may not query or insert without a usable master record
    pub(crate) fn prevent_masterless_operations(&self, idx: usize) -> bool {
        self.master_relation(idx)
            .is_some_and(|relation| self.join_values(relation).is_none())
    }

    /// Add the master's join values to `criteria` as equality terms
    pub(crate) fn merge_master_criteria(&self, idx: usize, criteria: &mut QueryCriteria) {
        let Some(values) = self.master_relation(idx).and_then(|r| self.join_values(r)) else {
            return;
        };
        for (item, value) in values {
            criteria.set(item, Criterion::Equals(value));
        }
    }

    /// Copy the master's join values into a record being inserted
    pub(crate) fn merge_master_values(&self, idx: usize, record: &mut Record) {
        let Some(values) = self.master_relation(idx).and_then(|r| self.join_values(r)) else {
            return;
        };
        for (item, value) in values {
            record.populate(item, value);
        }
    }

    /// Unsaved changes anywhere below `idx` in the relation tree.
    ///
    /// Relations hang off the view that declares them, so every view sharing the Block is
    /// checked: a mirror moves the same focus as its parent.
    pub(crate) fn details_dirty(&self, idx: usize) -> bool {
        let masters = self.mirror_members(idx);
        self.relations
            .iter()
            .filter(|r| masters.iter().any(|m| r.master == self.controllers[*m].name))
            .filter_map(|r| self.controllers.get_index_of(&r.detail))
            .any(|d| self.subtree_dirty(d))
    }

    /// Unsaved changes in the block at `idx` or below it
    pub(crate) fn subtree_dirty(&self, idx: usize) -> bool {
        self.blocks[self.controllers[idx].block].is_dirty() || self.details_dirty(idx)
    }

    /// Focus change entry point, deferred behind a question when a detail holds unsaved
    /// changes.
    ///
    /// A query sets focus directly and cascades once it has released its guard.
    pub(crate) fn new_record_instance_at(&mut self, idx: usize, record: Option<RecordId>) -> FormResult<()> {
        if record != self.focused_id(idx) && self.details_dirty(idx) {
            self.ask(Some(idx), PendingOperation::FocusRecord { record });
            return Ok(());
        }
        self.focus_and_cascade(idx, record)
    }

    pub(crate) fn focus_and_cascade(&mut self, idx: usize, record: Option<RecordId>) -> FormResult<()> {
        self.set_current(idx, record);
        self.fan_out(idx, &MirrorOp::NewRecordSelected(record));
        self.cascade_details(idx)
    }

    /// Re-synchronise every detail with the master's focused record
    pub(crate) fn cascade_details(&mut self, idx: usize) -> FormResult<()> {
        for relation in self.detail_relations(idx) {
            let detail = self.relation_index(&relation, true)?;
            let masterless = self.join_values(&relation).is_none();
            self.clear_block_at(detail, true)?;
            if masterless {
                log::debug!("{} has no master record; left empty", relation.detail);
            } else if !relation.auto_query {
                log::debug!("{} is queried manually", relation.detail);
            } else if relation.deferred_query {
                log::debug!("{} query deferred until the block is entered", relation.detail);
                self.controllers[detail].deferred_pending = true;
            } else {
                self.run_query(detail, QueryCriteria::new())?;
            }
        }
        Ok(())
    }

    /// Run a deferred detail query, if one is pending
    pub(crate) fn ensure_queried_at(&mut self, idx: usize) -> FormResult<bool> {
        if !self.controllers[idx].deferred_pending {
            return Ok(false);
        }
        self.run_query(idx, QueryCriteria::new())?;
        Ok(true)
    }

    /// Clear a block and, first, everything below it
    pub(crate) fn clear_block_at(&mut self, idx: usize, clear_changes: bool) -> FormResult<()> {
        self.clear_details(idx, clear_changes)?;
        let block = self.controllers[idx].block;
        self.blocks[block].clear(clear_changes);
        let ctl = &mut self.controllers[idx];
        ctl.current = None;
        ctl.deferred_pending = false;
        if let Some(renderer) = &ctl.renderer {
            renderer.block_cleared(&ctl.name);
        }
        self.fan_out(idx, &MirrorOp::BlockCleared { clear_changes });
        Ok(())
    }

    pub(crate) fn clear_details(&mut self, idx: usize, clear_changes: bool) -> FormResult<()> {
        for relation in self.detail_relations(idx) {
            let detail = self.relation_index(&relation, true)?;
            self.clear_block_at(detail, clear_changes)?;
        }
        Ok(())
    }
}
