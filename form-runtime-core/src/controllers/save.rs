//! Form-wide save: masters before details, three phases, one transaction

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::FormResult;
use crate::traits::{BlockService, ConnectionScope};
use crate::types::{DirtyCounts, Notice, Record};

use super::FormController;

#[derive(Clone, Copy)]
enum Phase {
    Insert,
    Update,
    Delete,
}

impl FormController {
    /// Persist every dirty block.
    ///
    /// Inserts and updates run masters first, deletes run details first. Dirty state is
    /// reset only after the connection commits; a failure leaves it untouched.
    pub fn save_changes(&mut self) -> FormResult<()> {
        for idx in 0..self.controllers.len() {
            self.sync_renderer(idx)?;
        }
        let order = self.save_order();
        if order.is_empty() {
            self.notify(Notice::NothingToSave);
            return Ok(());
        }

        let scope = ConnectionScope::acquire(Arc::clone(&self.connection), "save")?;
        let result = self.persist(&order);
        let totals = scope.commit(result)?;

        for block in &order {
            self.blocks[*block].mark_saved();
        }
        log::info!(
            "Saved form {}: {} inserted, {} updated, {} deleted",
            self.info.name,
            totals.inserted,
            totals.updated,
            totals.deleted
        );
        self.notify(Notice::Saved {
            inserted: totals.inserted,
            updated: totals.updated,
            deleted: totals.deleted,
        });
        Ok(())
    }

    /// Dirty block indices, every master ahead of its details
    pub(crate) fn save_order(&self) -> Vec<usize> {
        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        for block in 0..self.blocks.len() {
            self.visit_masters_first(block, &mut visited, &mut ordered);
        }
        ordered
    }

    fn visit_masters_first(&self, block: usize, visited: &mut HashSet<usize>, ordered: &mut Vec<usize>) {
        if !visited.insert(block) {
            return;
        }
        for master in self.master_blocks(block) {
            self.visit_masters_first(master, visited, ordered);
        }
        if self.blocks[block].is_dirty() {
            ordered.push(block);
        }
    }

    fn master_blocks(&self, block: usize) -> Vec<usize> {
        self.relations
            .iter()
            .filter_map(|r| {
                let detail = self.controllers.get(&r.detail)?;
                let master = self.controllers.get(&r.master)?;
                (detail.block == block).then_some(master.block)
            })
            .collect()
    }

    /// Service of the first view over `block` that has one
    fn block_service(&self, block: usize) -> Option<Arc<dyn BlockService>> {
        self.controllers
            .values()
            .filter(|c| c.block == block)
            .find_map(|c| c.service.clone())
    }

    fn persist(&self, order: &[usize]) -> FormResult<DirtyCounts> {
        let mut totals = DirtyCounts::default();
        for phase in [Phase::Insert, Phase::Update] {
            for block in order {
                self.persist_phase(*block, phase, &mut totals)?;
            }
        }
        for block in order.iter().rev() {
            self.persist_phase(*block, Phase::Delete, &mut totals)?;
        }
        Ok(totals)
    }

    fn persist_phase(&self, block: usize, phase: Phase, totals: &mut DirtyCounts) -> FormResult<()> {
        let data = &self.blocks[block];
        let records: Vec<Record> = match phase {
            Phase::Insert => data.dirty_inserts(),
            Phase::Update => data.dirty_updates(),
            Phase::Delete => data.dirty_deletes(),
        };
        if records.is_empty() {
            return Ok(());
        }
        let Some(service) = self.block_service(block) else {
            log::warn!(
                "Block {} has unsaved changes but no service; marking saved",
                data.name()
            );
            return Ok(());
        };
        match phase {
            Phase::Insert => {
                service.execute_insert(&self.info, &records)?;
                totals.inserted += records.len();
            }
            Phase::Update => {
                service.execute_update(&self.info, &records)?;
                totals.updated += records.len();
            }
            Phase::Delete => {
                service.execute_delete(&self.info, &records)?;
                totals.deleted += records.len();
            }
        }
        log::debug!("Persisted {} records in {}", records.len(), data.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::FormError;
    use crate::test_utils::{order_form, OrderForm};
    use crate::types::{Notice, QueryCriteria};

    fn queried() -> OrderForm {
        let mut f = order_form();
        f.form.controller("order").unwrap().execute_query(QueryCriteria::new()).unwrap();
        f
    }

    fn writes(f: &OrderForm) -> Vec<String> {
        f.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.contains(".query("))
            .cloned()
            .collect()
    }

    #[test]
    fn masters_are_inserted_before_details() {
        let mut f = queried();
        let mut order = f.form.controller("order").unwrap();
        let mut record = order.create_record(false).unwrap();
        record.set_value("id", json!(4));
        order.execute_insert(record).unwrap();

        let mut line = f.form.controller("line").unwrap();
        let mut record = line.create_record(false).unwrap();
        record.set_value("id", json!(40));
        line.execute_insert(record).unwrap();

        f.form.save_changes().unwrap();

        assert_eq!(writes(&f), vec!["orders.insert(1)", "lines.insert(1)"]);
        assert_eq!(f.lines.rows().last().unwrap().get("orderId"), Some(&json!(4)));
        assert_eq!(
            f.messenger.notices(),
            vec![Notice::Saved {
                inserted: 2,
                updated: 0,
                deleted: 0
            }]
        );
        assert!(!f.form.is_dirty());
        assert_eq!(f.connection.count("commit"), 1);
    }

    #[test]
    fn details_are_deleted_before_masters() {
        let mut f = queried();
        let third = f.ids("order")[2];
        let mut order = f.form.controller("order").unwrap();
        order.select_record(third).unwrap();
        order.delete_focused().unwrap();
        f.form.controller("line").unwrap().delete_focused().unwrap();

        f.form.save_changes().unwrap();

        assert_eq!(writes(&f), vec!["lines.delete(1)", "orders.delete(1)"]);
        assert_eq!(f.orders.rows().len(), 2);
        assert_eq!(f.lines.rows().len(), 3);
    }

    #[test]
    fn failed_save_rolls_back_and_keeps_changes() {
        let mut f = queried();
        let target = f.ids("line")[0];
        f.form
            .controller("line")
            .unwrap()
            .set_item_value(target, "qty", json!(9))
            .unwrap();
        f.lines.fail_on(Some("update"));

        let err = f.form.save_changes().unwrap_err();

        assert!(matches!(err, FormError::Service { .. }));
        assert_eq!(f.connection.count("rollback"), 1);
        assert_eq!(f.connection.count("commit"), 0);
        assert!(f.form.block("line").unwrap().is_updated(target));
        assert!(f.messenger.notices().is_empty());
    }

    #[test]
    fn failed_commit_keeps_changes() {
        let mut f = queried();
        let target = f.ids("line")[0];
        f.form
            .controller("line")
            .unwrap()
            .set_item_value(target, "qty", json!(9))
            .unwrap();
        f.connection.fail_commit(true);

        assert!(matches!(f.form.save_changes(), Err(FormError::Connection(_))));
        assert!(f.form.is_dirty());
        assert_eq!(f.connection.count("rollback"), 1);
    }

    #[test]
    fn pending_screen_edits_are_saved() {
        let mut f = queried();
        let target = f.ids("line")[1];
        f.line_renderer.type_value(target, "qty", json!(7));

        f.form.save_changes().unwrap();

        assert_eq!(writes(&f), vec!["lines.update(1)"]);
        assert_eq!(f.lines.rows()[1].get("qty"), Some(&json!(7)));
    }

    #[test]
    fn clean_form_has_nothing_to_save() {
        let mut f = queried();
        f.form.save_changes().unwrap();
        assert_eq!(f.messenger.notices(), vec![Notice::NothingToSave]);
        assert!(writes(&f).is_empty());
    }
}
