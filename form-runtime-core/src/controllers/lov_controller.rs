//! Lists of values: lookup validation, picker session and post-query lookups

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::types::{
    FieldValues, HookContext, ItemLovDefinition, LovEvent, LovOutcome, QueryCriteria,
    QueryRequest, Record, RecordId,
};

use super::block_controller::Screen;
use super::{ControllerKind, FormController, HookLevel};

/// Where accepted LOV values are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LovTarget {
    Live(RecordId),
    Screen,
}

/// A picker awaiting the user's choice
#[derive(Debug, Clone, Copy)]
pub(crate) struct LovSession {
    pub item_lov: usize,
    pub block: usize,
    pub lov: usize,
    pub target: LovTarget,
}

/// Read-only handle over a LOV's rows and its open picker
pub struct LovController<'f> {
    form: &'f mut FormController,
    index: usize,
}

impl<'f> LovController<'f> {
    pub(crate) fn new(form: &'f mut FormController, index: usize) -> Self {
        Self { form, index }
    }

    pub fn name(&self) -> &str {
        &self.form.controllers[self.index].name
    }

    pub fn records(&self) -> &[Record] {
        self.form.blocks[self.form.controllers[self.index].block].records()
    }

    /// Whether this LOV's picker is waiting for a choice
    pub fn is_awaiting_choice(&self) -> bool {
        self.form
            .lov_session
            .is_some_and(|s| s.lov == self.index)
    }

    pub fn execute_query(&mut self, criteria: QueryCriteria) -> FormResult<()> {
        self.form.run_query(self.index, criteria)
    }

    /// Accept a picker row: copy the mapped values into the target record
    pub fn choose(&mut self, record: RecordId) -> FormResult<()> {
        self.check_session()?;
        self.form.accept_lov(record)
    }

    /// Close the picker without a choice; the mapped fields are cleared
    pub fn cancel(&mut self) -> FormResult<()> {
        self.check_session()?;
        self.form.cancel_lov()
    }

    fn check_session(&self) -> FormResult<()> {
        if self.is_awaiting_choice() {
            Ok(())
        } else {
            Err(FormError::InvalidState(format!(
                "LOV {} has no open picker",
                self.name()
            )))
        }
    }
}

/// Handle binding one block item to its LOV
pub struct ItemLovController<'f> {
    form: &'f mut FormController,
    block: usize,
    item_lov: usize,
}

impl<'f> ItemLovController<'f> {
    pub fn definition(&self) -> &ItemLovDefinition {
        &self.form.item_lovs[self.item_lov]
    }

    /// Exact lookup, then prefix lookup, then picker
    pub fn validate(&mut self) -> FormResult<LovOutcome> {
        let item = self.definition().item.clone();
        self.form.validate_item_lov_at(self.block, &item)
    }

    /// Picker without auto-accept
    pub fn activate(&mut self) -> FormResult<LovOutcome> {
        let item = self.definition().item.clone();
        self.form.activate_lov_at(self.block, &item)
    }
}

impl FormController {
    /// Handle for the LOV bound to `block.item`
    pub fn item_lov(&mut self, block: &str, item: &str) -> FormResult<ItemLovController<'_>> {
        let block = self.index_of(block)?;
        let item_lov = self.item_lov_index(block, item)?;
        Ok(ItemLovController {
            form: self,
            block,
            item_lov,
        })
    }

    fn item_lov_index(&self, idx: usize, item: &str) -> FormResult<usize> {
        let name = &self.controllers[idx].name;
        self.item_lovs
            .iter()
            .position(|d| &d.block == name && d.item == item)
            .ok_or_else(|| FormError::LovNotFound(format!("{name}.{item}")))
    }

    fn lov_index(&self, name: &str) -> FormResult<usize> {
        self.controllers
            .get_index_of(name)
            .filter(|i| self.controllers[*i].kind == ControllerKind::Lov)
            .ok_or_else(|| FormError::LovNotFound(name.to_string()))
    }

    fn lov_target(&self, idx: usize) -> FormResult<LovTarget> {
        match &self.controllers[idx].screen {
            Screen::Inserting(_) | Screen::Updating(_) => Ok(LovTarget::Screen),
            Screen::Browsing | Screen::Querying(_) => self
                .focused_id(idx)
                .map(LovTarget::Live)
                .ok_or_else(|| {
                    FormError::InvalidState(format!(
                        "{} has no record to receive LOV values",
                        self.controllers[idx].name
                    ))
                }),
        }
    }

    fn target_value(&self, idx: usize, target: LovTarget, item: &str) -> Value {
        let record = match target {
            LovTarget::Screen => self.controllers[idx].screen.record(),
            LovTarget::Live(id) => self.blocks[self.controllers[idx].block].record(id),
        };
        record
            .and_then(|r| r.value(item))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn write_target(&mut self, idx: usize, target: LovTarget, item: &str, value: Value) -> FormResult<()> {
        match target {
            LovTarget::Live(id) => self.set_item_value_at(idx, id, item, value),
            LovTarget::Screen => {
                let ctl = &mut self.controllers[idx];
                let scratch = ctl.screen.record_mut().ok_or_else(|| {
                    FormError::InvalidState(format!("{} screen closed during LOV", ctl.name))
                })?;
                scratch.set_value(item, value);
                Ok(())
            }
        }
    }

    fn clear_lov_targets(&mut self, idx: usize, target: LovTarget, def: &ItemLovDefinition) -> FormResult<()> {
        for mapping in &def.mappings {
            self.write_target(idx, target, &mapping.block_item, Value::Null)?;
        }
        Ok(())
    }

    /// Notify the LOV level and the block-or-form level
    fn lov_hooks(&self, event: &LovEvent, completed: Option<bool>) -> FormResult<()> {
        for (level, processor) in self.hooks.lov_notification_targets(&event.lov, &event.block) {
            let ctx = match level {
                HookLevel::Lov => HookContext::block(&self.info, &event.lov),
                HookLevel::Block => HookContext::block(&self.info, &event.block),
                HookLevel::Form => HookContext::form(&self.info),
            };
            let (hook, result) = match completed {
                None => ("lov_activated", processor.lov_activated(&ctx, event)),
                Some(chosen) => ("lov_completed", processor.lov_completed(&ctx, event, chosen)),
            };
            result.map_err(|e| FormError::from_hook(hook, e))?;
        }
        Ok(())
    }

    fn lov_event(&self, def: &ItemLovDefinition) -> LovEvent {
        LovEvent {
            lov: def.lov.clone(),
            block: def.block.clone(),
            item: def.item.clone(),
        }
    }

    /// Open a picker session and fire `lov_activated`
    fn start_lov(&mut self, idx: usize, item: &str) -> FormResult<(ItemLovDefinition, LovSession, Value)> {
        let item_lov = self.item_lov_index(idx, item)?;
        let def = self.item_lovs[item_lov].clone();
        let lov = self.lov_index(&def.lov)?;
        let target = self.lov_target(idx)?;
        let value = self.target_value(idx, target, &def.item);
        self.lov_hooks(&self.lov_event(&def), None)?;
        let session = LovSession {
            item_lov,
            block: idx,
            lov,
            target,
        };
        self.lov_session = Some(session);
        Ok((def, session, value))
    }

    pub(crate) fn validate_item_lov_at(&mut self, idx: usize, item: &str) -> FormResult<LovOutcome> {
        let item_lov = self.item_lov_index(idx, item)?;
        let target = self.lov_target(idx)?;
        if is_blank(&self.target_value(idx, target, item)) {
            let def = self.item_lovs[item_lov].clone();
            self.clear_lov_targets(idx, target, &def)?;
            return Ok(LovOutcome::Cleared);
        }

        let (def, session, value) = self.start_lov(idx, item)?;
        let column = def
            .lookup_column()
            .ok_or_else(|| {
                FormError::Configuration(format!("LOV {} has no lookup column for {item}", def.lov))
            })?
            .to_string();

        self.run_query(session.lov, QueryCriteria::new().with_equals(column.clone(), value.clone()))?;
        if let Some(outcome) = self.settle_lov(session.lov, false)? {
            return Ok(outcome);
        }
        log::debug!("No exact {} match for {item}; trying prefix", def.lov);
        self.run_query(
            session.lov,
            QueryCriteria::new().with_like(column, format!("{}%", value_text(&value))),
        )?;
        self.settle_lov(session.lov, true)
            .map(|outcome| outcome.unwrap_or(LovOutcome::PickerDisplayed { rows: 0 }))
    }

    pub(crate) fn activate_lov_at(&mut self, idx: usize, item: &str) -> FormResult<LovOutcome> {
        let (def, session, value) = self.start_lov(idx, item)?;
        let criteria = match def.lookup_column() {
            Some(column) if !is_blank(&value) => {
                QueryCriteria::new().with_like(column, format!("{}%", value_text(&value)))
            }
            _ => QueryCriteria::new(),
        };
        self.run_query(session.lov, criteria)?;
        let rows = self.display_lov(session.lov);
        Ok(LovOutcome::PickerDisplayed { rows })
    }

    /// One row accepts; zero rows wait for the next stage unless this is the last one
    fn settle_lov(&mut self, lov: usize, last_stage: bool) -> FormResult<Option<LovOutcome>> {
        let block = &self.blocks[self.controllers[lov].block];
        match (block.len(), block.first_id()) {
            (1, Some(id)) => {
                self.accept_lov(id)?;
                Ok(Some(LovOutcome::Accepted))
            }
            (0, _) if !last_stage => Ok(None),
            _ => {
                let rows = self.display_lov(lov);
                Ok(Some(LovOutcome::PickerDisplayed { rows }))
            }
        }
    }

    /// Show the picker through the LOV's renderer, or the target block's
    fn display_lov(&self, lov: usize) -> usize {
        let ctl = &self.controllers[lov];
        let records = self.blocks[ctl.block].records();
        let renderer = ctl.renderer.as_ref().or_else(|| {
            self.lov_session
                .as_ref()
                .and_then(|s| self.controllers[s.block].renderer.as_ref())
        });
        if let Some(renderer) = renderer {
            renderer.display_lov(&ctl.name, records);
        }
        log::debug!("LOV {} picker shows {} rows", ctl.name, records.len());
        records.len()
    }

    pub(crate) fn accept_lov(&mut self, record: RecordId) -> FormResult<()> {
        let session = self
            .lov_session
            .take()
            .ok_or_else(|| FormError::InvalidState("no LOV is awaiting a choice".to_string()))?;
        let def = self.item_lovs[session.item_lov].clone();
        let chosen = self.blocks[self.controllers[session.lov].block]
            .record(record)
            .cloned()
            .ok_or_else(|| FormError::record_not_found(&def.lov, record))?;

        for mapping in &def.mappings {
            let value = chosen.value(&mapping.lov_item).cloned().unwrap_or(Value::Null);
            self.write_target(session.block, session.target, &mapping.block_item, value)?;
        }
        let ctl = &self.controllers[session.block];
        if let Some(renderer) = &ctl.renderer {
            for mapping in &def.mappings {
                renderer.revalidate_item(&ctl.name, &mapping.block_item);
            }
        }
        log::debug!("LOV {} accepted {record} for {}.{}", def.lov, def.block, def.item);
        self.lov_hooks(&self.lov_event(&def), Some(true))
    }

    pub(crate) fn cancel_lov(&mut self) -> FormResult<()> {
        let session = self
            .lov_session
            .take()
            .ok_or_else(|| FormError::InvalidState("no LOV is awaiting a choice".to_string()))?;
        let def = self.item_lovs[session.item_lov].clone();
        self.clear_lov_targets(session.block, session.target, &def)?;
        self.lov_hooks(&self.lov_event(&def), Some(false))
    }

    /// Fill display items of freshly fetched records from their LOVs.
    ///
    /// Lookups are cached for the duration of one query, keyed by service and criteria,
    /// so repeated foreign-key values hit the service once.
    pub(crate) fn apply_post_query_lookups(&self, idx: usize, records: &mut [Record]) -> FormResult<()> {
        let name = &self.controllers[idx].name;
        let mut cache: HashMap<(String, String), Option<FieldValues>> = HashMap::new();

        for def in self
            .item_lovs
            .iter()
            .filter(|d| &d.block == name && d.post_query_lookup)
        {
            let Some(service) = self
                .controllers
                .get(&def.lov)
                .and_then(|c| c.service.clone())
            else {
                continue;
            };
            let Some(column) = def.lookup_column() else {
                continue;
            };

            for record in records.iter_mut() {
                let Some(key_value) = record.value(&def.item).filter(|v| !v.is_null()).cloned() else {
                    continue;
                };
                let criteria = QueryCriteria::new().with_equals(column, key_value);
                let row = match cache.entry((service.id().to_string(), criteria.cache_key())) {
                    Entry::Occupied(hit) => hit.get().clone(),
                    Entry::Vacant(slot) => {
                        let rows = service
                            .execute_query(&self.info, &QueryRequest::all_rows(criteria, Some(1)))?;
                        slot.insert(rows.into_iter().next()).clone()
                    }
                };
                let Some(row) = row else {
                    continue;
                };
                for mapping in def.mappings.iter().filter(|m| m.block_item != def.item) {
                    if !record.has_item(&mapping.block_item) {
                        continue;
                    }
                    if let Some(value) = row.get(&mapping.lov_item) {
                        record.populate(mapping.block_item.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::error::FormError;
    use crate::test_utils::{order_form, OrderForm};
    use crate::types::{LovOutcome, QueryCriteria};

    fn typed(value: Value) -> OrderForm {
        let mut f = order_form();
        f.form.controller("order").unwrap().execute_query(QueryCriteria::new()).unwrap();
        let target = f.ids("line")[0];
        f.form
            .controller("line")
            .unwrap()
            .set_item_value(target, "productId", value)
            .unwrap();
        f
    }

    fn focused_value(f: &OrderForm, item: &str) -> Value {
        let id = f.focused("line").unwrap();
        f.form.block("line").unwrap().record(id).unwrap().value(item).cloned().unwrap_or(Value::Null)
    }

    #[test]
    fn post_query_lookup_fills_names_with_one_call_per_key() {
        let f = typed(json!(7));
        assert_eq!(
            f.values("line", "productName"),
            vec![json!("Bolt"), json!("Bolt"), json!("Nut")]
        );
        assert_eq!(f.products.query_count(), 2);
    }

    #[test]
    fn exact_match_is_accepted() {
        let mut f = typed(json!(8));
        let outcome = f.form.item_lov("line", "productId").unwrap().validate().unwrap();

        assert_eq!(outcome, LovOutcome::Accepted);
        assert_eq!(focused_value(&f, "productName"), json!("Nut"));
        assert_eq!(f.line_renderer.count("revalidate_item"), 2);
        assert_eq!(f.processor.count("lov_activated"), 1);
        assert_eq!(f.processor.count("lov_completed"), 1);
        assert!(!f.form.lov("products").unwrap().is_awaiting_choice());
    }

    #[test]
    fn unique_prefix_match_is_accepted() {
        let mut f = typed(json!("90"));
        let outcome = f.form.controller("line").unwrap().validate_item_lov("productId").unwrap();

        assert_eq!(outcome, LovOutcome::Accepted);
        assert_eq!(focused_value(&f, "productId"), json!(905));
        assert_eq!(focused_value(&f, "productName"), json!("Washer"));
    }

    #[test]
    fn ambiguous_prefix_opens_the_picker() {
        let mut f = typed(json!("15"));
        let outcome = f.form.controller("line").unwrap().validate_item_lov("productId").unwrap();
        assert_eq!(outcome, LovOutcome::PickerDisplayed { rows: 2 });
        assert_eq!(f.line_renderer.count("display_lov:products:2"), 1);

        let mut lov = f.form.lov("products").unwrap();
        assert!(lov.is_awaiting_choice());
        let pin = lov
            .records()
            .iter()
            .find(|r| r.value("name") == Some(&json!("Hinge pin")))
            .unwrap()
            .id();
        lov.choose(pin).unwrap();

        assert_eq!(focused_value(&f, "productId"), json!(151));
        assert_eq!(focused_value(&f, "productName"), json!("Hinge pin"));
    }

    #[test]
    fn no_match_shows_an_empty_picker_and_cancel_clears() {
        let mut f = typed(json!("99"));
        let outcome = f.form.controller("line").unwrap().validate_item_lov("productId").unwrap();
        assert_eq!(outcome, LovOutcome::PickerDisplayed { rows: 0 });

        f.form.lov("products").unwrap().cancel().unwrap();

        assert_eq!(focused_value(&f, "productId"), Value::Null);
        assert_eq!(focused_value(&f, "productName"), Value::Null);
        assert_eq!(f.processor.count("lov_cancelled"), 1);
    }

    #[test]
    fn blank_value_clears_the_mapped_items() {
        let mut f = typed(Value::Null);
        let outcome = f.form.controller("line").unwrap().validate_item_lov("productId").unwrap();

        assert_eq!(outcome, LovOutcome::Cleared);
        assert_eq!(focused_value(&f, "productName"), Value::Null);
        assert_eq!(f.processor.count("lov_activated"), 0);
    }

    #[test]
    fn activate_lists_every_row_for_a_blank_item() {
        let mut f = typed(Value::Null);
        let outcome = f.form.controller("line").unwrap().activate_lov("productId").unwrap();
        assert_eq!(outcome, LovOutcome::PickerDisplayed { rows: 5 });
        assert!(f.form.lov("products").unwrap().is_awaiting_choice());
    }

    #[test]
    fn lov_values_go_to_the_open_insert_screen() {
        let mut f = typed(json!(7));
        let mut line = f.form.controller("line").unwrap();
        line.enter_insert(false).unwrap();
        line.set_screen_value("productId", json!(8)).unwrap();
        assert_eq!(line.validate_item_lov("productId").unwrap(), LovOutcome::Accepted);

        assert_eq!(line.screen_record().unwrap().value("productName"), Some(&json!("Nut")));
        assert_eq!(line.block().len(), 3);
    }

    #[test]
    fn choosing_without_a_picker_is_invalid() {
        let mut f = order_form();
        let err = f.form.lov("products").unwrap().choose(crate::types::RecordId(1)).unwrap_err();
        assert!(matches!(err, FormError::InvalidState(_)));
        assert!(matches!(f.form.lov("line"), Err(FormError::LovNotFound(_))));
        assert!(matches!(f.form.controller("products"), Err(FormError::InvalidState(_))));
    }
}
