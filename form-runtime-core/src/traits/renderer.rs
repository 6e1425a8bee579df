//! Rendering layer abstract Trait

use crate::types::{FieldEdit, QueryCriteria, Record, RecordId};

/// Renderer Trait
///
/// How a block is painted is out of scope; the core only tells the renderer what changed
/// and asks it for pending edits and its focus. All methods default to no-ops, and a
/// block without a renderer runs headless (the controller tracks its own current record).
pub trait Renderer: Send + Sync {
    fn record_selected(&self, _block: &str, _record: Option<RecordId>) {}

    fn executing_query(&self, _block: &str) {}

    fn query_executed(&self, _block: &str, _records: &[Record]) {}

    fn record_inserted(&self, _block: &str, _record: &Record) {}

    fn record_deleted(&self, _block: &str, _record: RecordId) {}

    fn refresh_after_change(&self, _block: &str, _record: &Record) {}

    fn enter_insert(&self, _block: &str, _record: &Record) {}

    fn enter_update(&self, _block: &str, _record: &Record) {}

    fn enter_query(&self, _block: &str, _criteria: &QueryCriteria) {}

    fn block_cleared(&self, _block: &str) {}

    /// Pull edits typed on screen but not yet pushed into records
    fn synchronize(&self, _block: &str) -> Vec<FieldEdit> {
        Vec::new()
    }

    /// The record the user is on, if the renderer tracks focus itself
    fn focused_record(&self, _block: &str) -> Option<RecordId> {
        None
    }

    /// Display order (sorted grids); `None` keeps the block's insertion order
    fn display_order(&self, _block: &str) -> Option<Vec<RecordId>> {
        None
    }

    /// Re-run screen validation of an item after an LOV filled it
    fn revalidate_item(&self, _block: &str, _item: &str) {}

    /// Show the LOV picker over its current rows
    fn display_lov(&self, _lov: &str, _records: &[Record]) {}
}
