//! Block record set

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;

use super::{QueryCriteria, Record, RecordId};

/// Paging cursor of a block.
///
/// In paged mode `page_number` is 0 after a clear; the first fetch moves it to page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub page_number: u32,
    pub page_size: u32,
    pub has_more_pages: bool,
}

/// Counts of pending changes in a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtyCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// The record set for one entity on a form.
///
/// Live records keep insertion order, which is also the default display order.
/// A record id appears in at most one of `inserted`, `updated` and `deleted`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    name: String,
    /// Items identifying the underlying entity; empty when rows cannot be matched across fetches
    key_items: Vec<String>,
    records: Vec<Record>,
    /// Dirty records dropped from view by a paging clear, kept until saved
    offscreen: Vec<Record>,
    inserted: IndexSet<RecordId>,
    updated: IndexSet<RecordId>,
    deleted: Vec<Record>,
    criteria: QueryCriteria,
    paging: Paging,
    query_all_rows: bool,
    max_results: Option<usize>,
}

impl Block {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        page_size: u32,
        query_all_rows: bool,
        max_results: Option<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            key_items: Vec::new(),
            records: Vec::new(),
            offscreen: Vec::new(),
            inserted: IndexSet::new(),
            updated: IndexSet::new(),
            deleted: Vec::new(),
            criteria: QueryCriteria::new(),
            paging: Paging {
                page_number: 0,
                page_size: page_size.max(1),
                has_more_pages: false,
            },
            query_all_rows,
            max_results,
        }
    }

    #[must_use]
    pub fn with_key(mut self, items: Vec<String>) -> Self {
        self.key_items = items;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_items(&self) -> &[String] {
        &self.key_items
    }

    /// Entity key of a record, `None` when unkeyed or any key item is null
    fn key_of(&self, record: &Record) -> Option<Vec<Value>> {
        if self.key_items.is_empty() {
            return None;
        }
        self.key_items
            .iter()
            .map(|item| record.value(item).filter(|v| !v.is_null()).cloned())
            .collect()
    }

    // ===== Live records =====

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn record_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    /// Membership check; scratch copies resolve through their base record
    pub fn contains(&self, record: &Record) -> bool {
        self.position(record.membership_id()).is_some()
    }

    pub fn first_id(&self) -> Option<RecordId> {
        self.records.first().map(Record::id)
    }

    pub fn last_id(&self) -> Option<RecordId> {
        self.records.last().map(Record::id)
    }

    pub fn id_after(&self, id: RecordId) -> Option<RecordId> {
        let pos = self.position(id)?;
        self.records.get(pos + 1).map(Record::id)
    }

    pub fn id_before(&self, id: RecordId) -> Option<RecordId> {
        let pos = self.position(id)?;
        pos.checked_sub(1)
            .and_then(|p| self.records.get(p))
            .map(Record::id)
    }

    /// Replace the visible rows with freshly fetched ones.
    ///
    /// A fetched row whose entity still has a pending change off screen is replaced by the
    /// pending record; rows awaiting delete stay hidden.
    pub(crate) fn populate(&mut self, rows: Vec<Record>) {
        if self.offscreen.is_empty() && self.deleted.is_empty() {
            self.records = rows;
            return;
        }
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(key) = self.key_of(&row) else {
                records.push(row);
                continue;
            };
            if self.deleted.iter().any(|r| self.key_of(r).as_ref() == Some(&key)) {
                continue;
            }
            let pending = self
                .offscreen
                .iter()
                .position(|r| self.key_of(r).as_ref() == Some(&key));
            match pending {
                Some(pos) => records.push(self.offscreen.remove(pos)),
                None => records.push(row),
            }
        }
        self.records = records;
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    // ===== Mutations =====

    /// Append a new record to the live list and the `inserted` set
    pub(crate) fn push_inserted(&mut self, record: Record) {
        self.inserted.insert(record.id());
        self.records.push(record);
    }

    /// Track a live record as updated; new records stay in `inserted`
    pub(crate) fn mark_updated(&mut self, id: RecordId) {
        if !self.inserted.contains(&id) {
            self.updated.insert(id);
        }
    }

    /// Remove a record from the live list.
    ///
    /// A new record is discarded; a persisted record moves to `deleted`.
    /// Returns the removed record and the position it occupied.
    pub(crate) fn remove(&mut self, id: RecordId) -> Option<(Record, usize)> {
        let pos = self.position(id)?;
        let mut record = self.records.remove(pos);
        self.updated.shift_remove(&id);
        if !self.inserted.shift_remove(&id) {
            record.mark_for_delete();
            self.deleted.push(record.clone());
        }
        Some((record, pos))
    }

    /// Drop the visible rows.
    ///
    /// With `clear_changes == false` the pending change sets survive and dirty rows move
    /// off screen until the next save.
    pub(crate) fn clear(&mut self, clear_changes: bool) {
        if clear_changes {
            self.records.clear();
            self.discard_changes();
        } else {
            let (dirty, _): (Vec<Record>, Vec<Record>) = std::mem::take(&mut self.records)
                .into_iter()
                .partition(|r| self.inserted.contains(&r.id()) || self.updated.contains(&r.id()));
            self.offscreen.extend(dirty);
        }
        self.paging.page_number = 0;
        self.paging.has_more_pages = false;
    }

    /// Forget every pending change without touching the visible rows' values
    pub(crate) fn discard_changes(&mut self) {
        self.offscreen.clear();
        self.inserted.clear();
        self.updated.clear();
        self.deleted.clear();
    }

    // ===== Dirty tracking =====

    pub fn is_dirty(&self) -> bool {
        !self.inserted.is_empty() || !self.updated.is_empty() || !self.deleted.is_empty()
    }

    pub fn dirty_counts(&self) -> DirtyCounts {
        DirtyCounts {
            inserted: self.inserted.len(),
            updated: self.updated.len(),
            deleted: self.deleted.len(),
        }
    }

    pub fn is_inserted(&self, id: RecordId) -> bool {
        self.inserted.contains(&id)
    }

    pub fn is_updated(&self, id: RecordId) -> bool {
        self.updated.contains(&id)
    }

    pub fn deleted(&self) -> &[Record] {
        &self.deleted
    }

    fn pending(&self, id: RecordId) -> Option<&Record> {
        self.record(id)
            .or_else(|| self.offscreen.iter().find(|r| r.id() == id))
    }

    /// Snapshot of the records awaiting insert, in insertion order
    pub fn dirty_inserts(&self) -> Vec<Record> {
        self.inserted
            .iter()
            .filter_map(|id| self.pending(*id).cloned())
            .collect()
    }

    /// Snapshot of the records awaiting update
    pub fn dirty_updates(&self) -> Vec<Record> {
        self.updated
            .iter()
            .filter_map(|id| self.pending(*id).cloned())
            .collect()
    }

    /// Snapshot of the records awaiting delete
    pub fn dirty_deletes(&self) -> Vec<Record> {
        self.deleted.clone()
    }

    /// Called after a successful save: every change set empties and flags reset
    pub(crate) fn mark_saved(&mut self) {
        for record in &mut self.records {
            if self.inserted.contains(&record.id()) || self.updated.contains(&record.id()) {
                record.mark_saved();
            }
        }
        self.discard_changes();
    }

    // ===== Query state =====

    pub fn criteria(&self) -> &QueryCriteria {
        &self.criteria
    }

    pub(crate) fn set_criteria(&mut self, criteria: QueryCriteria) {
        self.criteria = criteria;
    }

    pub fn paging(&self) -> Paging {
        self.paging
    }

    pub(crate) fn paging_mut(&mut self) -> &mut Paging {
        &mut self.paging
    }

    pub fn query_all_rows(&self) -> bool {
        self.query_all_rows
    }

    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }
}
