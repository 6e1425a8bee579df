//! Record type definitions

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered item-name -> value map, the entity shape exchanged with block services.
pub type FieldValues = IndexMap<String, Value>;

/// Form-unique record identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A mutable bag of named field values plus lifecycle flags.
///
/// A record with a `base` is a scratch copy of a live record (insert/update screens).
/// Membership checks always go through [`Record::membership_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: RecordId,
    values: FieldValues,
    is_new: bool,
    is_dirty: bool,
    marked_for_delete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    base: Option<RecordId>,
}

impl Record {
    /// Wrap a row fetched from a service
    #[must_use]
    pub fn fetched(id: RecordId, values: FieldValues) -> Self {
        Self {
            id,
            values,
            is_new: false,
            is_dirty: false,
            marked_for_delete: false,
            base: None,
        }
    }

    /// A blank record that has never been persisted
    #[must_use]
    pub fn new_record(id: RecordId, values: FieldValues) -> Self {
        Self {
            is_new: true,
            ..Self::fetched(id, values)
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// The live record this record stands for.
    pub fn membership_id(&self) -> RecordId {
        self.base.unwrap_or(self.id)
    }

    pub fn base(&self) -> Option<RecordId> {
        self.base
    }

    pub fn is_scratch(&self) -> bool {
        self.base.is_some()
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_marked_for_delete(&self) -> bool {
        self.marked_for_delete
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn value(&self, item: &str) -> Option<&Value> {
        self.values.get(item)
    }

    /// Whether the record carries the item at all (null counts as present)
    pub fn has_item(&self, item: &str) -> bool {
        self.values.contains_key(item)
    }

    /// Missing items and JSON nulls are both null
    pub fn is_null(&self, item: &str) -> bool {
        self.values.get(item).map_or(true, Value::is_null)
    }

    /// User-originated edit: marks the record dirty
    pub fn set_value(&mut self, item: impl Into<String>, value: Value) {
        self.values.insert(item.into(), value);
        self.is_dirty = true;
    }

    /// Framework-originated population (query results, LOV display values): leaves flags alone
    pub fn populate(&mut self, item: impl Into<String>, value: Value) {
        self.values.insert(item.into(), value);
    }

    /// A working copy for an update screen
    #[must_use]
    pub fn scratch_copy(&self, id: RecordId) -> Self {
        Self {
            id,
            values: self.values.clone(),
            is_new: self.is_new,
            is_dirty: false,
            marked_for_delete: false,
            base: Some(self.membership_id()),
        }
    }

    /// Copy every value of `other` onto this record and mark it dirty
    pub fn copy_values_from(&mut self, other: &Self) {
        for (item, value) in &other.values {
            self.values.insert(item.clone(), value.clone());
        }
        self.is_dirty = true;
    }

    pub(crate) fn mark_for_delete(&mut self) {
        self.marked_for_delete = true;
    }

    pub(crate) fn mark_saved(&mut self) {
        self.is_new = false;
        self.is_dirty = false;
    }
}
