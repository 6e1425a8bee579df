//! `BlockService` over rows held in memory

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use form_runtime_core::error::{FormError, FormResult};
use form_runtime_core::traits::BlockService;
use form_runtime_core::types::{FieldValues, FormInfo, QueryRequest, Record};
use serde_json::Value;

/// In-memory block service
///
/// Filters with the criteria's own matching rules, pages by offset and identifies rows
/// by one key item for update and delete. Suitable for prototypes, demos and tests.
pub struct InMemoryBlockService {
    id: String,
    key: String,
    rows: RwLock<Vec<FieldValues>>,
    pages: bool,
    more_rows: AtomicBool,
}

impl InMemoryBlockService {
    /// Empty service whose rows are identified by `key`
    #[must_use]
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            rows: RwLock::new(Vec::new()),
            pages: true,
            more_rows: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_rows(self, rows: Vec<FieldValues>) -> Self {
        *self.rows.write().unwrap_or_else(PoisonError::into_inner) = rows;
        self
    }

    /// Seed rows from a JSON array of objects
    pub fn with_json_rows(self, json: &str) -> FormResult<Self> {
        let rows: Vec<FieldValues> = serde_json::from_str(json).map_err(|e| FormError::Service {
            service: self.id.clone(),
            message: format!("invalid seed rows: {e}"),
        })?;
        Ok(self.with_rows(rows))
    }

    /// Answer every query in all-rows mode
    #[must_use]
    pub fn without_paging(mut self) -> Self {
        self.pages = false;
        self
    }

    /// Snapshot of the stored rows
    pub fn rows(&self) -> Vec<FieldValues> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn key_of<'a>(&self, row: &'a FieldValues) -> Option<&'a Value> {
        row.get(&self.key).filter(|v| !v.is_null())
    }

    fn error(&self, message: String) -> FormError {
        FormError::Service {
            service: self.id.clone(),
            message,
        }
    }
}

impl BlockService for InMemoryBlockService {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute_query(&self, _form: &FormInfo, request: &QueryRequest) -> FormResult<Vec<FieldValues>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let matching: Vec<&FieldValues> = rows.iter().filter(|r| request.criteria.matches(r)).collect();

        let selected: Vec<FieldValues> = match (request.page, request.max_results) {
            (Some(page), _) if self.pages => {
                let end = page.offset() + page.size as usize;
                self.more_rows.store(matching.len() > end, Ordering::Release);
                matching
                    .into_iter()
                    .skip(page.offset())
                    .take(page.size as usize)
                    .cloned()
                    .collect()
            }
            (_, Some(max)) => matching.into_iter().take(max).cloned().collect(),
            _ => matching.into_iter().cloned().collect(),
        };
        log::debug!("{} query returned {} rows", self.id, selected.len());
        Ok(selected)
    }

    fn can_query_in_pages(&self) -> bool {
        self.pages
    }

    fn has_more_rows(&self) -> bool {
        self.more_rows.load(Ordering::Acquire)
    }

    fn execute_insert(&self, _form: &FormInfo, records: &[Record]) -> FormResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        for record in records {
            if let Some(key) = self.key_of(record.values()) {
                if rows.iter().any(|r| self.key_of(r) == Some(key)) {
                    return Err(self.error(format!("duplicate {} {key}", self.key)));
                }
            }
        }
        rows.extend(records.iter().map(|r| r.values().clone()));
        log::debug!("{} inserted {} rows", self.id, records.len());
        Ok(())
    }

    fn execute_update(&self, _form: &FormInfo, records: &[Record]) -> FormResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        for record in records {
            let key = self
                .key_of(record.values())
                .ok_or_else(|| self.error(format!("update without {}", self.key)))?;
            let row = rows
                .iter_mut()
                .find(|r| self.key_of(r) == Some(key))
                .ok_or_else(|| self.error(format!("no row with {} {key}", self.key)))?;
            *row = record.values().clone();
        }
        log::debug!("{} updated {} rows", self.id, records.len());
        Ok(())
    }

    fn execute_delete(&self, _form: &FormInfo, records: &[Record]) -> FormResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        rows.retain(|r| {
            !records
                .iter()
                .any(|d| self.key_of(d.values()).is_some() && self.key_of(d.values()) == self.key_of(r))
        });
        log::debug!("{} deleted {} rows", self.id, before - rows.len());
        Ok(())
    }
}
