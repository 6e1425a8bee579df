//! Per-view controller state and the focus/navigation helpers shared by every kind

use std::sync::Arc;

use crate::traits::{BlockService, Renderer};
use crate::types::{
    FormEvent, ItemDefinition, Notice, QueryCriteria, Record, RecordId, ScreenMode,
};
use crate::utils::ReentrancyGuard;

use super::FormController;

/// What a controller may do with its block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// Full lifecycle: query, insert, update, delete
    Editable,
    /// Read-only lookup list
    Lov,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Permissions {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl Permissions {
    pub(crate) const READ_ONLY: Self = Self {
        insert: false,
        update: false,
        delete: false,
    };
}

/// The open screen, holding the scratch state it edits
#[derive(Debug, Clone)]
pub(crate) enum Screen {
    Browsing,
    Inserting(Record),
    Updating(Record),
    Querying(QueryCriteria),
}

impl Screen {
    pub(crate) fn mode(&self) -> ScreenMode {
        match self {
            Self::Browsing => ScreenMode::Browsing,
            Self::Inserting(_) => ScreenMode::Inserting,
            Self::Updating(_) => ScreenMode::Updating,
            Self::Querying(_) => ScreenMode::Querying,
        }
    }

    pub(crate) fn record(&self) -> Option<&Record> {
        match self {
            Self::Inserting(r) | Self::Updating(r) => Some(r),
            Self::Browsing | Self::Querying(_) => None,
        }
    }

    pub(crate) fn record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Self::Inserting(r) | Self::Updating(r) => Some(r),
            Self::Browsing | Self::Querying(_) => None,
        }
    }
}

/// One view over a Block.
///
/// Mirror views share the Block (same index into the form's block arena) but keep their
/// own focus, screen and renderer.
pub struct BlockController {
    pub(crate) name: String,
    pub(crate) block: usize,
    pub(crate) kind: ControllerKind,
    pub(crate) items: Vec<ItemDefinition>,
    pub(crate) permissions: Permissions,
    pub(crate) service: Option<Arc<dyn BlockService>>,
    pub(crate) renderer: Option<Arc<dyn Renderer>>,
    pub(crate) current: Option<RecordId>,
    pub(crate) screen: Screen,
    pub(crate) query_guard: ReentrancyGuard,
    pub(crate) mirror: Option<usize>,
    pub(crate) deferred_pending: bool,
}

impl BlockController {
    pub(crate) fn new(name: String, block: usize, kind: ControllerKind) -> Self {
        Self {
            name,
            block,
            kind,
            items: Vec::new(),
            permissions: Permissions::READ_ONLY,
            service: None,
            renderer: None,
            current: None,
            screen: Screen::Browsing,
            query_guard: ReentrancyGuard::new(),
            mirror: None,
            deferred_pending: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn items(&self) -> &[ItemDefinition] {
        &self.items
    }

    pub fn mode(&self) -> ScreenMode {
        self.screen.mode()
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    pub fn is_query_executing(&self) -> bool {
        !self.query_guard.is_idle()
    }

    /// A deferred detail query is waiting for `ensure_queried`
    pub fn is_query_pending(&self) -> bool {
        self.deferred_pending
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror.is_some()
    }
}

impl FormController {
    /// Focused record: the renderer's view wins, then the controller's own; stale ids are dropped
    pub(crate) fn focused_id(&self, idx: usize) -> Option<RecordId> {
        let ctl = &self.controllers[idx];
        let block = &self.blocks[ctl.block];
        ctl.renderer
            .as_ref()
            .and_then(|r| r.focused_record(&ctl.name))
            .or(ctl.current)
            .filter(|id| block.record(*id).is_some())
    }

    pub(crate) fn display_order(&self, idx: usize) -> Vec<RecordId> {
        let ctl = &self.controllers[idx];
        let block = &self.blocks[ctl.block];
        ctl.renderer
            .as_ref()
            .and_then(|r| r.display_order(&ctl.name))
            .unwrap_or_else(|| block.records().iter().map(Record::id).collect())
    }

    /// Neighbour of `from` in display order
    pub(crate) fn neighbour(&self, idx: usize, from: RecordId, forward: bool) -> Option<RecordId> {
        let order = self.display_order(idx);
        let pos = order.iter().position(|id| *id == from)?;
        if forward {
            order.get(pos + 1).copied()
        } else {
            pos.checked_sub(1).and_then(|p| order.get(p)).copied()
        }
    }

    pub(crate) fn first_in_order(&self, idx: usize) -> Option<RecordId> {
        self.display_order(idx).first().copied()
    }

    /// Move focus without any cascade
    pub(crate) fn set_current(&mut self, idx: usize, record: Option<RecordId>) {
        let block = self.controllers[idx].block;
        let record = record.filter(|id| self.blocks[block].record(*id).is_some());
        let ctl = &mut self.controllers[idx];
        ctl.current = record;
        if let Some(renderer) = &ctl.renderer {
            renderer.record_selected(&ctl.name, record);
        }
        let event = FormEvent::FocusChanged {
            block: ctl.name.clone(),
            record,
        };
        self.listeners.fire(&event);
    }

    /// Move focus by one step in display order
    pub(crate) fn step(&mut self, idx: usize, forward: bool) -> Option<RecordId> {
        let target = match self.focused_id(idx) {
            Some(from) => self.neighbour(idx, from, forward),
            None => self.first_in_order(idx),
        };
        if target.is_none() {
            let block = self.controllers[idx].name.clone();
            self.notify(if forward {
                Notice::LastRecord { block }
            } else {
                Notice::FirstRecord { block }
            });
        }
        target
    }

    pub(crate) fn permitted(&self, idx: usize, allowed: bool, operation: &str) -> bool {
        if !allowed {
            self.notify(Notice::OperationNotAllowed {
                block: self.controllers[idx].name.clone(),
                operation: operation.to_string(),
            });
        }
        allowed
    }
}
