//! Mirror synchronisation: views sharing one Block stay in step

use crate::error::FormResult;
use crate::types::RecordId;
use crate::utils::ReentrancyGuard;

use super::FormController;

/// A notification fanned out from one view of a Block to its siblings
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MirrorOp {
    BlockCleared { clear_changes: bool },
    NewRecordSelected(Option<RecordId>),
    RecordInserted(RecordId),
    RecordDeleted { record: RecordId, next: Option<RecordId> },
    RefreshAfterChange(RecordId),
    QueryExecuted,
    Synchronize,
}

impl MirrorOp {
    fn kind(&self) -> usize {
        match self {
            Self::BlockCleared { .. } => 0,
            Self::NewRecordSelected(_) => 1,
            Self::RecordInserted(_) => 2,
            Self::RecordDeleted { .. } => 3,
            Self::RefreshAfterChange(_) => 4,
            Self::QueryExecuted => 5,
            Self::Synchronize => 6,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::BlockCleared { .. } => "block-cleared",
            Self::NewRecordSelected(_) => "new-record-selected",
            Self::RecordInserted(_) => "record-inserted",
            Self::RecordDeleted { .. } => "record-deleted",
            Self::RefreshAfterChange(_) => "refresh-after-change",
            Self::QueryExecuted => "query-executed",
            Self::Synchronize => "synchronize",
        }
    }
}

const OP_KINDS: usize = 7;

/// A parent view and its mirror children, with one guard per operation kind
pub(crate) struct MirrorGroup {
    pub parent: usize,
    pub members: Vec<usize>,
    guards: [ReentrancyGuard; OP_KINDS],
}

impl MirrorGroup {
    pub(crate) fn new(parent: usize) -> Self {
        Self {
            parent,
            members: vec![parent],
            guards: Default::default(),
        }
    }

    fn guard(&self, op: &MirrorOp) -> ReentrancyGuard {
        self.guards[op.kind()].clone()
    }
}

impl FormController {
    /// Names of all views sharing the controller's Block, itself included
    pub fn mirror_views(&self, name: &str) -> FormResult<Vec<String>> {
        let idx = self.index_of(name)?;
        Ok(match self.controllers[idx].mirror {
            Some(g) => self.mirrors[g]
                .members
                .iter()
                .map(|m| self.controllers[*m].name.clone())
                .collect(),
            None => vec![self.controllers[idx].name.clone()],
        })
    }

    /// The view owning the shared Block; `None` for views outside any mirror group
    pub fn mirror_parent(&self, name: &str) -> FormResult<Option<&str>> {
        let idx = self.index_of(name)?;
        Ok(self.controllers[idx]
            .mirror
            .map(|g| self.controllers[self.mirrors[g].parent].name.as_str()))
    }

    /// Every view sharing the controller's Block, or just the controller itself
    pub(crate) fn mirror_members(&self, idx: usize) -> Vec<usize> {
        match self.controllers[idx].mirror {
            Some(g) => self.mirrors[g].members.clone(),
            None => vec![idx],
        }
    }

    /// Forward `op` to every sibling of `origin`; best-effort, sibling failures are logged.
    ///
    /// Re-entrant fan-outs of the same kind are dropped while one is running.
    pub(crate) fn fan_out(&mut self, origin: usize, op: &MirrorOp) {
        let Some(group) = self.controllers[origin].mirror else {
            return;
        };
        let guard = self.mirrors[group].guard(op);
        let Some(_running) = guard.try_enter() else {
            log::debug!("Mirror {} already fanning out; skipped", op.label());
            return;
        };
        let siblings: Vec<usize> = self.mirrors[group]
            .members
            .iter()
            .copied()
            .filter(|m| *m != origin)
            .collect();
        for sibling in siblings {
            log::debug!(
                "Mirror {} from {} to {}",
                op.label(),
                self.controllers[origin].name,
                self.controllers[sibling].name
            );
            if let Err(e) = self.apply_mirror_op(sibling, op) {
                log::warn!(
                    "Mirror {} failed on {}: {e}",
                    op.label(),
                    self.controllers[sibling].name
                );
            }
        }
    }

    fn apply_mirror_op(&mut self, idx: usize, op: &MirrorOp) -> FormResult<()> {
        let block = self.controllers[idx].block;
        match op {
            MirrorOp::BlockCleared { clear_changes } => {
                self.clear_details(idx, *clear_changes)?;
                let ctl = &mut self.controllers[idx];
                ctl.current = None;
                if let Some(renderer) = &ctl.renderer {
                    renderer.block_cleared(&ctl.name);
                }
            }
            MirrorOp::NewRecordSelected(record) => {
                self.new_record_instance_at(idx, *record)?;
            }
            MirrorOp::RecordInserted(record) => {
                let ctl = &self.controllers[idx];
                if let (Some(renderer), Some(r)) = (&ctl.renderer, self.blocks[block].record(*record)) {
                    renderer.record_inserted(&ctl.name, r);
                }
            }
            MirrorOp::RecordDeleted { record, next } => {
                let ctl = &self.controllers[idx];
                if let Some(renderer) = &ctl.renderer {
                    renderer.record_deleted(&ctl.name, *record);
                }
                if ctl.current == Some(*record) {
                    self.set_current(idx, *next);
                }
            }
            MirrorOp::RefreshAfterChange(record) => {
                let ctl = &self.controllers[idx];
                if let (Some(renderer), Some(r)) = (&ctl.renderer, self.blocks[block].record(*record)) {
                    renderer.refresh_after_change(&ctl.name, r);
                }
            }
            MirrorOp::QueryExecuted => {
                let ctl = &mut self.controllers[idx];
                ctl.current = None;
                if let Some(renderer) = &ctl.renderer {
                    renderer.query_executed(&ctl.name, self.blocks[block].records());
                }
            }
            MirrorOp::Synchronize => self.synchronize_at(idx)?,
        }
        Ok(())
    }
}
