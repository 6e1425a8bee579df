//! Action processor registry and three-level dispatch

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{ActionProcessor, NoopActionProcessor};

/// Which registration answered a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookLevel {
    Lov,
    Block,
    Form,
}

/// Typed registry mapping form/block/LOV identity to a handler instance.
///
/// Lookup order is LOV -> block -> form; exactly one level answers.
pub struct HookRegistry {
    form: Arc<dyn ActionProcessor>,
    blocks: HashMap<String, Arc<dyn ActionProcessor>>,
    lovs: HashMap<String, Arc<dyn ActionProcessor>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NoopActionProcessor))
    }
}

impl HookRegistry {
    #[must_use]
    pub fn new(form: Arc<dyn ActionProcessor>) -> Self {
        Self {
            form,
            blocks: HashMap::new(),
            lovs: HashMap::new(),
        }
    }

    pub fn register_block(&mut self, block: impl Into<String>, processor: Arc<dyn ActionProcessor>) {
        self.blocks.insert(block.into(), processor);
    }

    pub fn register_lov(&mut self, lov: impl Into<String>, processor: Arc<dyn ActionProcessor>) {
        self.lovs.insert(lov.into(), processor);
    }

    /// Resolve the single handler for an event on `block` (`None` = form-level event)
    pub fn resolve(&self, block: Option<&str>) -> (HookLevel, &Arc<dyn ActionProcessor>) {
        if let Some(name) = block {
            if let Some(p) = self.lovs.get(name) {
                return (HookLevel::Lov, p);
            }
            if let Some(p) = self.blocks.get(name) {
                return (HookLevel::Block, p);
            }
        }
        (HookLevel::Form, &self.form)
    }

    /// Handlers notified of LOV activity: the LOV level when registered, and always the
    /// block-or-form level of the target block as well.
    pub fn lov_notification_targets(
        &self,
        lov: &str,
        block: &str,
    ) -> Vec<(HookLevel, &Arc<dyn ActionProcessor>)> {
        let mut targets = Vec::with_capacity(2);
        if let Some(p) = self.lovs.get(lov) {
            targets.push((HookLevel::Lov, p));
        }
        match self.blocks.get(block) {
            Some(p) => targets.push((HookLevel::Block, p)),
            None => targets.push((HookLevel::Form, &self.form)),
        }
        targets
    }
}
