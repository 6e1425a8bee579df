//! Form construction from metadata plus injected collaborators

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::traits::{
    ActionProcessor, BlockService, ConnectionProvider, LogMessenger, Messenger,
    NoopActionProcessor, NoopConnectionProvider, Renderer,
};
use crate::types::{Block, BlockDefinition, FormDefinition, FormInfo, HookContext, ItemDefinition};
use crate::utils::ListenerRegistry;

use super::block_controller::Permissions;
use super::form_controller::FormLifecycle;
use super::mirror::MirrorGroup;
use super::{BlockController, ControllerKind, FormController, HookRegistry};

/// Builder for [`FormController`].
///
/// Services, renderers and action processors are keyed by block or LOV name; unknown
/// names are configuration errors.
///
/// # Example
///
/// ```rust,ignore
/// let form = FormBuilder::new(definition)
///     .service("order", Arc::new(OrderService::new()))
///     .renderer("order", Arc::new(OrderGrid::new()))
///     .block_processor("order", Arc::new(OrderRules))
///     .build()?;
/// ```
pub struct FormBuilder {
    definition: FormDefinition,
    parameters: IndexMap<String, Value>,
    services: HashMap<String, Arc<dyn BlockService>>,
    renderers: HashMap<String, Arc<dyn Renderer>>,
    form_processor: Option<Arc<dyn ActionProcessor>>,
    block_processors: HashMap<String, Arc<dyn ActionProcessor>>,
    lov_processors: HashMap<String, Arc<dyn ActionProcessor>>,
    messenger: Option<Arc<dyn Messenger>>,
    connection: Option<Arc<dyn ConnectionProvider>>,
}

impl FormBuilder {
    #[must_use]
    pub fn new(definition: FormDefinition) -> Self {
        Self {
            definition,
            parameters: IndexMap::new(),
            services: HashMap::new(),
            renderers: HashMap::new(),
            form_processor: None,
            block_processors: HashMap::new(),
            lov_processors: HashMap::new(),
            messenger: None,
            connection: None,
        }
    }

    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Block or LOV service
    #[must_use]
    pub fn service(mut self, name: impl Into<String>, service: Arc<dyn BlockService>) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    #[must_use]
    pub fn renderer(mut self, name: impl Into<String>, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.insert(name.into(), renderer);
        self
    }

    #[must_use]
    pub fn form_processor(mut self, processor: Arc<dyn ActionProcessor>) -> Self {
        self.form_processor = Some(processor);
        self
    }

    #[must_use]
    pub fn block_processor(mut self, block: impl Into<String>, processor: Arc<dyn ActionProcessor>) -> Self {
        self.block_processors.insert(block.into(), processor);
        self
    }

    #[must_use]
    pub fn lov_processor(mut self, lov: impl Into<String>, processor: Arc<dyn ActionProcessor>) -> Self {
        self.lov_processors.insert(lov.into(), processor);
        self
    }

    #[must_use]
    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    #[must_use]
    pub fn connection_provider(mut self, connection: Arc<dyn ConnectionProvider>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Validate the metadata, wire collaborators and fire the instance hooks
    pub fn build(mut self) -> FormResult<FormController> {
        let definition = std::mem::take(&mut self.definition.blocks);
        let settings = self.definition.settings.clone();
        let mut blocks = Vec::new();
        let mut controllers: IndexMap<String, BlockController> = IndexMap::new();

        // Parent blocks first, so mirrors can find the block they share
        for def in definition.iter().filter(|d| d.mirror_of.is_none()) {
            ensure_unique(&controllers, &def.name)?;
            if let Some(key) = def
                .key_items
                .iter()
                .find(|key| !def.items.iter().any(|item| &item.name == *key))
            {
                return Err(FormError::Configuration(format!(
                    "{} declares unknown key item {key}",
                    def.name
                )));
            }
            let block = blocks.len();
            blocks.push(Block::new(
                &def.name,
                def.page_size.unwrap_or(settings.default_page_size),
                def.query_all_rows.unwrap_or(settings.query_all_rows),
                Some(def.max_results.unwrap_or(settings.default_max_results)),
            )
            .with_key(def.key_items.clone()));
            let ctl = self.editable(def, block, def.items.clone());
            controllers.insert(def.name.clone(), ctl);
        }

        let mut mirrors: Vec<MirrorGroup> = Vec::new();
        for def in &definition {
            let Some(parent_name) = &def.mirror_of else {
                continue;
            };
            ensure_unique(&controllers, &def.name)?;
            if definition
                .iter()
                .any(|d| &d.name == parent_name && d.mirror_of.is_some())
            {
                return Err(FormError::Configuration(format!(
                    "{} mirrors {parent_name}, which is itself a mirror",
                    def.name
                )));
            }
            let parent = controllers.get_index_of(parent_name).ok_or_else(|| {
                FormError::Configuration(format!("{} mirrors unknown block {parent_name}", def.name))
            })?;
            let parent_ctl = &controllers[parent];
            let items = if def.items.is_empty() {
                parent_ctl.items.clone()
            } else {
                def.items.clone()
            };
            let block = parent_ctl.block;
            let group = match parent_ctl.mirror {
                Some(g) => g,
                None => {
                    mirrors.push(MirrorGroup::new(parent));
                    mirrors.len() - 1
                }
            };
            let inherited = parent_ctl.service.clone();
            let mut ctl = self.editable(def, block, items);
            ctl.service = ctl.service.or(inherited);
            ctl.mirror = Some(group);
            controllers[parent].mirror = Some(group);
            let index = controllers.len();
            controllers.insert(def.name.clone(), ctl);
            mirrors[group].members.push(index);
        }

        for lov in &self.definition.lovs {
            ensure_unique(&controllers, &lov.name)?;
            let block = blocks.len();
            blocks.push(Block::new(
                &lov.name,
                settings.default_page_size,
                true,
                Some(lov.max_results.unwrap_or(settings.default_max_results)),
            ));
            let mut ctl = BlockController::new(lov.name.clone(), block, ControllerKind::Lov);
            ctl.items = lov.items.clone();
            ctl.service = self.services.remove(&lov.name);
            ctl.renderer = self.renderers.remove(&lov.name);
            controllers.insert(lov.name.clone(), ctl);
        }

        if let Some(name) = self.services.keys().chain(self.renderers.keys()).next() {
            return Err(FormError::Configuration(format!("no block or LOV named {name}")));
        }

        validate_relations(&self.definition, &controllers)?;
        validate_item_lovs(&self.definition, &controllers)?;

        let mut hooks = HookRegistry::new(
            self.form_processor
                .take()
                .unwrap_or_else(|| Arc::new(NoopActionProcessor)),
        );
        for (block, processor) in self.block_processors.drain() {
            if !controllers.contains_key(&block) {
                return Err(FormError::Configuration(format!("processor for unknown block {block}")));
            }
            hooks.register_block(block, processor);
        }
        for (lov, processor) in self.lov_processors.drain() {
            if controllers.get(&lov).map(|c| c.kind) != Some(ControllerKind::Lov) {
                return Err(FormError::Configuration(format!("processor for unknown LOV {lov}")));
            }
            hooks.register_lov(lov, processor);
        }

        let info = FormInfo {
            name: self.definition.name.clone(),
            parameters: self.parameters,
        };
        let form = FormController {
            info,
            settings,
            blocks,
            controllers,
            relations: self.definition.relations,
            mirrors,
            item_lovs: self.definition.item_lovs,
            hooks,
            messenger: self.messenger.unwrap_or_else(|| Arc::new(LogMessenger)),
            connection: self
                .connection
                .unwrap_or_else(|| Arc::new(NoopConnectionProvider)),
            questions: IndexMap::new(),
            lov_session: None,
            listeners: ListenerRegistry::new(),
            lifecycle: FormLifecycle::Built,
            next_record_id: 0,
        };

        form.hook(None, "new_form_instance", |p, ctx| p.new_form_instance(ctx))?;
        for name in form.controllers.keys() {
            let (_, processor) = form.hooks.resolve(Some(name.as_str()));
            processor
                .new_block_instance(&HookContext::block(&form.info, name))
                .map_err(|e| FormError::from_hook("new_block_instance", e))?;
        }
        log::info!(
            "Built form {} with {} blocks and {} relations",
            form.info.name,
            form.controllers.len(),
            form.relations.len()
        );
        Ok(form)
    }

    fn editable(&mut self, def: &BlockDefinition, block: usize, items: Vec<ItemDefinition>) -> BlockController {
        let mut ctl = BlockController::new(def.name.clone(), block, ControllerKind::Editable);
        ctl.items = items;
        ctl.permissions = Permissions {
            insert: def.insert_allowed,
            update: def.update_allowed,
            delete: def.delete_allowed,
        };
        ctl.service = self.services.remove(&def.name);
        ctl.renderer = self.renderers.remove(&def.name);
        ctl
    }
}

fn ensure_unique(controllers: &IndexMap<String, BlockController>, name: &str) -> FormResult<()> {
    if controllers.contains_key(name) {
        return Err(FormError::Configuration(format!("duplicate block name {name}")));
    }
    Ok(())
}

/// Every relation joins two editable views; a detail has one master; no cycles
fn validate_relations(
    definition: &FormDefinition,
    controllers: &IndexMap<String, BlockController>,
) -> FormResult<()> {
    let mut details = HashSet::new();
    for relation in &definition.relations {
        for name in [&relation.master, &relation.detail] {
            match controllers.get(name) {
                Some(c) if c.kind == ControllerKind::Editable => {}
                _ => {
                    return Err(FormError::Configuration(format!(
                        "relation {} -> {} names unknown block {name}",
                        relation.master, relation.detail
                    )))
                }
            }
        }
        if relation.joins.is_empty() {
            return Err(FormError::Configuration(format!(
                "relation {} -> {} has no join items",
                relation.master, relation.detail
            )));
        }
        if !details.insert(relation.detail.as_str()) {
            return Err(FormError::Configuration(format!(
                "{} is the detail of more than one relation",
                relation.detail
            )));
        }
    }

    // Walking up from any block must end at a root
    for relation in &definition.relations {
        let mut seen = HashSet::new();
        let mut current = relation.detail.as_str();
        while let Some(up) = definition.relations.iter().find(|r| r.detail == current) {
            if !seen.insert(current) {
                return Err(FormError::Configuration(format!(
                    "relation cycle through {current}"
                )));
            }
            current = up.master.as_str();
        }
    }
    Ok(())
}

fn validate_item_lovs(
    definition: &FormDefinition,
    controllers: &IndexMap<String, BlockController>,
) -> FormResult<()> {
    for item_lov in &definition.item_lovs {
        if controllers.get(&item_lov.block).map(|c| c.kind) != Some(ControllerKind::Editable) {
            return Err(FormError::Configuration(format!(
                "LOV binding {}.{} names unknown block",
                item_lov.block, item_lov.item
            )));
        }
        if controllers.get(&item_lov.lov).map(|c| c.kind) != Some(ControllerKind::Lov) {
            return Err(FormError::LovNotFound(item_lov.lov.clone()));
        }
        if item_lov.lookup_column().is_none() {
            return Err(FormError::Configuration(format!(
                "LOV binding {}.{} has no lookup column",
                item_lov.block, item_lov.item
            )));
        }
    }
    Ok(())
}
