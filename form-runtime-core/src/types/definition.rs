//! Form metadata: blocks, items, relations and LOV bindings

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FormError, FormResult};

fn default_page_size() -> u32 {
    20
}

fn default_max_results() -> usize {
    500
}

fn default_true() -> bool {
    true
}

/// Form-wide defaults, overridable per block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSettings {
    /// Rows per page for paged queries
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Row cap for all-rows queries
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    /// Force all-rows mode even for services that can page
    #[serde(default)]
    pub query_all_rows: bool,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            default_max_results: default_max_results(),
            query_all_rows: false,
        }
    }
}

/// One item (field) of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    pub name: String,
    /// Seeded into new records when defaults are requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ItemDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// One block (or mirror view of a block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    pub name: String,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
    /// Items identifying the entity behind a row, used to match refetched rows to pending changes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_items: Vec<String>,
    /// Present on mirror children: the parent block whose record set is shared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_all_rows: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(default = "default_true")]
    pub insert_allowed: bool,
    #[serde(default = "default_true")]
    pub update_allowed: bool,
    #[serde(default = "default_true")]
    pub delete_allowed: bool,
}

impl BlockDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            key_items: Vec::new(),
            mirror_of: None,
            page_size: None,
            query_all_rows: None,
            max_results: None,
            insert_allowed: true,
            update_allowed: true,
            delete_allowed: true,
        }
    }

    #[must_use]
    pub fn item(mut self, item: ItemDefinition) -> Self {
        self.items.push(item);
        self
    }

    /// Shorthand for a list of plain items
    #[must_use]
    pub fn items<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items
            .extend(names.into_iter().map(ItemDefinition::new));
        self
    }

    #[must_use]
    pub fn key<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_items = items.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn mirror_of(mut self, parent: impl Into<String>) -> Self {
        self.mirror_of = Some(parent.into());
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn query_all_rows(mut self, all: bool) -> Self {
        self.query_all_rows = Some(all);
        self
    }

    #[must_use]
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.insert_allowed = false;
        self.update_allowed = false;
        self.delete_allowed = false;
        self
    }
}

/// A (master item, detail item) join pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPair {
    pub master_item: String,
    pub detail_item: String,
}

/// Declarative master -> detail link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDefinition {
    pub master: String,
    pub detail: String,
    pub joins: Vec<JoinPair>,
    /// Postpone the detail query until the detail block is entered
    #[serde(default)]
    pub deferred_query: bool,
    /// Re-query the detail whenever the master focus changes
    #[serde(default = "default_true")]
    pub auto_query: bool,
}

impl RelationDefinition {
    #[must_use]
    pub fn new(master: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            detail: detail.into(),
            joins: Vec::new(),
            deferred_query: false,
            auto_query: true,
        }
    }

    #[must_use]
    pub fn join(mut self, master_item: impl Into<String>, detail_item: impl Into<String>) -> Self {
        self.joins.push(JoinPair {
            master_item: master_item.into(),
            detail_item: detail_item.into(),
        });
        self
    }

    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.deferred_query = true;
        self
    }

    #[must_use]
    pub fn manual(mut self) -> Self {
        self.auto_query = false;
        self
    }
}

/// A read-only lookup block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LovDefinition {
    pub name: String,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl LovDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            max_results: None,
        }
    }

    #[must_use]
    pub fn items<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items
            .extend(names.into_iter().map(ItemDefinition::new));
        self
    }
}

/// Copies an LOV column into a block item when a value is chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LovMapping {
    pub lov_item: String,
    pub block_item: String,
}

/// Binds an LOV to one screen item of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLovDefinition {
    pub block: String,
    pub item: String,
    pub lov: String,
    pub mappings: Vec<LovMapping>,
    /// LOV column matched against the item value; defaults to the mapping that targets `item`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_item: Option<String>,
    /// Fill mapped display values right after every block query
    #[serde(default)]
    pub post_query_lookup: bool,
}

impl ItemLovDefinition {
    #[must_use]
    pub fn new(block: impl Into<String>, item: impl Into<String>, lov: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            item: item.into(),
            lov: lov.into(),
            mappings: Vec::new(),
            lookup_item: None,
            post_query_lookup: false,
        }
    }

    #[must_use]
    pub fn map(mut self, lov_item: impl Into<String>, block_item: impl Into<String>) -> Self {
        self.mappings.push(LovMapping {
            lov_item: lov_item.into(),
            block_item: block_item.into(),
        });
        self
    }

    #[must_use]
    pub fn post_query_lookup(mut self) -> Self {
        self.post_query_lookup = true;
        self
    }

    /// The LOV column compared with the item's value
    pub fn lookup_column(&self) -> Option<&str> {
        self.lookup_item.as_deref().or_else(|| {
            self.mappings
                .iter()
                .find(|m| m.block_item == self.item)
                .map(|m| m.lov_item.as_str())
        })
    }
}

/// Complete metadata of one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub name: String,
    #[serde(default)]
    pub settings: FormSettings,
    #[serde(default)]
    pub blocks: Vec<BlockDefinition>,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
    #[serde(default)]
    pub lovs: Vec<LovDefinition>,
    #[serde(default)]
    pub item_lovs: Vec<ItemLovDefinition>,
}

impl FormDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: FormSettings::default(),
            blocks: Vec::new(),
            relations: Vec::new(),
            lovs: Vec::new(),
            item_lovs: Vec::new(),
        }
    }

    /// Load a definition from JSON
    pub fn from_json(json: &str) -> FormResult<Self> {
        serde_json::from_str(json).map_err(|e| FormError::Configuration(e.to_string()))
    }

    #[must_use]
    pub fn block(mut self, block: BlockDefinition) -> Self {
        self.blocks.push(block);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }

    #[must_use]
    pub fn lov(mut self, lov: LovDefinition) -> Self {
        self.lovs.push(lov);
        self
    }

    #[must_use]
    pub fn item_lov(mut self, item_lov: ItemLovDefinition) -> Self {
        self.item_lovs.push(item_lov);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: FormSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_with_defaults() {
        let json = r#"{
            "name": "orders",
            "blocks": [
                { "name": "order", "items": [{ "name": "id" }, { "name": "status", "defaultValue": "OPEN" }] },
                { "name": "line", "items": [{ "name": "orderId" }], "pageSize": 5 },
                { "name": "orderGrid", "mirrorOf": "order" }
            ],
            "relations": [
                { "master": "order", "detail": "line", "joins": [{ "masterItem": "id", "detailItem": "orderId" }] }
            ]
        }"#;
        let def = FormDefinition::from_json(json).unwrap();
        assert_eq!(def.settings, FormSettings::default());
        assert_eq!(def.blocks.len(), 3);
        assert!(def.blocks[0].insert_allowed);
        assert_eq!(def.blocks[1].page_size, Some(5));
        assert_eq!(def.blocks[2].mirror_of.as_deref(), Some("order"));
        assert!(def.relations[0].auto_query);
        assert!(!def.relations[0].deferred_query);
        assert_eq!(
            def.blocks[0].items[1].default_value,
            Some(Value::String("OPEN".into()))
        );
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let err = FormDefinition::from_json("{").unwrap_err();
        assert!(matches!(err, FormError::Configuration(_)));
    }

    #[test]
    fn lookup_column_defaults_to_mapping_of_item() {
        let lov = ItemLovDefinition::new("line", "productId", "products")
            .map("id", "productId")
            .map("name", "productName");
        assert_eq!(lov.lookup_column(), Some("id"));
    }
}
