//! Test helpers
//!
//! Recording mocks for every collaborator trait plus form fixtures.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::controllers::{FormBuilder, FormController};
use crate::error::{FormError, FormResult};
use crate::traits::{ActionProcessor, BlockService, ConnectionProvider, Messenger, Renderer};
use crate::types::{
    Answer, BlockDefinition, FieldEdit, FieldValues, FormDefinition, FormInfo, HookContext,
    ItemLovDefinition, LovDefinition, LovEvent, Notice, QueryCriteria, QueryRequest, Question,
    Record, RecordId, RecordOperation, RelationDefinition,
};

/// Shared, ordered log of service calls across several mocks
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn row(value: Value) -> FieldValues {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => FieldValues::new(),
    }
}

// ===== MockBlockService =====

pub struct MockBlockService {
    id: String,
    key: String,
    rows: Mutex<Vec<FieldValues>>,
    calls: CallLog,
    pages: bool,
    more_rows: Mutex<bool>,
    /// "query" / "insert" / "update" / "delete": that call fails
    fail_on: Mutex<Option<&'static str>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl MockBlockService {
    pub fn new(id: &str, calls: &CallLog) -> Self {
        Self {
            id: id.to_string(),
            key: "id".to_string(),
            rows: Mutex::new(Vec::new()),
            calls: Arc::clone(calls),
            pages: false,
            more_rows: Mutex::new(true),
            fail_on: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rows(self, rows: Vec<Value>) -> Self {
        *self.rows.lock().unwrap() = rows.into_iter().map(row).collect();
        self
    }

    pub fn paged(mut self) -> Self {
        self.pages = true;
        self
    }

    pub fn set_more_rows(&self, more: bool) {
        *self.more_rows.lock().unwrap() = more;
    }

    pub fn fail_on(&self, operation: Option<&'static str>) {
        *self.fail_on.lock().unwrap() = operation;
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn rows(&self) -> Vec<FieldValues> {
        self.rows.lock().unwrap().clone()
    }

    fn enter(&self, operation: &'static str, count: usize) -> FormResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}.{operation}({count})", self.id));
        if *self.fail_on.lock().unwrap() == Some(operation) {
            return Err(FormError::Service {
                service: self.id.clone(),
                message: format!("{operation} failed"),
            });
        }
        Ok(())
    }

    fn key_of<'a>(&self, values: &'a FieldValues) -> Option<&'a Value> {
        values.get(&self.key)
    }
}

impl BlockService for MockBlockService {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute_query(&self, _form: &FormInfo, request: &QueryRequest) -> FormResult<Vec<FieldValues>> {
        self.requests.lock().unwrap().push(request.clone());
        self.enter("query", 0)?;
        let matching: Vec<FieldValues> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| request.criteria.matches(r))
            .cloned()
            .collect();
        Ok(match (request.page, request.max_results) {
            (Some(page), _) => matching
                .into_iter()
                .skip(page.offset())
                .take(page.size as usize)
                .collect(),
            (None, Some(max)) => matching.into_iter().take(max).collect(),
            (None, None) => matching,
        })
    }

    fn can_query_in_pages(&self) -> bool {
        self.pages
    }

    fn has_more_rows(&self) -> bool {
        *self.more_rows.lock().unwrap()
    }

    fn execute_insert(&self, _form: &FormInfo, records: &[Record]) -> FormResult<()> {
        self.enter("insert", records.len())?;
        let mut rows = self.rows.lock().unwrap();
        rows.extend(records.iter().map(|r| r.values().clone()));
        Ok(())
    }

    fn execute_update(&self, _form: &FormInfo, records: &[Record]) -> FormResult<()> {
        self.enter("update", records.len())?;
        let mut rows = self.rows.lock().unwrap();
        for record in records {
            if let Some(existing) = rows
                .iter_mut()
                .find(|r| self.key_of(r) == self.key_of(record.values()))
            {
                *existing = record.values().clone();
            }
        }
        Ok(())
    }

    fn execute_delete(&self, _form: &FormInfo, records: &[Record]) -> FormResult<()> {
        self.enter("delete", records.len())?;
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|r| !records.iter().any(|d| self.key_of(d.values()) == self.key_of(r)));
        Ok(())
    }
}

// ===== RecordingRenderer =====

#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<String>>,
    pending: Mutex<Vec<FieldEdit>>,
    order: Mutex<Option<Vec<RecordId>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Queue an edit returned by the next `synchronize`
    pub fn type_value(&self, record: RecordId, item: &str, value: Value) {
        self.pending.lock().unwrap().push(FieldEdit {
            record,
            item: item.to_string(),
            value,
        });
    }

    pub fn set_display_order(&self, order: Vec<RecordId>) {
        *self.order.lock().unwrap() = Some(order);
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Renderer for RecordingRenderer {
    fn record_selected(&self, _block: &str, record: Option<RecordId>) {
        self.push(format!(
            "record_selected:{}",
            record.map_or_else(|| "none".to_string(), |r| r.to_string())
        ));
    }

    fn executing_query(&self, _block: &str) {
        self.push("executing_query".to_string());
    }

    fn query_executed(&self, _block: &str, records: &[Record]) {
        self.push(format!("query_executed:{}", records.len()));
    }

    fn record_inserted(&self, _block: &str, record: &Record) {
        self.push(format!("record_inserted:{}", record.id()));
    }

    fn record_deleted(&self, _block: &str, record: RecordId) {
        self.push(format!("record_deleted:{record}"));
    }

    fn refresh_after_change(&self, _block: &str, record: &Record) {
        self.push(format!("refresh_after_change:{}", record.id()));
    }

    fn enter_insert(&self, _block: &str, _record: &Record) {
        self.push("enter_insert".to_string());
    }

    fn enter_update(&self, _block: &str, _record: &Record) {
        self.push("enter_update".to_string());
    }

    fn enter_query(&self, _block: &str, _criteria: &QueryCriteria) {
        self.push("enter_query".to_string());
    }

    fn block_cleared(&self, _block: &str) {
        self.push("block_cleared".to_string());
    }

    fn synchronize(&self, _block: &str) -> Vec<FieldEdit> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    fn display_order(&self, _block: &str) -> Option<Vec<RecordId>> {
        self.order.lock().unwrap().clone()
    }

    fn revalidate_item(&self, _block: &str, item: &str) {
        self.push(format!("revalidate_item:{item}"));
    }

    fn display_lov(&self, lov: &str, records: &[Record]) {
        self.push(format!("display_lov:{lov}:{}", records.len()));
    }
}

// ===== RecordingMessenger =====

#[derive(Default)]
pub struct RecordingMessenger {
    notices: Mutex<Vec<Notice>>,
    questions: Mutex<Vec<Question>>,
    errors: Mutex<Vec<FormError>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn questions(&self) -> Vec<Question> {
        self.questions.lock().unwrap().clone()
    }

    pub fn last_question(&self) -> Option<Question> {
        self.questions.lock().unwrap().last().cloned()
    }

    pub fn errors(&self) -> Vec<FormError> {
        self.errors.lock().unwrap().clone()
    }
}

impl Messenger for RecordingMessenger {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn ask(&self, question: &Question) {
        self.questions.lock().unwrap().push(question.clone());
    }

    fn report_error(&self, error: &FormError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

// ===== RecordingProcessor =====

#[derive(Default)]
pub struct RecordingProcessor {
    calls: Mutex<Vec<String>>,
    /// When set, `validate_record` rejects this operation
    reject: Mutex<Option<RecordOperation>>,
    delete_message: Mutex<Option<String>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, hook: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(':').next() == Some(hook))
            .count()
    }

    pub fn reject(&self, operation: Option<RecordOperation>) {
        *self.reject.lock().unwrap() = operation;
    }

    pub fn set_delete_message(&self, message: &str) {
        *self.delete_message.lock().unwrap() = Some(message.to_string());
    }

    fn push(&self, hook: &str, ctx: &HookContext<'_>) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{hook}:{}", ctx.block.unwrap_or("form")));
    }
}

impl ActionProcessor for RecordingProcessor {
    fn new_form_instance(&self, ctx: &HookContext<'_>) -> FormResult<()> {
        self.push("new_form_instance", ctx);
        Ok(())
    }

    fn new_block_instance(&self, ctx: &HookContext<'_>) -> FormResult<()> {
        self.push("new_block_instance", ctx);
        Ok(())
    }

    fn pre_form_opened(&self, ctx: &HookContext<'_>) -> FormResult<()> {
        self.push("pre_form_opened", ctx);
        Ok(())
    }

    fn pre_form_closed(&self, ctx: &HookContext<'_>) -> FormResult<()> {
        self.push("pre_form_closed", ctx);
        Ok(())
    }

    fn initialise_record(&self, ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        self.push("initialise_record", ctx);
        Ok(())
    }

    fn validate_record(
        &self,
        ctx: &HookContext<'_>,
        _record: &Record,
        operation: RecordOperation,
    ) -> FormResult<()> {
        self.push("validate_record", ctx);
        if *self.reject.lock().unwrap() == Some(operation) {
            return Err(FormError::Validation(format!("{operation:?} rejected")));
        }
        Ok(())
    }

    fn pre_query(&self, ctx: &HookContext<'_>, _criteria: &mut QueryCriteria) -> FormResult<()> {
        self.push("pre_query", ctx);
        Ok(())
    }

    fn post_query(&self, ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        self.push("post_query", ctx);
        Ok(())
    }

    fn pre_insert(&self, ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        self.push("pre_insert", ctx);
        Ok(())
    }

    fn post_insert(&self, ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        self.push("post_insert", ctx);
        Ok(())
    }

    fn pre_update(&self, ctx: &HookContext<'_>, _record: &mut Record) -> FormResult<()> {
        self.push("pre_update", ctx);
        Ok(())
    }

    fn post_update(&self, ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        self.push("post_update", ctx);
        Ok(())
    }

    fn pre_delete(&self, ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        self.push("pre_delete", ctx);
        Ok(())
    }

    fn post_delete(&self, ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        self.push("post_delete", ctx);
        Ok(())
    }

    fn lov_activated(&self, ctx: &HookContext<'_>, _event: &LovEvent) -> FormResult<()> {
        self.push("lov_activated", ctx);
        Ok(())
    }

    fn lov_completed(&self, ctx: &HookContext<'_>, _event: &LovEvent, chosen: bool) -> FormResult<()> {
        self.push(if chosen { "lov_completed" } else { "lov_cancelled" }, ctx);
        Ok(())
    }

    fn execute_action_command(&self, ctx: &HookContext<'_>, command: &str) -> FormResult<()> {
        self.push(&format!("command={command}"), ctx);
        Ok(())
    }

    fn when_insert_cancelled(&self, ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        self.push("when_insert_cancelled", ctx);
        Ok(())
    }

    fn when_update_cancelled(&self, ctx: &HookContext<'_>, _record: &Record) -> FormResult<()> {
        self.push("when_update_cancelled", ctx);
        Ok(())
    }

    fn question_answered(&self, ctx: &HookContext<'_>, _question: &Question, answer: Answer) -> FormResult<()> {
        self.push(&format!("question_answered={answer:?}"), ctx);
        Ok(())
    }

    fn master_detail_delete_violation_message(&self, _ctx: &HookContext<'_>, _detail: &str) -> Option<String> {
        self.delete_message.lock().unwrap().clone()
    }
}

// ===== MockConnectionProvider =====

#[derive(Default)]
pub struct MockConnectionProvider {
    log: Mutex<Vec<&'static str>>,
    fail_commit: Mutex<bool>,
}

impl MockConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|e| **e == entry).count()
    }

    pub fn fail_commit(&self, fail: bool) {
        *self.fail_commit.lock().unwrap() = fail;
    }
}

impl ConnectionProvider for MockConnectionProvider {
    fn acquire(&self) -> FormResult<()> {
        self.log.lock().unwrap().push("acquire");
        Ok(())
    }

    fn commit(&self) -> FormResult<()> {
        self.log.lock().unwrap().push("commit");
        if *self.fail_commit.lock().unwrap() {
            return Err(FormError::Connection("commit failed".to_string()));
        }
        Ok(())
    }

    fn rollback(&self) {
        self.log.lock().unwrap().push("rollback");
    }

    fn release(&self) {
        self.log.lock().unwrap().push("release");
    }
}

// ===== Fixtures =====

/// Order/line form with a product LOV on `line.productId`
pub struct OrderForm {
    pub form: FormController,
    pub calls: CallLog,
    pub orders: Arc<MockBlockService>,
    pub lines: Arc<MockBlockService>,
    pub products: Arc<MockBlockService>,
    pub order_renderer: Arc<RecordingRenderer>,
    pub line_renderer: Arc<RecordingRenderer>,
    pub messenger: Arc<RecordingMessenger>,
    pub processor: Arc<RecordingProcessor>,
    pub connection: Arc<MockConnectionProvider>,
}

impl OrderForm {
    pub fn ids(&self, block: &str) -> Vec<RecordId> {
        self.form
            .block(block)
            .unwrap()
            .records()
            .iter()
            .map(Record::id)
            .collect()
    }

    pub fn values(&self, block: &str, item: &str) -> Vec<Value> {
        self.form
            .block(block)
            .unwrap()
            .records()
            .iter()
            .map(|r| r.value(item).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn focused(&self, block: &str) -> Option<RecordId> {
        self.form.focused_record(block).unwrap()
    }
}

pub fn order_definition() -> FormDefinition {
    FormDefinition::new("orders")
        .block(BlockDefinition::new("order").items(["id", "customer"]))
        .block(
            BlockDefinition::new("line").items(["id", "orderId", "productId", "productName", "qty"]),
        )
        .relation(RelationDefinition::new("order", "line").join("id", "orderId"))
        .lov(LovDefinition::new("products").items(["id", "name"]))
        .item_lov(
            ItemLovDefinition::new("line", "productId", "products")
                .map("id", "productId")
                .map("name", "productName")
                .post_query_lookup(),
        )
}

pub fn order_form() -> OrderForm {
    order_form_with(order_definition())
}

pub fn order_form_with(definition: FormDefinition) -> OrderForm {
    let calls = call_log();
    let orders = Arc::new(MockBlockService::new("orders", &calls).with_rows(vec![
        json!({"id": 1, "customer": "Ada"}),
        json!({"id": 2, "customer": "Bob"}),
        json!({"id": 3, "customer": "Cy"}),
    ]));
    let lines = Arc::new(MockBlockService::new("lines", &calls).with_rows(vec![
        json!({"id": 10, "orderId": 1, "productId": 7, "productName": null, "qty": 1}),
        json!({"id": 11, "orderId": 1, "productId": 7, "productName": null, "qty": 2}),
        json!({"id": 12, "orderId": 1, "productId": 8, "productName": null, "qty": 3}),
        json!({"id": 20, "orderId": 2, "productId": 8, "productName": null, "qty": 4}),
    ]));
    let products = Arc::new(MockBlockService::new("products", &calls).with_rows(vec![
        json!({"id": 7, "name": "Bolt"}),
        json!({"id": 8, "name": "Nut"}),
        json!({"id": 150, "name": "Hinge"}),
        json!({"id": 151, "name": "Hinge pin"}),
        json!({"id": 905, "name": "Washer"}),
    ]));
    let order_renderer = Arc::new(RecordingRenderer::new());
    let line_renderer = Arc::new(RecordingRenderer::new());
    let messenger = Arc::new(RecordingMessenger::new());
    let processor = Arc::new(RecordingProcessor::new());
    let connection = Arc::new(MockConnectionProvider::new());

    let form = FormBuilder::new(definition)
        .service("order", orders.clone())
        .service("line", lines.clone())
        .service("products", products.clone())
        .renderer("order", order_renderer.clone())
        .renderer("line", line_renderer.clone())
        .form_processor(processor.clone())
        .messenger(messenger.clone())
        .connection_provider(connection.clone())
        .build()
        .unwrap();

    OrderForm {
        form,
        calls,
        orders,
        lines,
        products,
        order_renderer,
        line_renderer,
        messenger,
        processor,
        connection,
    }
}

/// One order block shown through two mirror views
pub struct MirrorForm {
    pub form: FormController,
    pub parent: Arc<RecordingRenderer>,
    pub grid: Arc<RecordingRenderer>,
    pub card: Arc<RecordingRenderer>,
}

pub fn mirror_form() -> MirrorForm {
    let calls = call_log();
    let orders = Arc::new(MockBlockService::new("orders", &calls).with_rows(vec![
        json!({"id": 1, "customer": "Ada"}),
        json!({"id": 2, "customer": "Bob"}),
    ]));
    let definition = FormDefinition::new("orders")
        .block(BlockDefinition::new("order").items(["id", "customer"]))
        .block(BlockDefinition::new("orderGrid").mirror_of("order"))
        .block(BlockDefinition::new("orderCard").mirror_of("order"));
    let parent = Arc::new(RecordingRenderer::new());
    let grid = Arc::new(RecordingRenderer::new());
    let card = Arc::new(RecordingRenderer::new());
    let form = FormBuilder::new(definition)
        .service("order", orders)
        .renderer("order", parent.clone())
        .renderer("orderGrid", grid.clone())
        .renderer("orderCard", card.clone())
        .messenger(Arc::new(RecordingMessenger::new()))
        .build()
        .unwrap();
    MirrorForm {
        form,
        parent,
        grid,
        card,
    }
}
