#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for `FormRuntime` over the in-memory adapters.

use std::sync::Arc;

use form_runtime_app::{FormRuntime, HostMessage, InMemoryBlockService, QueueMessenger};
use form_runtime_core::error::FormError;
use form_runtime_core::types::{
    Answer, BlockDefinition, FormDefinition, Notice, PendingOperation, QueryCriteria,
    RelationDefinition,
};
use form_runtime_core::{FormBuilder, FormController};
use serde_json::json;

struct Fixture {
    form: FormController,
    orders: Arc<InMemoryBlockService>,
    lines: Arc<InMemoryBlockService>,
    messenger: Arc<QueueMessenger>,
}

fn fixture() -> Fixture {
    let orders = Arc::new(
        InMemoryBlockService::new("orders", "id")
            .with_json_rows(r#"[{"id": 1, "customer": "Ada"}, {"id": 2, "customer": "Bob"}]"#)
            .unwrap(),
    );
    let lines = Arc::new(
        InMemoryBlockService::new("lines", "id")
            .with_json_rows(
                r#"[{"id": 10, "orderId": 1, "qty": 1}, {"id": 11, "orderId": 1, "qty": 2},
                    {"id": 20, "orderId": 2, "qty": 5}]"#,
            )
            .unwrap(),
    );
    let messenger = Arc::new(QueueMessenger::new());
    let definition = FormDefinition::new("orders")
        .block(BlockDefinition::new("order").items(["id", "customer"]))
        .block(BlockDefinition::new("line").items(["id", "orderId", "qty"]))
        .relation(RelationDefinition::new("order", "line").join("id", "orderId"));
    let form = FormBuilder::new(definition)
        .service("order", orders.clone())
        .service("line", lines.clone())
        .messenger(messenger.clone())
        .build()
        .unwrap();
    Fixture {
        form,
        orders,
        lines,
        messenger,
    }
}

#[tokio::test]
async fn query_edit_and_save_through_a_handle() {
    let f = fixture();
    let runtime = FormRuntime::start(f.form);
    let handle = runtime.handle();

    handle.open().await.unwrap();
    handle.execute_query("order", QueryCriteria::new()).await.unwrap();
    let line_count = handle.read(|form| form.block("line").map(|b| b.len())).await.unwrap();
    assert_eq!(line_count.unwrap(), 2);

    handle
        .call(|form| {
            let id = form.block("line")?.records()[0].id();
            form.controller("line")?.set_item_value(id, "qty", json!(9))
        })
        .await
        .unwrap();
    handle.save_changes().await.unwrap();

    assert_eq!(f.lines.rows()[0]["qty"], json!(9));
    assert_eq!(
        f.messenger.drain(),
        vec![HostMessage::Notice(Notice::Saved {
            inserted: 0,
            updated: 1,
            deleted: 0
        })]
    );
    assert_eq!(f.orders.rows().len(), 2);
}

#[tokio::test]
async fn questions_are_answered_through_the_handle() {
    let f = fixture();
    let runtime = FormRuntime::start(f.form);
    let handle = runtime.handle();
    handle.execute_query("order", QueryCriteria::new()).await.unwrap();
    handle
        .call(|form| form.controller("line")?.delete_focused())
        .await
        .unwrap();

    handle.call(|form| form.controller("order")?.next_record()).await.unwrap();
    let question = f.messenger.pending_questions().pop().unwrap();
    assert_eq!(question.operation, PendingOperation::NextRecord);

    handle.answer(question.id, Answer::Yes).await.unwrap();

    assert_eq!(f.lines.rows().len(), 2);
    let customer = handle
        .call(|form| {
            let id = form.focused_record("order")?;
            Ok(id.and_then(|id| form.block("order").ok()?.record(id)?.value("customer").cloned()))
        })
        .await
        .unwrap();
    assert_eq!(customer, Some(json!("Bob")));
}

#[tokio::test]
async fn concurrent_callers_are_serialised() {
    let f = fixture();
    let runtime = FormRuntime::start(f.form);
    runtime.handle().execute_query("order", QueryCriteria::new()).await.unwrap();

    let mut tasks = Vec::new();
    for n in 0..10 {
        let handle = runtime.handle();
        tasks.push(tokio::spawn(async move {
            handle
                .call(move |form| {
                    let mut order = form.controller("order")?;
                    let mut record = order.create_record(false)?;
                    record.set_value("id", json!(100 + n));
                    order.execute_insert(record)
                })
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let len = runtime.handle().read(|form| form.block("order").map(|b| b.len())).await.unwrap();
    assert_eq!(len.unwrap(), 12);
    let form = runtime.shutdown().await.unwrap();
    assert_eq!(form.block("order").unwrap().dirty_counts().inserted, 10);
}

#[tokio::test]
async fn stopped_runtime_reports_unavailable() {
    let f = fixture();
    let runtime = FormRuntime::start(f.form);
    let handle = runtime.handle();
    assert!(handle.is_running());

    let form = runtime.shutdown().await.unwrap();
    assert_eq!(form.info().name, "orders");

    assert!(!handle.is_running());
    let err = handle.save_changes().await.unwrap_err();
    assert!(matches!(err, FormError::Unavailable(_)));
}

#[tokio::test]
async fn errors_surface_to_the_caller_and_the_messenger() {
    let f = fixture();
    let runtime = FormRuntime::start(f.form);
    let handle = runtime.handle();

    let reported = handle
        .call(|form| {
            let result = form.controller("missing").map(|_| ());
            Ok(form.report(result))
        })
        .await
        .unwrap();

    assert!(reported.is_none());
    assert!(matches!(
        f.messenger.drain().as_slice(),
        [HostMessage::Error(FormError::BlockNotFound(_))]
    ));
}
