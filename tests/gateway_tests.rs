
use std::sync::Arc;

use ddq::gateway::{Gateway, GatewayError, SubmitRequest};
use uuid::Uuid;

use test_helpers::*;

fn request() -> SubmitRequest {
    SubmitRequest {
        id: None,
        topic: "emails".to_string(),
        payload: "{\"to\":\"x\"}".to_string(),
        delay_seconds: 0,
        max_retries: 0,
    }
}

#[ddq::test]
async fn rejects_empty_topic() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 3);

    let err = gateway
        .submit(SubmitRequest {
            topic: String::new(),
            ..request()
        })
        .await
        .expect_err("empty topic must be rejected");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));
    assert_eq!(store.counts().pending, 0);
}

#[ddq::test]
async fn rejects_empty_payload() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 3);

    let err = gateway
        .submit(SubmitRequest {
            payload: String::new(),
            ..request()
        })
        .await
        .expect_err("empty payload must be rejected");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));
    assert_eq!(store.counts().pending, 0);
}

#[ddq::test]
async fn rejects_negative_delay() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 3);

    let err = gateway
        .submit(SubmitRequest {
            delay_seconds: -1,
            ..request()
        })
        .await
        .expect_err("negative delay must be rejected");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));
    assert_eq!(store.counts().pending, 0);
}

#[ddq::test]
async fn mints_a_uuid_when_no_id_is_supplied() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 3);

    let id = gateway.submit(request()).await.expect("submit");
    Uuid::parse_str(&id).expect("minted id should be a uuid");
    assert_eq!(store.pending_tasks()[0].id, id);

    // An empty string counts as absent
    let id2 = gateway
        .submit(SubmitRequest {
            id: Some(String::new()),
            ..request()
        })
        .await
        .expect("submit");
    Uuid::parse_str(&id2).expect("minted id should be a uuid");
    assert_ne!(id, id2);
}

#[ddq::test]
async fn respects_a_caller_supplied_id() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 3);

    let id = gateway
        .submit(SubmitRequest {
            id: Some("caller-1".to_string()),
            ..request()
        })
        .await
        .expect("submit");
    assert_eq!(id, "caller-1");
    assert_eq!(store.pending_tasks()[0].id, "caller-1");
}

#[ddq::test]
async fn zero_max_retries_takes_the_configured_default() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 5);

    gateway.submit(request()).await.expect("submit");
    assert_eq!(store.pending_tasks()[0].max_retries, 5);

    gateway
        .submit(SubmitRequest {
            max_retries: 2,
            ..request()
        })
        .await
        .expect("submit");
    let explicit = store
        .pending_tasks()
        .into_iter()
        .find(|t| t.max_retries == 2);
    assert!(explicit.is_some(), "explicit budget should be kept");
}

#[ddq::test]
async fn default_retry_budget_has_a_floor_of_one() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 0);

    gateway.submit(request()).await.expect("submit");
    assert_eq!(store.pending_tasks()[0].max_retries, 1);
}

#[ddq::test]
async fn stamps_times_and_starts_with_zero_retries() {
    let store = memory_store();
    let gateway = Gateway::new(store.clone(), 3);

    let before = now_secs();
    gateway
        .submit(SubmitRequest {
            delay_seconds: 90,
            ..request()
        })
        .await
        .expect("submit");
    let after = now_secs();

    let task = &store.pending_tasks()[0];
    assert_eq!(task.retry_count, 0);
    assert!(task.created_at >= before && task.created_at <= after);
    assert_eq!(task.execute_time, task.created_at + 90);
    assert!(task.execute_time >= task.created_at);
}

#[ddq::test]
async fn storage_failures_propagate_to_the_submitter() {
    let gateway = Gateway::new(Arc::new(FailingStore), 3);

    let err = gateway
        .submit(request())
        .await
        .expect_err("store failure must surface");
    assert!(matches!(err, GatewayError::Store(_)));
}
