//! Integration tests against a live Redis.
//!
//! Run with a local server on the default port:
//!   cargo test --test store_redis_tests -- --ignored --test-threads=1


use bb8_redis::redis::AsyncCommands;
use ddq::codec::{decode_lease, encode_lease};
use ddq::keys::{DLQ_KEY, PENDING_KEY, RUNNING_KEY};
use ddq::store::{RedisTaskStore, TaskStore};
use ddq::task::LeaseRecord;

use test_helpers::*;

const REDIS_ADDR: &str = "127.0.0.1:6379";

async fn open_clean_store() -> RedisTaskStore {
    let store = RedisTaskStore::connect(REDIS_ADDR).await.expect("connect");
    let mut conn = store.pool().get().await.expect("conn");
    let _: () = conn
        .del(&[PENDING_KEY, RUNNING_KEY, DLQ_KEY])
        .await
        .expect("del");
    drop(conn);
    store
}

#[ddq::test]
#[ignore = "requires a running Redis at 127.0.0.1:6379"]
async fn store_layout_matches_the_external_contract() {
    let store = open_clean_store().await;
    let snapshot = task("layout-1", 0, 3);
    store.add(&snapshot).await.expect("add");

    // Pending is a ZSET of snapshot JSON scored by execute_time
    let mut conn = store.pool().get().await.expect("conn");
    let members: Vec<String> = conn.zrange(PENDING_KEY, 0, -1).await.expect("zrange");
    assert_eq!(members.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&members[0]).expect("member is JSON");
    assert_eq!(value["id"], "layout-1");
    assert_eq!(value["execute_time"], snapshot.execute_time);
    let score: f64 = conn
        .zscore(PENDING_KEY, &members[0])
        .await
        .expect("zscore");
    assert_eq!(score as u64, snapshot.execute_time);
    drop(conn);

    // Running is a HASH of id -> {start, task}
    let fetched = store.fetch_and_hold("t", 10).await.expect("fetch");
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0], snapshot);

    let mut conn = store.pool().get().await.expect("conn");
    let raw_lease: String = conn.hget(RUNNING_KEY, "layout-1").await.expect("hget");
    let lease = decode_lease(&raw_lease).expect("lease decodes");
    assert_eq!(lease.task.id, "layout-1");
    assert!(lease.start >= snapshot.created_at);
}

#[ddq::test]
#[ignore = "requires a running Redis at 127.0.0.1:6379"]
async fn full_lifecycle_retry_burial_and_reclaim() {
    let store = open_clean_store().await;

    // Retry then bury with a budget of 2
    store.add(&task("c", 0, 2)).await.expect("add");
    let fetched = store.fetch_and_hold("t", 10).await.expect("fetch 1");
    assert_eq!(fetched[0].retry_count, 0);
    store.nack(&fetched[0]).await.expect("nack 1");

    let fetched = store.fetch_and_hold("t", 10).await.expect("fetch 2");
    assert_eq!(fetched[0].retry_count, 1);
    store.nack(&fetched[0]).await.expect("nack 2");

    let mut conn = store.pool().get().await.expect("conn");
    let dead: Vec<String> = conn.lrange(DLQ_KEY, 0, -1).await.expect("lrange");
    assert_eq!(dead.len(), 1);
    let buried: serde_json::Value = serde_json::from_str(&dead[0]).expect("dlq entry is JSON");
    assert_eq!(buried["id"], "c");
    assert_eq!(buried["retry_count"], 2);
    let pending_left: i64 = conn.zcard(PENDING_KEY).await.expect("zcard");
    assert_eq!(pending_left, 0);
    let running_left: i64 = conn.hlen(RUNNING_KEY).await.expect("hlen");
    assert_eq!(running_left, 0);
    drop(conn);

    // Ack is idempotent against an id nothing holds
    store.ack("c").await.expect("ack is a no-op");

    // Reclaim: plant an aged lease directly and sweep it back to pending
    let record = LeaseRecord {
        start: now_secs() - 120,
        task: task("d", 0, 3),
    };
    let mut conn = store.pool().get().await.expect("conn");
    let _: () = conn
        .hset(RUNNING_KEY, "d", encode_lease(&record).expect("encode"))
        .await
        .expect("hset");
    drop(conn);

    let moved = store.reclaim(60, 3).await.expect("reclaim");
    assert_eq!(moved, 1);
    let fetched = store.fetch_and_hold("t", 10).await.expect("fetch reclaimed");
    assert_eq!(fetched[0].id, "d");
    assert_eq!(fetched[0].retry_count, 1);
}

#[ddq::test]
#[ignore = "requires a running Redis at 127.0.0.1:6379"]
async fn poison_members_are_removed_by_the_script() {
    let store = open_clean_store().await;

    let mut conn = store.pool().get().await.expect("conn");
    let _: () = conn
        .zadd(PENDING_KEY, "corrupted-bytes", 0)
        .await
        .expect("zadd garbage");
    drop(conn);
    store.add(&task("e", 0, 3)).await.expect("add");

    let fetched = store.fetch_and_hold("t", 10).await.expect("fetch");
    let ids: Vec<&str> = fetched.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["e"]);

    let mut conn = store.pool().get().await.expect("conn");
    let pending_left: i64 = conn.zcard(PENDING_KEY).await.expect("zcard");
    assert_eq!(pending_left, 0, "the corrupted member must be gone");
}
