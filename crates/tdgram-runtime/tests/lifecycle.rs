//! Update queue backpressure and client shutdown

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{eventually, start_client, update};
use serde_json::json;
use tdgram_core::{MemoryTransport, Transport};
use tdgram_runtime::{Query, Settings, SlotStatus, StopReason, TdgramError};

const WAIT: Duration = Duration::from_secs(1);

fn single_slot_queue(put_timeout_ms: u64) -> Settings {
    Settings {
        updates_queue_size: 1,
        queue_put_timeout_ms: put_timeout_ms,
        ..Settings::testing()
    }
}

#[tokio::test]
async fn test_full_queue_blocks_then_drains() {
    let transport = Arc::new(MemoryTransport::new());
    let client = start_client(transport.clone(), single_slot_queue(2000));

    for n in 0..3 {
        transport.push(update(json!({"@type": "updateOption", "n": n})));
    }
    // The listener holds the second update until the queue has room
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.is_running());

    for n in 0..3 {
        let next = client.next_update(WAIT).await.unwrap().unwrap();
        assert_eq!(next.get("n"), Some(&json!(n)));
    }
    assert!(client.is_running());

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_queue_saturation_stops_the_client() {
    let transport = Arc::new(MemoryTransport::new());
    let client = start_client(transport.clone(), single_slot_queue(50));

    let slot = client.send(Query::new("getMe"), false).await.unwrap();
    transport.push(update(json!({"@type": "updateOption", "n": 0})));
    transport.push(update(json!({"@type": "updateOption", "n": 1})));

    eventually(|| !client.is_running()).await;
    assert!(matches!(client.stop_reason(), Some(StopReason::ListenerFailed(_))));

    // Waiters are released rather than left hanging
    let slot = slot.wait(Some(WAIT)).await.unwrap();
    assert_eq!(slot.status(), SlotStatus::Cancelled);

    let err = client.stop().await.unwrap_err();
    assert!(matches!(err, TdgramError::QueueSaturated { capacity: 1, .. }));

    let again = client.stop().await.unwrap_err();
    assert!(matches!(again, TdgramError::ListenerFailed { .. }));
}

#[tokio::test]
async fn test_stop_cancels_pending_queries() {
    let transport = Arc::new(MemoryTransport::new());
    let client = Arc::new(start_client(transport.clone(), Settings::testing()));

    let detached = client.send(Query::new("getMe"), false).await.unwrap();
    let blocked = {
        let client = client.clone();
        tokio::spawn(async move { client.send(Query::new("getChats"), true).await })
    };
    eventually(|| client.pending_count() == 2).await;

    client.stop().await.unwrap();

    assert_eq!(detached.status(), SlotStatus::Cancelled);
    let blocked = blocked.await.unwrap().unwrap();
    assert_eq!(blocked.status(), SlotStatus::Cancelled);
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let transport = Arc::new(MemoryTransport::new());
    let client = start_client(transport.clone(), Settings::testing());

    assert!(client.is_running());
    client.stop().await.unwrap();
    client.stop().await.unwrap();

    assert!(!client.is_running());
    assert_eq!(client.stop_reason(), Some(StopReason::Requested));
    assert!(transport.is_stopped());
    assert_eq!(transport.stats().stop_calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_submit_after_stop_is_rejected() {
    let transport = Arc::new(MemoryTransport::new());
    let client = start_client(transport.clone(), Settings::testing());
    client.stop().await.unwrap();

    let result = client.send(Query::new("getMe"), true).await;

    assert!(matches!(result, Err(TdgramError::Shutdown)));
    assert!(transport.sent_queries().is_empty());
}

#[tokio::test]
async fn test_transport_closing_underneath_is_fatal() {
    let transport = Arc::new(MemoryTransport::new());
    let client = start_client(transport.clone(), Settings::testing());

    transport.stop().await;
    eventually(|| !client.is_running()).await;

    let err = client.stop().await.unwrap_err();
    assert!(matches!(err, TdgramError::Transport(_)));
}
