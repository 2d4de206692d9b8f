use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;

use rampart::chain::Key;
use rampart::listener::InvalidationListener;
use rampart::strong_proxy::StrongStoreProxy;
use rampart::testing::{fast_timeouts, FakeTransport};

#[derive(Default)]
struct RecordingInvalidation {
    hash_calls: Arc<std::sync::Mutex<Vec<Key>>>,
    all_calls: AtomicUsize,
}

impl InvalidationListener for RecordingInvalidation {
    fn on_invalidate_hash(&self, key: Key) {
        self.hash_calls.lock().unwrap().push(key);
    }
    fn on_invalidate_all(&self) {
        self.all_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn build_proxy(fake: Arc<FakeTransport>) -> (Arc<StrongStoreProxy>, Arc<RecordingInvalidation>) {
    let invalidation = Arc::new(RecordingInvalidation::default());
    let proxy = StrongStoreProxy::new(fake, "cache-under-test".into(), invalidation.clone());
    (proxy, invalidation)
}

#[tokio::test]
async fn single_key_barrier_blocks_then_releases() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, _inv) = build_proxy(fake.clone());

    let task = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.append(Key::new(42), Bytes::from_static(b"x")).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished(), "caller should still be blocked on the barrier");
    assert!(proxy.pending_keys().contains(&Key::new(42)));

    fake.complete_hash_invalidation(Key::new(42)).await;

    let result = timeout(Duration::from_millis(50), task).await.expect("caller did not return in time");
    assert!(result.unwrap().is_ok());
    assert!(!proxy.pending_keys().contains(&Key::new(42)));
}

#[tokio::test]
async fn concurrent_same_key_mutations_serialize_through_the_barrier() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, _inv) = build_proxy(fake.clone());
    let key = Key::new(7);

    let first = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.append(key, Bytes::from_static(b"a")).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(proxy.pending_keys().len(), 1);

    let second = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.append(key, Bytes::from_static(b"b")).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    // second is parked waiting on the first's signal, not installed yet.
    assert_eq!(proxy.pending_keys().len(), 1);
    assert!(!first.is_finished());
    assert!(!second.is_finished());

    fake.complete_hash_invalidation(key).await;
    let first_result = timeout(Duration::from_millis(100), first).await.unwrap();
    assert!(first_result.unwrap().is_ok());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(proxy.pending_keys().len(), 1);
    fake.complete_hash_invalidation(key).await;
    let second_result = timeout(Duration::from_millis(100), second).await.unwrap();
    assert!(second_result.unwrap().is_ok());

    assert!(proxy.pending_keys().is_empty());
}

#[tokio::test]
async fn mutative_timeout_leaves_entry_for_reconciliation() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, _inv) = build_proxy(fake.clone());
    let key = Key::new(9);

    let result = proxy.append(key, Bytes::from_static(b"p")).await;
    assert!(result.unwrap_err().is_timeout());
    assert!(proxy.pending_keys().contains(&key), "timed-out key must survive for reconnect reconciliation");
}

#[tokio::test]
async fn disconnect_during_wait_unblocks_every_waiter() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, _inv) = build_proxy(fake.clone());
    let key = Key::new(3);

    let task = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.get_and_append(key, Bytes::from_static(b"q")).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(proxy.pending_keys().contains(&key));

    fake.set_connected(false);

    let result = timeout(Duration::from_millis(100), task).await.unwrap().unwrap();
    assert!(result.unwrap_err().is_disconnected());

    fake.set_connected(true);
    let message = fake.run_reconnect_handshake().await;
    assert!(message.invalidations_in_progress.contains(&key));
}

#[tokio::test]
async fn overlapping_clears_serialize() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, _inv) = build_proxy(fake.clone());

    let first = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.clear().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(proxy.clear_in_progress());

    let second = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.clear().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!first.is_finished());
    assert!(!second.is_finished());

    fake.complete_all_invalidation().await;
    let first_result = timeout(Duration::from_millis(100), first).await.unwrap();
    assert!(first_result.unwrap().is_ok());

    tokio::time::sleep(Duration::from_millis(30)).await;
    fake.complete_all_invalidation().await;
    let second_result = timeout(Duration::from_millis(100), second).await.unwrap();
    assert!(second_result.unwrap().is_ok());

    assert!(!proxy.clear_in_progress());
}

#[tokio::test]
async fn peer_invalidation_is_acked_exactly_once() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, invalidation) = build_proxy(fake.clone());
    let key = Key::new(11);

    let invalidation_id = fake.broadcast_client_invalidate_hash(key).await;
    // Give the ack's invoke_wait_sent a moment to land.
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(invalidation.hash_calls.lock().unwrap().as_slice(), &[key]);
    let acks = fake.acks_received();
    assert_eq!(acks.len(), 1);
    match &acks[0] {
        rampart::protocol::Request::ClientInvalidationAck { key: acked_key, invalidation_id: acked_id } => {
            assert_eq!(*acked_key, key);
            assert_eq!(*acked_id, invalidation_id);
        }
        other => panic!("unexpected ack request: {:?}", other),
    }

    let _ = proxy.cache_id();
}

#[tokio::test]
async fn repeated_hash_invalidation_done_is_idempotent() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, _inv) = build_proxy(fake.clone());
    let key = Key::new(50);

    fake.complete_hash_invalidation(key).await;
    fake.complete_hash_invalidation(key).await;
    assert!(proxy.pending_keys().is_empty());
}

#[tokio::test]
async fn get_immediately_after_append_observes_the_new_tail() {
    let fake = FakeTransport::new(fast_timeouts());
    let (proxy, _inv) = build_proxy(fake.clone());
    let key = Key::new(100);

    let task = tokio::spawn({
        let proxy = proxy.clone();
        async move { proxy.append(key, Bytes::from_static(b"payload")).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    fake.complete_hash_invalidation(key).await;
    timeout(Duration::from_millis(100), task).await.unwrap().unwrap().unwrap();

    let chain = proxy.get(key).await.unwrap();
    assert_eq!(chain.tail(), Some(&Bytes::from_static(b"payload")));
}
