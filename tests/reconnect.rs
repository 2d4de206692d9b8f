use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rampart::listener::ReconnectHandle;
use rampart::reconnect::ReconnectSupervisor;
use rampart::testing::{fast_timeouts, FakeTransport};
use rampart::transport::Transport;

struct CountingHook {
    count: Arc<AtomicUsize>,
}

impl ReconnectHandle for CountingHook {
    fn on_reconnect(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn fires_once_when_the_last_of_three_transports_drops() {
    let transports: Vec<_> = (0..3).map(|_| FakeTransport::new(fast_timeouts())).collect();
    let dyn_transports: Vec<Arc<dyn Transport>> =
        transports.iter().map(|t| t.clone() as Arc<dyn Transport>).collect();

    let count = Arc::new(AtomicUsize::new(0));
    let hook = Arc::new(CountingHook { count: count.clone() });
    let supervisor = ReconnectSupervisor::spawn(dyn_transports, hook, Duration::from_millis(10));

    transports[0].set_connected(false);
    transports[1].set_connected(false);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    transports[2].set_connected(false);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    supervisor.shutdown().await;
}
