/**
 * Copyright (c) 2024-2025 Rampart, Inc.
 *
 * This file is part of Rampart Cache
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Fleet-wide outage detector.
//!
//! The transport only exposes per-endpoint connection state, but
//! reconnection is a whole-session event: one fresh session reattaches every
//! cache a client has opened against the same cluster tier manager at once.
//! This task polls the full set of endpoints and fires its hook the moment
//! every last one of them reports disconnected, then retires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::listener::ReconnectHandle;
use crate::transport::Transport;

/// Watches a fixed set of transport handles and invokes `ReconnectHandle::on_reconnect`
/// exactly once, the first poll at which none of them report `is_connected()`.
pub struct ReconnectSupervisor {
    handle: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
    spawned: AtomicBool,
}

impl ReconnectSupervisor {
    /// Spawns the poll loop on the current runtime. `poll_interval` is the
    /// configured supervisor cadence, typically 200ms.
    pub fn spawn(
        transports: Vec<Arc<dyn Transport>>,
        hook: Arc<dyn ReconnectHandle>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::debug!("reconnect supervisor shutting down");
                        return;
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }

                if transports.iter().all(|t| !t.is_connected()) {
                    tracing::info!(count = transports.len(), "fleet-wide outage detected, invoking reconnect hook");
                    hook.on_reconnect();
                    return;
                }
            }
        });

        ReconnectSupervisor { handle, shutdown: Some(shutdown_tx), spawned: AtomicBool::new(true) }
    }

    /// Signals the poll loop to stop and waits for it to exit. A no-op if the
    /// loop already retired on its own after firing.
    pub async fn shutdown(mut self) {
        debug_assert!(self.spawned.load(Ordering::Acquire), "shutdown on a supervisor that never ran");
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::TransportError;
    use crate::protocol::{Request, Response, ResponseKind};
    use crate::transport::{DisconnectionListener, ReconnectListener, ResponseListener, Timeouts, TransportState};

    struct FlagTransport {
        connected: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for FlagTransport {
        async fn invoke_wait_sent(&self, _r: Request, _replicate: bool) -> Result<(), TransportError> {
            Ok(())
        }
        async fn invoke_wait_received(&self, _r: Request, _replicate: bool) -> Result<(), TransportError> {
            Ok(())
        }
        async fn invoke_wait_retired(&self, _r: Request, _replicate: bool) -> Result<Response, TransportError> {
            Ok(Response::AllInvalidationDone)
        }
        fn add_response_listener(&self, _kind: ResponseKind, _listener: Arc<dyn ResponseListener>) {}
        fn set_reconnect_listener(&self, _listener: Arc<dyn ReconnectListener>) {}
        fn set_disconnection_listener(&self, _listener: Arc<dyn DisconnectionListener>) {}
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Acquire)
        }
        fn state(&self) -> TransportState {
            if self.is_connected() { TransportState::Connected } else { TransportState::Disconnected }
        }
        fn timeouts(&self) -> Timeouts {
            Timeouts { read: Duration::from_secs(1), mutative: Duration::from_secs(1) }
        }
    }

    struct CountingHook {
        count: Arc<AtomicUsize>,
    }

    impl ReconnectHandle for CountingHook {
        fn on_reconnect(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fires_only_once_all_endpoints_are_down() {
        let flags: Vec<Arc<AtomicBool>> =
            (0..3).map(|_| Arc::new(AtomicBool::new(true))).collect();
        let transports: Vec<Arc<dyn Transport>> = flags
            .iter()
            .map(|f| Arc::new(FlagTransport { connected: f.clone() }) as Arc<dyn Transport>)
            .collect();

        let count = Arc::new(AtomicUsize::new(0));
        let hook = Arc::new(CountingHook { count: count.clone() });
        let supervisor = ReconnectSupervisor::spawn(transports, hook, Duration::from_millis(10));

        flags[0].store(false, Ordering::Release);
        flags[1].store(false, Ordering::Release);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0, "two of three down must not fire");

        flags[2].store(false, Ordering::Release);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The loop already retired after firing; shutdown is a clean no-op join.
        supervisor.shutdown().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop_before_any_outage() {
        let flag = Arc::new(AtomicBool::new(true));
        let transports: Vec<Arc<dyn Transport>> =
            vec![Arc::new(FlagTransport { connected: flag.clone() })];
        let count = Arc::new(AtomicUsize::new(0));
        let hook = Arc::new(CountingHook { count: count.clone() });
        let supervisor = ReconnectSupervisor::spawn(transports, hook, Duration::from_millis(500));

        supervisor.shutdown().await;
        flag.store(false, Ordering::Release);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
