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

//! An in-memory `Transport` double driven explicitly by tests, standing in
//! for a real cluster-tier session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::chain::{Chain, Key};
use crate::error::TransportError;
use crate::protocol::{ReconnectMessage, Request, Response, ResponseKind};
use crate::transport::{
    DisconnectionListener, ReconnectListener, ResponseListener, Timeouts, Transport, TransportState,
};

/// A server-side chain store plus connection state, manipulated directly by
/// tests to script request/response sequences without a real socket.
pub struct FakeTransport {
    store: Mutex<HashMap<Key, Chain>>,
    connected: AtomicBool,
    timeouts: Timeouts,
    response_listeners: Mutex<HashMap<ResponseKind, Arc<dyn ResponseListener>>>,
    reconnect_listener: Mutex<Option<Arc<dyn ReconnectListener>>>,
    disconnection_listener: Mutex<Option<Arc<dyn DisconnectionListener>>>,
    next_invalidation_id: AtomicU64,
    acks_received: Mutex<Vec<Request>>,
}

impl FakeTransport {
    pub fn new(timeouts: Timeouts) -> Arc<FakeTransport> {
        Arc::new(FakeTransport {
            store: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            timeouts,
            response_listeners: Mutex::new(HashMap::new()),
            reconnect_listener: Mutex::new(None),
            disconnection_listener: Mutex::new(None),
            next_invalidation_id: AtomicU64::new(1),
            acks_received: Mutex::new(Vec::new()),
        })
    }

    /// Directly seeds a key's stored chain, bypassing request plumbing.
    pub fn seed(&self, key: Key, chain: Chain) {
        self.store.lock().unwrap().insert(key, chain);
    }

    pub fn chain_of(&self, key: Key) -> Chain {
        self.store.lock().unwrap().get(&key).cloned().unwrap_or_else(Chain::empty)
    }

    /// Delivers an unsolicited response to whichever listener is registered
    /// for its kind, as the server would after invalidating on other peers.
    pub async fn deliver(&self, response: Response) {
        let listener = self.response_listeners.lock().unwrap().get(&response.kind()).cloned();
        if let Some(listener) = listener {
            listener.on_response(response).await;
        }
    }

    /// Simulates the server broadcasting a `ClientInvalidateHash` for `key`
    /// and returns the fresh `invalidation_id` used, so a test can later
    /// assert the matching ack arrived.
    pub async fn broadcast_client_invalidate_hash(&self, key: Key) -> u64 {
        let invalidation_id = self.next_invalidation_id.fetch_add(1, Ordering::SeqCst);
        self.deliver(Response::ClientInvalidateHash { key, invalidation_id }).await;
        invalidation_id
    }

    pub async fn broadcast_client_invalidate_all(&self) -> u64 {
        let invalidation_id = self.next_invalidation_id.fetch_add(1, Ordering::SeqCst);
        self.deliver(Response::ClientInvalidateAll { invalidation_id }).await;
        invalidation_id
    }

    /// Simulates the barrier-releasing confirmation the server sends once
    /// every peer has acked a hash invalidation.
    pub async fn complete_hash_invalidation(&self, key: Key) {
        self.deliver(Response::HashInvalidationDone(key)).await;
    }

    pub async fn complete_all_invalidation(&self) {
        self.deliver(Response::AllInvalidationDone).await;
    }

    /// Flips connection state and, on a false transition, fires the
    /// registered `DisconnectionListener`.
    pub fn set_connected(&self, connected: bool) {
        let was_connected = self.connected.swap(connected, Ordering::AcqRel);
        if was_connected && !connected {
            if let Some(listener) = self.disconnection_listener.lock().unwrap().clone() {
                listener.on_disconnect();
            }
        }
    }

    /// Drives the reconnect handshake: fires the registered `ReconnectListener`
    /// and returns the `ReconnectMessage` it stamped.
    pub async fn run_reconnect_handshake(&self) -> ReconnectMessage {
        let mut message = ReconnectMessage::new();
        if let Some(listener) = self.reconnect_listener.lock().unwrap().clone() {
            listener.on_reconnect(&mut message).await;
        }
        message
    }

    pub fn acks_received(&self) -> Vec<Request> {
        self.acks_received.lock().unwrap().clone()
    }

    fn require_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }

    fn apply(&self, request: &Request) -> Response {
        let mut store = self.store.lock().unwrap();
        match request {
            Request::Get(key) => Response::GetResponse(store.get(key).cloned().unwrap_or_else(Chain::empty)),
            Request::Append(key, payload) => {
                let chain = store.entry(*key).or_insert_with(Chain::empty);
                *chain = chain.appended(payload.clone());
                Response::GetResponse(chain.clone())
            }
            Request::GetAndAppend(key, payload) => {
                let chain = store.entry(*key).or_insert_with(Chain::empty);
                *chain = chain.appended(payload.clone());
                Response::GetResponse(chain.clone())
            }
            Request::ReplaceAtHead(key, expect, update) => {
                if let Some(chain) = store.get(key) {
                    if let Some(replaced) = chain.replace_head(expect, update.clone()) {
                        store.insert(*key, replaced);
                    }
                }
                Response::GetResponse(store.get(key).cloned().unwrap_or_else(Chain::empty))
            }
            Request::Clear => {
                store.clear();
                Response::AllInvalidationDone
            }
            Request::ClientInvalidationAck { .. } | Request::ClientInvalidationAllAck { .. } => {
                Response::AllInvalidationDone
            }
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn invoke_wait_sent(&self, request: Request, _replicate: bool) -> Result<(), TransportError> {
        self.require_connected()?;
        if matches!(request, Request::ClientInvalidationAck { .. } | Request::ClientInvalidationAllAck { .. }) {
            self.acks_received.lock().unwrap().push(request);
            return Ok(());
        }
        self.apply(&request);
        Ok(())
    }

    async fn invoke_wait_received(&self, request: Request, _replicate: bool) -> Result<(), TransportError> {
        self.require_connected()?;
        self.apply(&request);
        Ok(())
    }

    async fn invoke_wait_retired(&self, request: Request, _replicate: bool) -> Result<Response, TransportError> {
        self.require_connected()?;
        Ok(self.apply(&request))
    }

    fn add_response_listener(&self, kind: ResponseKind, listener: Arc<dyn ResponseListener>) {
        self.response_listeners.lock().unwrap().insert(kind, listener);
    }

    fn set_reconnect_listener(&self, listener: Arc<dyn ReconnectListener>) {
        *self.reconnect_listener.lock().unwrap() = Some(listener);
    }

    fn set_disconnection_listener(&self, listener: Arc<dyn DisconnectionListener>) {
        *self.disconnection_listener.lock().unwrap() = Some(listener);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn state(&self) -> TransportState {
        if self.is_connected() { TransportState::Connected } else { TransportState::Disconnected }
    }

    fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

pub fn fast_timeouts() -> Timeouts {
    Timeouts { read: Duration::from_millis(200), mutative: Duration::from_millis(200) }
}
