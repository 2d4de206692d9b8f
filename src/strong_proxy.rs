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

//! The cluster-wide invalidation barrier wrapped around the Common Store Proxy.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use bytes::Bytes;
use scc::HashMap as SccHashMap;
use tokio::time::Instant;

use crate::chain::{CacheId, Chain, Key};
use crate::common_proxy::CommonStoreProxy;
use crate::error::ProxyError;
use crate::listener::InvalidationListener;
use crate::protocol::{ReconnectMessage, Response, ResponseKind};
use crate::transport::{DisconnectionListener, ReconnectListener, ResponseListener, Transport};
use crate::wait::{Signal, SignalInner};

/// Shared state behind the barrier: the pending hash-invalidation table and
/// the pending all-invalidation slot. Held by the proxy itself and by every
/// listener registered on the transport; holds no reference back to the
/// transport, so there is no ownership cycle to break.
struct PendingState {
    hash_table: SccHashMap<Key, Signal, ahash::RandomState>,
    all_slot: ArcSwapOption<SignalInner>,
}

impl PendingState {
    fn new() -> Self {
        PendingState {
            hash_table: SccHashMap::with_hasher(ahash::RandomState::new()),
            all_slot: ArcSwapOption::from(None),
        }
    }

    /// Installs this caller's signal for `key`, or waits on whoever already
    /// owns it and retries. At most one entry per key at any instant.
    async fn acquire_hash(
        self: &Arc<Self>,
        key: Key,
        is_connected: &dyn Fn() -> bool,
        deadline: Instant,
    ) -> Result<PendingHashGuard, ProxyError> {
        loop {
            let signal = Signal::new();
            match self.hash_table.insert_async(key, signal.clone()).await {
                Ok(()) => {
                    return Ok(PendingHashGuard {
                        pending: self.clone(),
                        key,
                        signal,
                        armed: true,
                    });
                }
                Err(_) => {
                    if let Some(existing) = self.hash_table.read_async(&key, |_, v| v.clone()).await
                    {
                        existing.wait(deadline, is_connected).await?;
                    }
                    // Either we waited on the prior owner's release, or it was
                    // removed concurrently between the failed insert and the
                    // read above — either way, retry the insert.
                }
            }
        }
    }

    /// Installs this caller's signal into the all-invalidation slot, or waits
    /// on whoever already owns it and retries.
    async fn acquire_all(
        self: &Arc<Self>,
        is_connected: &dyn Fn() -> bool,
        deadline: Instant,
    ) -> Result<AllSlotGuard, ProxyError> {
        loop {
            let signal = Signal::new();
            let candidate = signal.clone().into_inner_arc();
            let prev = self.all_slot.compare_and_swap(&None::<Arc<SignalInner>>, Some(candidate));
            match &*prev {
                None => {
                    return Ok(AllSlotGuard { pending: self.clone(), signal, armed: true });
                }
                Some(existing_inner) => {
                    let existing = Signal::from_inner_arc(Arc::clone(existing_inner));
                    existing.wait(deadline, is_connected).await?;
                }
            }
        }
    }

    /// `HashInvalidationDone(key)`: remove the entry and fire its signal.
    /// A no-op if the key is absent (repeated delivery / already released).
    async fn release_hash(&self, key: Key) {
        if let Some((_, signal)) = self.hash_table.remove_async(&key).await {
            signal.fire();
        }
    }

    /// `AllInvalidationDone`: take-and-clear the slot, firing its signal if present.
    fn release_all(&self) {
        if let Some(inner) = self.all_slot.swap(None) {
            Signal::from_inner_arc(inner).fire();
        }
    }

    /// `on_disconnect`: fire every pending signal and drain both structures,
    /// so every waiter observes `!is_connected()` instead of hanging forever.
    fn drain_on_disconnect(&self) {
        self.hash_table.retain(|_, signal| {
            signal.fire();
            false
        });
        if let Some(inner) = self.all_slot.swap(None) {
            Signal::from_inner_arc(inner).fire();
        }
    }

    /// `on_reconnect`: snapshot the key set and the all-in-progress flag into
    /// the outgoing handshake message.
    async fn stamp_reconnect(&self, message: &mut ReconnectMessage) {
        let mut keys = HashSet::new();
        self.hash_table
            .scan_async(|key, _| {
                keys.insert(*key);
            })
            .await;
        message.invalidations_in_progress = keys;
        message.clear_in_progress = self.all_slot.load().is_some();
    }

    fn pending_keys(&self) -> HashSet<Key> {
        let mut keys = HashSet::new();
        self.hash_table.scan(|key, _| {
            keys.insert(*key);
        });
        keys
    }

    fn all_in_progress(&self) -> bool {
        self.all_slot.load().is_some()
    }
}

/// Owns one per-key pending-table entry. Normal completion removes the entry
/// via the `HashInvalidationDone` listener and disarms this guard; dropping it
/// while still armed means the caller's own future was abandoned mid-wait, so
/// the guard releases the slot itself rather than leaving other same-key
/// waiters stuck on a signal nobody will ever fire.
struct PendingHashGuard {
    pending: Arc<PendingState>,
    key: Key,
    signal: Signal,
    armed: bool,
}

impl PendingHashGuard {
    fn signal(&self) -> &Signal {
        &self.signal
    }

    /// The wrapped operation failed: remove the entry and fire immediately so
    /// nobody waits on a mutation that never happened.
    fn release_on_error(&mut self) {
        self.pending.hash_table.remove(&self.key);
        self.signal.fire();
        self.armed = false;
    }

    /// The wait for `HashInvalidationDone` concluded (successfully or via
    /// timeout/disconnect past this point is the caller's concern, not the
    /// table's): stop tracking this guard without touching the table, since
    /// either the listener already removed it or a timeout deliberately
    /// leaves it for server reconciliation.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingHashGuard {
    fn drop(&mut self) {
        if self.armed {
            self.pending.hash_table.remove(&self.key);
            self.signal.fire();
        }
    }
}

/// Owns the pending all-invalidation slot, mirroring `PendingHashGuard`.
struct AllSlotGuard {
    pending: Arc<PendingState>,
    signal: Signal,
    armed: bool,
}

impl AllSlotGuard {
    fn signal(&self) -> &Signal {
        &self.signal
    }

    fn release_on_error(&mut self) {
        self.pending.all_slot.swap(None);
        self.signal.fire();
        self.armed = false;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AllSlotGuard {
    fn drop(&mut self) {
        if self.armed {
            self.pending.all_slot.swap(None);
            self.signal.fire();
        }
    }
}

struct HashInvalidationDoneListener {
    pending: Arc<PendingState>,
}

#[async_trait]
impl ResponseListener for HashInvalidationDoneListener {
    async fn on_response(&self, response: Response) {
        if let Response::HashInvalidationDone(key) = response {
            self.pending.release_hash(key).await;
        }
    }
}

struct AllInvalidationDoneListener {
    pending: Arc<PendingState>,
}

#[async_trait]
impl ResponseListener for AllInvalidationDoneListener {
    async fn on_response(&self, response: Response) {
        if matches!(response, Response::AllInvalidationDone) {
            self.pending.release_all();
        }
    }
}

struct DisconnectHook {
    pending: Arc<PendingState>,
}

impl DisconnectionListener for DisconnectHook {
    fn on_disconnect(&self) {
        tracing::info!("transport disconnected, draining pending invalidation barriers");
        self.pending.drain_on_disconnect();
    }
}

struct ReconnectHook {
    pending: Arc<PendingState>,
}

#[async_trait]
impl ReconnectListener for ReconnectHook {
    async fn on_reconnect(&self, message: &mut ReconnectMessage) {
        self.pending.stamp_reconnect(message).await;
        tracing::info!(
            keys = message.invalidations_in_progress.len(),
            clear_in_progress = message.clear_in_progress,
            "stamped reconnect handshake with in-flight barriers"
        );
    }
}

/// Wraps a `CommonStoreProxy` and adds the cluster-wide invalidation barrier:
/// a mutating call only returns once every connected peer has acknowledged
/// the invalidation it triggered.
pub struct StrongStoreProxy {
    common: Arc<CommonStoreProxy>,
    pending: Arc<PendingState>,
}

impl StrongStoreProxy {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache_id: CacheId,
        invalidation: Arc<dyn InvalidationListener>,
    ) -> Arc<StrongStoreProxy> {
        let common = CommonStoreProxy::new(transport.clone(), cache_id, invalidation);
        let pending = Arc::new(PendingState::new());

        transport.add_response_listener(
            ResponseKind::HashInvalidationDone,
            Arc::new(HashInvalidationDoneListener { pending: pending.clone() }),
        );
        transport.add_response_listener(
            ResponseKind::AllInvalidationDone,
            Arc::new(AllInvalidationDoneListener { pending: pending.clone() }),
        );
        transport.set_disconnection_listener(Arc::new(DisconnectHook { pending: pending.clone() }));
        transport.set_reconnect_listener(Arc::new(ReconnectHook { pending: pending.clone() }));

        Arc::new(StrongStoreProxy { common, pending })
    }

    pub fn cache_id(&self) -> &CacheId {
        self.common.cache_id()
    }

    /// Pure read: no barrier, delegates straight to the Common Proxy.
    pub async fn get(&self, key: Key) -> Result<Chain, ProxyError> {
        self.common.get(key).await
    }

    /// Fire-and-forget optimistic CAS: no barrier (the server silently drops
    /// it if the precondition fails, so there is nothing for peers to
    /// acknowledge on the client's behalf).
    pub async fn replace_at_head(
        &self,
        key: Key,
        expect: Bytes,
        update: Bytes,
    ) -> Result<(), ProxyError> {
        self.common.replace_at_head(key, expect, update).await
    }

    pub async fn append(&self, key: Key, payload: Bytes) -> Result<(), ProxyError> {
        let (deadline, is_connected) = self.deadline_and_probe();
        let mut guard = self.pending.acquire_hash(key, &is_connected, deadline).await?;

        if let Err(err) = self.common.append(key, payload).await {
            guard.release_on_error();
            return Err(err);
        }

        let outcome = guard.signal().wait(deadline, &is_connected).await;
        guard.disarm();
        outcome
    }

    pub async fn get_and_append(&self, key: Key, payload: Bytes) -> Result<Chain, ProxyError> {
        let (deadline, is_connected) = self.deadline_and_probe();
        let mut guard = self.pending.acquire_hash(key, &is_connected, deadline).await?;

        let chain = match self.common.get_and_append(key, payload).await {
            Ok(chain) => chain,
            Err(err) => {
                guard.release_on_error();
                return Err(err);
            }
        };

        match guard.signal().wait(deadline, &is_connected).await {
            Ok(()) => {
                guard.disarm();
                Ok(chain)
            }
            Err(err) => {
                guard.disarm();
                Err(err)
            }
        }
    }

    pub async fn clear(&self) -> Result<(), ProxyError> {
        let (deadline, is_connected) = self.deadline_and_probe();
        let mut guard = self.pending.acquire_all(&is_connected, deadline).await?;

        if let Err(err) = self.common.clear().await {
            guard.release_on_error();
            return Err(err);
        }

        let outcome = guard.signal().wait(deadline, &is_connected).await;
        guard.disarm();
        outcome
    }

    fn deadline_and_probe(&self) -> (Instant, impl Fn() -> bool + '_) {
        let transport = self.common.transport();
        let deadline = Instant::now() + transport.timeouts().mutative;
        (deadline, move || transport.is_connected())
    }

    /// Test/observability hook: the key set currently installed in the
    /// pending hash-invalidation table.
    pub fn pending_keys(&self) -> HashSet<Key> {
        self.pending.pending_keys()
    }

    /// Test/observability hook: whether a `clear()` barrier is installed.
    pub fn clear_in_progress(&self) -> bool {
        self.pending.all_in_progress()
    }
}
