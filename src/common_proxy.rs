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

//! The stateless translator between cache operations and transport messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::Bytes;

use crate::chain::{CacheId, Chain, Key};
use crate::error::ProxyError;
use crate::listener::InvalidationListener;
use crate::protocol::{Request, Response, ResponseKind};
use crate::transport::{ResponseListener, Transport};

/// Translates `get`/`append`/`getAndAppend`/`replaceAtHead`/`clear` into
/// transport calls, and fans inbound peer-invalidation notifications out to
/// an `InvalidationListener`, acking the ones the server requires.
///
/// Never blocks on its own behalf: every method either returns once the
/// transport's chosen wait mode completes, or propagates the transport's
/// error. It performs no barrier waiting — that is the Strong Store Proxy's job.
pub struct CommonStoreProxy {
    transport: Arc<dyn Transport>,
    cache_id: CacheId,
    closed: AtomicBool,
}

impl CommonStoreProxy {
    /// Builds a proxy and registers its three response listeners on `transport`.
    pub fn new(
        transport: Arc<dyn Transport>,
        cache_id: CacheId,
        invalidation: Arc<dyn InvalidationListener>,
    ) -> Arc<CommonStoreProxy> {
        let weak_transport = Arc::downgrade(&transport);

        transport.add_response_listener(
            ResponseKind::ServerInvalidateHash,
            Arc::new(ServerInvalidateHashListener { invalidation: invalidation.clone() }),
        );
        transport.add_response_listener(
            ResponseKind::ClientInvalidateHash,
            Arc::new(ClientInvalidateHashListener {
                invalidation: invalidation.clone(),
                transport: weak_transport.clone(),
            }),
        );
        transport.add_response_listener(
            ResponseKind::ClientInvalidateAll,
            Arc::new(ClientInvalidateAllListener { invalidation, transport: weak_transport }),
        );

        Arc::new(CommonStoreProxy { transport, cache_id, closed: AtomicBool::new(false) })
    }

    pub fn cache_id(&self) -> &CacheId {
        &self.cache_id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Retired wait with the transport's read timeout; demands `GetResponse`.
    pub async fn get(&self, key: Key) -> Result<Chain, ProxyError> {
        self.fail_if_closed()?;
        let response = self.transport.invoke_wait_retired(Request::Get(key), false).await?;
        expect_get_response(response)
    }

    /// Received wait with the mutative timeout; replicated; response discarded.
    pub async fn append(&self, key: Key, payload: Bytes) -> Result<(), ProxyError> {
        self.fail_if_closed()?;
        self.transport.invoke_wait_received(Request::Append(key, payload), true).await?;
        Ok(())
    }

    /// Retired wait with the mutative timeout; replicated; demands `GetResponse`.
    pub async fn get_and_append(&self, key: Key, payload: Bytes) -> Result<Chain, ProxyError> {
        self.fail_if_closed()?;
        let response =
            self.transport.invoke_wait_retired(Request::GetAndAppend(key, payload), true).await?;
        expect_get_response(response)
    }

    /// Sent wait: fire-and-forget optimistic CAS. The server silently ignores
    /// the request if `expect` no longer matches the chain prefix.
    pub async fn replace_at_head(
        &self,
        key: Key,
        expect: Bytes,
        update: Bytes,
    ) -> Result<(), ProxyError> {
        self.fail_if_closed()?;
        self.transport
            .invoke_wait_sent(Request::ReplaceAtHead(key, expect, update), false)
            .await?;
        Ok(())
    }

    /// Retired wait with the mutative timeout.
    pub async fn clear(&self) -> Result<(), ProxyError> {
        self.fail_if_closed()?;
        self.transport.invoke_wait_retired(Request::Clear, true).await?;
        Ok(())
    }

    /// Detaches this proxy from further use. The transport keeps the
    /// registered listeners alive (it is a fixed external interface with no
    /// unregister hook) but subsequent calls on this proxy fail fast.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn fail_if_closed(&self) -> Result<(), ProxyError> {
        if self.is_closed() {
            Err(ProxyError::Closed)
        } else {
            Ok(())
        }
    }
}

fn expect_get_response(response: Response) -> Result<Chain, ProxyError> {
    match response {
        Response::GetResponse(chain) => Ok(chain),
        other => Err(ProxyError::Protocol(format!("invalid response: {}", other.kind()))),
    }
}

/// `ServerInvalidateHash` is advisory: the server notifies but does not wait
/// for acknowledgement.
struct ServerInvalidateHashListener {
    invalidation: Arc<dyn InvalidationListener>,
}

#[async_trait]
impl ResponseListener for ServerInvalidateHashListener {
    async fn on_response(&self, response: Response) {
        if let Response::ServerInvalidateHash(key) = response {
            tracing::trace!(%key, "server-invalidate advisory notification");
            self.invalidation.on_invalidate_hash(key);
        }
    }
}

/// `ClientInvalidateHash` requires an ack before the server releases the
/// originating mutation's barrier on every peer.
struct ClientInvalidateHashListener {
    invalidation: Arc<dyn InvalidationListener>,
    // Weak, not Arc: the transport owns this listener, so holding a strong
    // reference back to the transport would create an ownership cycle.
    transport: Weak<dyn Transport>,
}

#[async_trait]
impl ResponseListener for ClientInvalidateHashListener {
    async fn on_response(&self, response: Response) {
        if let Response::ClientInvalidateHash { key, invalidation_id } = response {
            self.invalidation.on_invalidate_hash(key);
            let Some(transport) = self.transport.upgrade() else {
                return;
            };
            let ack = Request::ClientInvalidationAck { key, invalidation_id };
            if let Err(err) = transport.invoke_wait_sent(ack, false).await {
                tracing::warn!(%key, invalidation_id, error = %err, "failed to send client invalidation ack");
            }
        }
    }
}

/// `ClientInvalidateAll` requires an ack before the server releases the
/// originating `clear`'s barrier on every peer.
struct ClientInvalidateAllListener {
    invalidation: Arc<dyn InvalidationListener>,
    transport: Weak<dyn Transport>,
}

#[async_trait]
impl ResponseListener for ClientInvalidateAllListener {
    async fn on_response(&self, response: Response) {
        if let Response::ClientInvalidateAll { invalidation_id } = response {
            self.invalidation.on_invalidate_all();
            let Some(transport) = self.transport.upgrade() else {
                return;
            };
            let ack = Request::ClientInvalidationAllAck { invalidation_id };
            if let Err(err) = transport.invoke_wait_sent(ack, false).await {
                tracing::warn!(invalidation_id, error = %err, "failed to send client invalidation-all ack");
            }
        }
    }
}
