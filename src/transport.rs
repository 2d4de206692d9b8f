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

//! The Message Transport collaborator interface.
//!
//! This is a fixed external interface: the crate ships the trait and a
//! deterministic in-memory fake (`crate::testing::FakeTransport`) for its own
//! tests, but never a production wire implementation — that lives outside
//! this crate's scope (see Non-goals in `SPEC_FULL.md`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::protocol::{ReconnectMessage, Request, Response, ResponseKind};

/// Connection lifecycle of the underlying session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connected,
    Disconnecting,
    Disconnected,
    Reconnecting,
}

/// The two scalar deadlines a transport exposes to its proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
    pub mutative: Duration,
}

/// Handler for unsolicited server messages of one `ResponseKind`.
///
/// Invoked concurrently with caller operations, but the transport serializes
/// calls to handlers registered under the same kind.
#[async_trait]
pub trait ResponseListener: Send + Sync {
    async fn on_response(&self, response: Response);
}

/// Single-shot hook fired during session re-establishment, before the
/// handshake completes, so the proxy can stamp its in-flight invalidations
/// into the outgoing `ReconnectMessage`.
#[async_trait]
pub trait ReconnectListener: Send + Sync {
    async fn on_reconnect(&self, message: &mut ReconnectMessage);
}

/// Single-shot hook fired when the session is lost.
pub trait DisconnectionListener: Send + Sync {
    fn on_disconnect(&self);
}

/// The transport collaborator: send one request, observe zero-or-more
/// asynchronous responses, react to connection state changes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns once the outbound frame is flushed; no response is expected.
    async fn invoke_wait_sent(&self, request: Request, replicate: bool) -> Result<(), TransportError>;

    /// Returns once the server has acknowledged receipt, before applying.
    async fn invoke_wait_received(&self, request: Request, replicate: bool) -> Result<(), TransportError>;

    /// Returns once the server has fully applied, replicated (if requested),
    /// and replied. The only mode that returns application data.
    async fn invoke_wait_retired(&self, request: Request, replicate: bool) -> Result<Response, TransportError>;

    /// Registers a handler for unsolicited messages of `kind`. Replaces any
    /// previously registered handler for that kind.
    fn add_response_listener(&self, kind: ResponseKind, listener: Arc<dyn ResponseListener>);

    /// Single-shot registration fired on session re-establishment.
    fn set_reconnect_listener(&self, listener: Arc<dyn ReconnectListener>);

    /// Single-shot registration fired when the session is lost.
    fn set_disconnection_listener(&self, listener: Arc<dyn DisconnectionListener>);

    fn is_connected(&self) -> bool;

    fn state(&self) -> TransportState {
        if self.is_connected() {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    fn timeouts(&self) -> Timeouts;
}
