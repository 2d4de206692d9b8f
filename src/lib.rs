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

//! A client-side cache proxy that layers cluster-wide strong invalidation
//! over a remote chain store.
//!
//! The entry points are [`common_proxy::CommonStoreProxy`] (plain
//! request/response translation, no cross-peer guarantee) and
//! [`strong_proxy::StrongStoreProxy`] (wraps it with a barrier so a mutating
//! call only returns once every connected peer has invalidated its own
//! stale copy). Both run on top of a [`transport::Transport`] the caller
//! supplies; [`testing::FakeTransport`] is an in-memory double for tests.

pub mod chain;
pub mod common_proxy;
pub mod config;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod reconnect;
pub mod strong_proxy;
pub mod transport;
pub mod wait;

/// An in-memory `Transport` double for exercising proxies without a real
/// cluster-tier session. Public so integration tests and downstream crates
/// can build their own scenarios against it.
pub mod testing;

pub use chain::{CacheId, Chain, Key};
pub use common_proxy::CommonStoreProxy;
pub use error::{ProxyError, TransportError};
pub use listener::{InvalidationListener, ReconnectHandle};
pub use reconnect::ReconnectSupervisor;
pub use strong_proxy::StrongStoreProxy;
pub use transport::{ResponseListener, Timeouts, Transport, TransportState};
