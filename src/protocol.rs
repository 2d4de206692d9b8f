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

//! Wire-level message shapes exchanged with the cluster tier.
//!
//! The transport is a collaborator (see `transport.rs`); this module only
//! defines the tagged variants it carries, so both the proxy and its test
//! double speak the same vocabulary.

use std::collections::HashSet;

use bytes::Bytes;

use crate::chain::{Chain, Key};

/// A request the proxy sends to the cluster tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get(Key),
    Append(Key, Bytes),
    GetAndAppend(Key, Bytes),
    ReplaceAtHead(Key, Bytes, Bytes),
    Clear,
    ClientInvalidationAck { key: Key, invalidation_id: u64 },
    ClientInvalidationAllAck { invalidation_id: u64 },
}

/// A reply or unsolicited notification the cluster tier sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    GetResponse(Chain),
    HashInvalidationDone(Key),
    AllInvalidationDone,
    ServerInvalidateHash(Key),
    ClientInvalidateHash { key: Key, invalidation_id: u64 },
    ClientInvalidateAll { invalidation_id: u64 },
}

/// The tag half of `Response`, used to key the dispatch table and to build
/// `ProxyError::Protocol` messages without cloning the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    GetResponse,
    HashInvalidationDone,
    AllInvalidationDone,
    ServerInvalidateHash,
    ClientInvalidateHash,
    ClientInvalidateAll,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl Response {
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::GetResponse(_) => ResponseKind::GetResponse,
            Response::HashInvalidationDone(_) => ResponseKind::HashInvalidationDone,
            Response::AllInvalidationDone => ResponseKind::AllInvalidationDone,
            Response::ServerInvalidateHash(_) => ResponseKind::ServerInvalidateHash,
            Response::ClientInvalidateHash { .. } => ResponseKind::ClientInvalidateHash,
            Response::ClientInvalidateAll { .. } => ResponseKind::ClientInvalidateAll,
        }
    }
}

/// Handshake payload sent on session re-establishment, populated by the
/// Strong Proxy's reconnect hook before the handshake continues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectMessage {
    pub invalidations_in_progress: HashSet<Key>,
    pub clear_in_progress: bool,
}

impl ReconnectMessage {
    pub fn new() -> Self {
        ReconnectMessage::default()
    }
}
