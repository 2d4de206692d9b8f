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

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A 64-bit content-hash identifying an application key inside one cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub u64);

impl Key {
    pub fn new(hash: u64) -> Self {
        Key(hash)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:#018x})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Key(value)
    }
}

/// A short identifier for one logical cache inside a cluster tier.
///
/// Cheap to clone: internally an `Arc<str>` so it can be passed across
/// tasks without reallocating.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheId(Arc<str>);

impl CacheId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        CacheId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheId({:?})", self.0)
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheId {
    fn from(value: &str) -> Self {
        CacheId(Arc::from(value))
    }
}

impl From<String> for CacheId {
    fn from(value: String) -> Self {
        CacheId(Arc::from(value.into_boxed_str()))
    }
}

/// An ordered sequence of opaque binary payloads the server associates with one key.
///
/// Immutable from the client's standpoint: every read returns a fresh snapshot.
/// Equality is structural over the payload sequence.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Chain {
    entries: Vec<Bytes>,
}

impl Chain {
    pub fn empty() -> Self {
        Chain { entries: Vec::new() }
    }

    pub fn from_entries(entries: Vec<Bytes>) -> Self {
        Chain { entries }
    }

    pub fn entries(&self) -> &[Bytes] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently appended payload, if any.
    pub fn tail(&self) -> Option<&Bytes> {
        self.entries.last()
    }

    /// Returns a new chain with `payload` appended at the tail.
    pub fn appended(&self, payload: Bytes) -> Chain {
        let mut entries = self.entries.clone();
        entries.push(payload);
        Chain { entries }
    }

    /// Returns a new chain with the head replaced if `expect` matches the current head.
    ///
    /// Mirrors the server's optimistic CAS: silently returns `None` when the
    /// precondition does not hold, matching `replace_at_head`'s fire-and-forget semantics.
    pub fn replace_head(&self, expect: &Bytes, update: Bytes) -> Option<Chain> {
        match self.entries.first() {
            Some(head) if head == expect => {
                let mut entries = self.entries.clone();
                entries[0] = update;
                Some(Chain { entries })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("len", &self.entries.len()).finish()
    }
}
