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

//! Collaborator interfaces consumed by the proxy but owned by the caller.

use crate::chain::Key;

/// Upstream cache hook invoked to purge its local tier on invalidation.
pub trait InvalidationListener: Send + Sync {
    fn on_invalidate_hash(&self, key: Key);
    fn on_invalidate_all(&self);
}

/// Upstream hook invoked to reopen caches after the reconnection supervisor
/// detects a fresh session.
pub trait ReconnectHandle: Send + Sync {
    fn on_reconnect(&self);
}
