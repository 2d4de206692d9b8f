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

//! The single-shot signal backing every barrier wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::ProxyError;

/// A primitive that transitions irrevocably from un-fired to fired.
/// Multiple waiters observe the same edge; firing after the fact is a no-op.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

pub(crate) struct SignalInner {
    fired: AtomicBool,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Signal {
            inner: Arc::new(SignalInner {
                fired: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Used by the all-invalidation slot, which stores the signal behind an
    /// `ArcSwapOption` directly rather than double-wrapping in another `Arc`.
    pub(crate) fn into_inner_arc(self) -> Arc<SignalInner> {
        self.inner
    }

    pub(crate) fn from_inner_arc(inner: Arc<SignalInner>) -> Signal {
        Signal { inner }
    }

    /// Fires the signal, waking every current and future waiter. Idempotent.
    pub fn fire(&self) {
        self.inner.fired.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Waits until the signal fires or `deadline` elapses.
    ///
    /// Returns `Ok(())` iff the signal fired and `is_connected` still reports
    /// true at that instant. Returns `Err(Disconnected)` if the signal fired
    /// while the transport was down (this is how `on_disconnect` unblocks
    /// every waiter instead of letting them succeed silently), and
    /// `Err(Timeout)` if `deadline` elapses first.
    pub async fn wait(
        &self,
        deadline: Instant,
        is_connected: &dyn Fn() -> bool,
    ) -> Result<(), ProxyError> {
        loop {
            // Register interest before checking state so a `fire()` racing
            // with this check is never missed (standard tokio::sync::Notify
            // pattern: the Notified future, once created, is guaranteed to
            // observe any notify_waiters() call that happens after creation).
            let notified = self.inner.notify.notified();
            if self.inner.fired.load(Ordering::Acquire) {
                return if is_connected() { Ok(()) } else { Err(ProxyError::Disconnected) };
            }
            tokio::select! {
                _ = notified => {
                    if self.inner.fired.load(Ordering::Acquire) {
                        return if is_connected() { Ok(()) } else { Err(ProxyError::Disconnected) };
                    }
                    // Spurious wake: loop and recheck.
                }
                _ = tokio::time::sleep_until(deadline) => return Err(ProxyError::Timeout),
            }
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Signal::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_before_wait_is_observed_immediately() {
        let signal = Signal::new();
        signal.fire();
        let deadline = Instant::now() + Duration::from_millis(50);
        assert!(signal.wait(deadline, &|| true).await.is_ok());
    }

    #[tokio::test]
    async fn times_out_when_never_fired() {
        let signal = Signal::new();
        let deadline = Instant::now() + Duration::from_millis(30);
        let err = signal.wait(deadline, &|| true).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn fire_wakes_concurrent_waiter() {
        let signal = Signal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move {
                let deadline = Instant::now() + Duration::from_secs(1);
                signal.wait(deadline, &|| true).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.fire();
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn fire_while_disconnected_reports_disconnected() {
        let signal = Signal::new();
        signal.fire();
        let deadline = Instant::now() + Duration::from_millis(50);
        let err = signal.wait(deadline, &|| false).await.unwrap_err();
        assert!(err.is_disconnected());
    }
}
