// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Notify;

/// A cancel handle is shared between a playback session and the tasks working on its behalf.
/// Each task is responsible for respecting a cancel request.
#[derive(Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    /// Set to true once the handle has been cancelled. Never reset.
    cancelled: AtomicBool,
    /// Wakes any task waiting in `cancelled()`.
    notify: Notify,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    /// Returns true if the handle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cancels the handle. Returns true only for the call that performed the transition, so
    /// callers can use the return value to run cleanup exactly once.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Resolves once the handle has been cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking the flag so a concurrent cancel can't be missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_handle_cancelled() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            tokio::spawn(async move { cancel_handle.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cancel_handle.cancel());
        assert!(tokio::time::timeout(Duration::from_secs(1), join).await.is_ok());
        assert!(cancel_handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_only_transitions_once() {
        let cancel_handle = CancelHandle::new();
        assert!(cancel_handle.cancel());
        assert!(!cancel_handle.cancel());
        assert!(!cancel_handle.clone().cancel());

        // Already cancelled handles resolve immediately.
        assert!(
            tokio::time::timeout(Duration::from_millis(100), cancel_handle.cancelled())
                .await
                .is_ok()
        );
    }
}
