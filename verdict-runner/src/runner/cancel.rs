// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use tokio::sync::watch;

/// Creates a connected cancellation handle and receiver.
pub fn cancel_pair() -> (CancelHandle, CancelReceiver) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelReceiver { receiver })
}

/// Requests cancellation of a run. Cloneable, so that a signal handler and a UI can share it.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Requests cancellation. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// The receiving end of a [`CancelHandle`].
#[derive(Clone, Debug)]
pub struct CancelReceiver {
    receiver: watch::Receiver<bool>,
}

impl CancelReceiver {
    /// Returns a receiver that is never cancelled.
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested.
    ///
    /// If every handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_receiver() {
        let (handle, mut receiver) = cancel_pair();
        assert!(!receiver.is_cancelled());

        let waiter = tokio::spawn(async move {
            receiver.cancelled().await;
            receiver.is_cancelled()
        });
        handle.clone().cancel();
        assert!(handle.is_cancelled());
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() {
        let (handle, mut receiver) = cancel_pair();
        drop(handle);
        let result =
            tokio::time::timeout(Duration::from_millis(20), receiver.cancelled()).await;
        assert!(result.is_err(), "cancelled() must stay pending");
    }
}
