//! Replay-then-live event stream handed to a watch caller.

use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::bus::Subscription;
use super::types::RegistryEvent;
use crate::errors::{CatalogError, Result};

/// Snapshot events followed by the live events of one subscription.
///
/// The subscription stays registered until the watch is dropped.
pub struct RegistryWatch {
    replay: VecDeque<RegistryEvent>,
    subscription: Subscription,
}

impl RegistryWatch {
    pub fn new(replay: Vec<RegistryEvent>, subscription: Subscription) -> Self {
        Self { replay: replay.into(), subscription }
    }

    /// Number of snapshot events not yet delivered
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    pub async fn next(&mut self) -> Option<Result<RegistryEvent>> {
        if let Some(event) = self.replay.pop_front() {
            return Some(Ok(event));
        }
        self.subscription.recv().await
    }

    /// Stream adapter for transports that consume `Stream`s; ends after the first error
    pub fn into_stream(mut self) -> impl Stream<Item = Result<RegistryEvent>> + Send {
        async_stream::stream! {
            while let Some(item) = self.next().await {
                let failed = item.is_err();
                yield item;
                if failed {
                    break;
                }
            }
        }
    }

    /// Push events into `send` until the caller cancels, the consumer fails or the bus evicts this watch.
    pub async fn forward<F, Fut, E>(mut self, cancel: CancellationToken, mut send: F) -> Result<()>
    where
        F: FnMut(RegistryEvent) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: fmt::Display,
    {
        let subscription_id = self.subscription.id();
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(subscription_id = %subscription_id, "Watch cancelled by caller");
                    return Ok(());
                }
                item = self.next() => item,
            };

            match item {
                Some(Ok(event)) => {
                    if let Err(e) = send(event).await {
                        debug!(subscription_id = %subscription_id, error = %e, "Watch consumer failed");
                        return Err(CatalogError::unavailable(format!("failed to send registry event: {}", e)));
                    }
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }
}

impl fmt::Debug for RegistryWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryWatch")
            .field("subscription", &self.subscription)
            .field("pending_replay", &self.replay.len())
            .finish()
    }
}
