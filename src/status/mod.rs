// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Write-back of derived corrections onto live cluster objects.
//!
//! Producers hand a [`StatusUpdate`] to a [`StatusWriter`]. One
//! [`StatusUpdateHandler`] loop drains the queue and, for every request:
//!
//! 1. fetches the current object
//! 2. runs the request's mutator on it
//! 3. replaces the object when the mutator changed its spec
//! 4. writes the status subresource when the mutator changed its status
//!
//! A write conflict restarts the whole sequence from the fetch, under
//! [`conflict_backoff`]. Any other error drops the request.
//!
//! [`StatusWriter::send`] never blocks: requests are dropped while the
//! handler loop has not started yet, and dropped with a warning when the
//! queue is full.

pub mod ports;
pub mod store;

use kube::Resource;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::WriteError;
use crate::metrics;
use crate::resource::NamespacedName;
use crate::retry::{conflict_backoff, retry_with_backoff};

pub use store::{KubeStore, ObjectStore};

/// Result of running a mutator against a freshly fetched object.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<K> {
    /// Nothing to write
    Unchanged,
    /// A modified copy and which parts of it must be written
    Changed {
        /// The modified copy
        object: K,
        /// Replace the whole object
        spec_changed: bool,
        /// Write the status subresource
        status_changed: bool,
    },
}

/// Pure function from the current object to the desired change.
///
/// It must never depend on anything but its argument, as it is re-run on
/// every conflict retry.
pub type Mutator<K> = Arc<dyn Fn(&K) -> Mutation<K> + Send + Sync>;

/// One write-back request, consumed at most once.
#[derive(Clone)]
pub struct StatusUpdate<K> {
    /// Identity of the target object
    pub key: NamespacedName,
    /// Change to apply on the live object
    pub mutator: Mutator<K>,
}

impl<K> StatusUpdate<K> {
    /// Request that `mutator` be applied to the live object named `key`.
    pub fn new(key: NamespacedName, mutator: impl Fn(&K) -> Mutation<K> + Send + Sync + 'static) -> Self {
        Self {
            key,
            mutator: Arc::new(mutator),
        }
    }
}

impl<K> fmt::Debug for StatusUpdate<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusUpdate").field("key", &self.key).finish_non_exhaustive()
    }
}

/// What one successful apply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The mutator requested no change
    Unchanged,
    /// At least one write was issued
    Written,
}

/// Producer side of the write-back queue.
#[derive(Clone)]
pub struct StatusWriter<K> {
    sender: mpsc::Sender<StatusUpdate<K>>,
    ready: watch::Receiver<bool>,
}

impl<K: Resource<DynamicType = ()>> StatusWriter<K> {
    /// Queue a request without waiting.
    ///
    /// Returns whether the request was queued.
    pub fn send(&self, update: StatusUpdate<K>) -> bool {
        if !*self.ready.borrow() {
            debug!(object = %update.key, "Write-back handler not running, dropping request");
            metrics::record_write_back(K::kind(&()).as_ref(), "dropped");
            return false;
        }

        match self.sender.try_send(update) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(update)) => {
                warn!(object = %update.key, "Write-back queue full, dropping request");
                metrics::record_write_back(K::kind(&()).as_ref(), "dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(update)) => {
                debug!(object = %update.key, "Write-back handler stopped, dropping request");
                false
            }
        }
    }
}

/// Single consumer applying [`StatusUpdate`]s to live objects.
pub struct StatusUpdateHandler<K, S> {
    store: S,
    sender: mpsc::Sender<StatusUpdate<K>>,
    receiver: mpsc::Receiver<StatusUpdate<K>>,
    ready: watch::Sender<bool>,
}

impl<K, S> StatusUpdateHandler<K, S>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
    S: ObjectStore<K>,
{
    /// Create a handler whose queue holds at most `capacity` requests.
    pub fn new(store: S, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (ready, _) = watch::channel(false);
        Self {
            store,
            sender,
            receiver,
            ready,
        }
    }

    /// A producer handle. Requests sent before [`Self::run`] starts are dropped.
    #[must_use]
    pub fn writer(&self) -> StatusWriter<K> {
        StatusWriter {
            sender: self.sender.clone(),
            ready: self.ready.subscribe(),
        }
    }

    /// Drain the queue until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            store,
            sender: _sender,
            mut receiver,
            ready,
        } = self;
        let kind = K::kind(&()).to_string();
        info!(kind = %kind, "Started write-back handler");
        ready.send_replace(true);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                update = receiver.recv() => match update {
                    Some(update) => apply_update(&store, &update).await,
                    None => break,
                },
            }
        }

        ready.send_replace(false);
        info!(kind = %kind, "Stopped write-back handler");
    }

    /// Apply one request outside the loop.
    pub async fn apply(&self, update: &StatusUpdate<K>) {
        apply_update(&self.store, update).await;
    }
}

/// Apply one request, retrying the whole fetch/mutate/write sequence on conflict.
async fn apply_update<K, S>(store: &S, update: &StatusUpdate<K>)
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
    S: ObjectStore<K>,
{
    let kind = K::kind(&()).to_string();
    let operation = format!("write-back {kind} {}", update.key);

    let result = retry_with_backoff(
        conflict_backoff(),
        &operation,
        WriteError::is_conflict,
        || apply_once(store, update),
    )
    .await;

    match result {
        Ok(WriteOutcome::Unchanged) => {
            debug!(kind = %kind, object = %update.key, "Write-back skipped, no change");
            metrics::record_write_back(&kind, "unchanged");
        }
        Ok(WriteOutcome::Written) => {
            info!(kind = %kind, object = %update.key, "Write-back applied");
            metrics::record_write_back(&kind, "written");
        }
        Err(e) => {
            error!(kind = %kind, object = %update.key, error = %e, "Write-back failed, dropping request");
            metrics::record_write_back(&kind, "failed");
        }
    }
}

async fn apply_once<K, S>(store: &S, update: &StatusUpdate<K>) -> Result<WriteOutcome, WriteError>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
    S: ObjectStore<K>,
{
    let current = store.get(&update.key).await?;

    let Mutation::Changed {
        mut object,
        spec_changed,
        status_changed,
    } = (update.mutator)(&current)
    else {
        return Ok(WriteOutcome::Unchanged);
    };

    if !spec_changed && !status_changed {
        return Ok(WriteOutcome::Unchanged);
    }

    if spec_changed {
        let stored = store.replace(&update.key, &object).await?;
        object.meta_mut().resource_version = stored.meta().resource_version.clone();
        debug!(object = %update.key, "Replaced object");
    }

    if status_changed {
        store.replace_status(&update.key, &object).await?;
        debug!(object = %update.key, "Wrote status");
    }

    Ok(WriteOutcome::Written)
}
