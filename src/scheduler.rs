// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Debounced rebuild scheduling.
//!
//! Watch notifications become [`Operation`]s on one queue. A single
//! [`Scheduler`] loop owns the [`ResourceCache`], applies every operation and
//! restarts a quiet-period timer whenever the cache actually changed. When the
//! timer fires, exactly one rebuild cycle runs.
//!
//! Because the same loop drains the queue and runs the rebuild, cycles never
//! overlap and always see a consistent cache.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::ResourceCache;
use crate::engine::SyncEngine;
use crate::metrics;
use crate::resource::WatchedResource;

/// A cache mutation requested by the watch feed.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert or replace a resource
    Add(WatchedResource),
    /// Remove a resource by identity
    Delete(WatchedResource),
}

/// Work run once per quiet period.
#[async_trait]
pub trait Rebuilder: Send {
    /// Run one rebuild cycle over the cache.
    async fn run_cycle(&mut self, cache: &ResourceCache);
}

#[async_trait]
impl Rebuilder for SyncEngine {
    async fn run_cycle(&mut self, cache: &ResourceCache) {
        match self.rebuild(cache).await {
            Ok(summary) => debug!(?summary, "Rebuild cycle finished"),
            Err(e) => error!(error = %e, "Rebuild cycle aborted"),
        }
    }
}

/// Producer side of the operation queue, handed to the watch feed.
#[derive(Debug, Clone)]
pub struct EventHandler {
    sender: mpsc::Sender<Operation>,
}

impl EventHandler {
    /// A resource was added. `initial` marks members of the startup listing.
    pub async fn on_add(&self, resource: impl Into<WatchedResource>, initial: bool) {
        let resource = resource.into();
        debug!(kind = resource.kind(), object = %resource.key(), initial, "Resource added");
        self.enqueue(Operation::Add(resource)).await;
    }

    /// A resource changed. Handled exactly like an add of the new version.
    pub async fn on_update(
        &self,
        _old: impl Into<WatchedResource>,
        new: impl Into<WatchedResource>,
    ) {
        self.on_add(new, false).await;
    }

    /// A resource was deleted. Only its identity is relied upon.
    pub async fn on_delete(&self, resource: impl Into<WatchedResource>) {
        let resource = resource.into();
        debug!(kind = resource.kind(), object = %resource.key(), "Resource deleted");
        self.enqueue(Operation::Delete(resource)).await;
    }

    async fn enqueue(&self, op: Operation) {
        if self.sender.send(op).await.is_err() {
            debug!("Scheduler stopped, dropping operation");
        }
    }
}

/// Single owner of the cache, driving debounced rebuilds.
pub struct Scheduler<R> {
    cache: ResourceCache,
    receiver: mpsc::Receiver<Operation>,
    delay: Duration,
    rebuilder: R,
}

impl<R: Rebuilder> Scheduler<R> {
    /// Create a scheduler and the handler feeding it.
    pub fn new(rebuilder: R, delay: Duration, capacity: usize) -> (Self, EventHandler) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                cache: ResourceCache::new(),
                receiver,
                delay,
                rebuilder,
            },
            EventHandler { sender },
        )
    }

    /// Process operations until `cancel` fires or every handler is dropped.
    ///
    /// Cancellation abandons a pending rebuild. Dropping the last handler runs
    /// it first.
    ///
    /// Returns the rebuilder so callers can inspect it after shutdown.
    pub async fn run(self, cancel: CancellationToken) -> R {
        let Self {
            mut cache,
            mut receiver,
            delay,
            mut rebuilder,
        } = self;
        let mut deadline: Option<Instant> = None;

        info!(debounce = ?delay, "Started scheduler");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                op = receiver.recv() => {
                    let Some(op) = op else {
                        // Every producer is gone; settle the last burst before exiting
                        if deadline.take().is_some() {
                            info!("Operation queue closed, running pending rebuild");
                            rebuilder.run_cycle(&cache).await;
                        }
                        break;
                    };
                    if apply(&mut cache, op) {
                        deadline = Some(Instant::now() + delay);
                    }
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    let (configmaps, services, nodes) = cache.counts();
                    info!(configmaps, services, nodes, "Quiet period elapsed, rebuilding");
                    rebuilder.run_cycle(&cache).await;
                }
            }
        }

        info!("Stopped scheduler");
        rebuilder
    }
}

/// Apply one operation, returning whether the admitted set changed.
fn apply(cache: &mut ResourceCache, op: Operation) -> bool {
    let changed = match op {
        Operation::Add(resource) => cache.insert(resource),
        Operation::Delete(resource) => cache.delete(&resource),
    };

    if changed {
        metrics::record_cache_counts(cache.counts());
    }
    changed
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
