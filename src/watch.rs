// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch feed: turns `kube` watcher streams into scheduler notifications.
//!
//! | watcher event | notification |
//! |---|---|
//! | `InitApply` | `on_add(initial = true)` |
//! | `Apply` | `on_add(initial = false)` |
//! | `Delete` | `on_delete` |
//!
//! A relist does not report objects deleted while the watch was down. Keys
//! known before a relist but absent from it are reported as identity-only
//! deletes once the relist completes.

use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Node, Service};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::resource::{NamespacedName, WatchedResource};
use crate::scheduler::EventHandler;

/// A notification derived from one watcher event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<K> {
    /// Object added or changed; `initial` marks members of a listing
    Added { object: K, initial: bool },
    /// Object removed
    Deleted(K),
}

/// Keys of one kind currently known to the scheduler.
#[derive(Debug, Default)]
pub struct KeyTracker {
    known: BTreeSet<NamespacedName>,
    relisted: Option<BTreeSet<NamespacedName>>,
}

impl KeyTracker {
    /// Translate one watcher event, updating the known keys.
    pub fn observe<K>(&mut self, event: Event<K>) -> Vec<Notification<K>>
    where
        K: Resource + Default,
    {
        match event {
            Event::Init => {
                self.relisted = Some(BTreeSet::new());
                Vec::new()
            }
            Event::InitApply(object) => {
                let key = key_of(&object);
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(key.clone());
                }
                self.known.insert(key);
                vec![Notification::Added {
                    object,
                    initial: true,
                }]
            }
            Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };
                let stale: Vec<NamespacedName> = self.known.difference(&relisted).cloned().collect();
                self.known = relisted;
                stale
                    .into_iter()
                    .map(|key| Notification::Deleted(identity_only(&key)))
                    .collect()
            }
            Event::Apply(object) => {
                self.known.insert(key_of(&object));
                vec![Notification::Added {
                    object,
                    initial: false,
                }]
            }
            Event::Delete(object) => {
                self.known.remove(&key_of(&object));
                vec![Notification::Deleted(object)]
            }
        }
    }
}

fn key_of<K: Resource>(object: &K) -> NamespacedName {
    let meta = object.meta();
    NamespacedName::new(
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

/// An empty object carrying only an identity.
fn identity_only<K: Resource + Default>(key: &NamespacedName) -> K {
    let mut object = K::default();
    let meta = object.meta_mut();
    meta.name = Some(key.name.clone());
    if !key.namespace.is_empty() {
        meta.namespace = Some(key.namespace.clone());
    }
    object
}

/// Watch config maps, services and nodes across all namespaces until `cancel` fires.
pub async fn watch_cluster(client: Client, handler: EventHandler, cancel: CancellationToken) {
    info!("Starting watches for ConfigMap, Service and Node");
    tokio::join!(
        watch_kind(Api::<ConfigMap>::all(client.clone()), handler.clone(), cancel.clone()),
        watch_kind(Api::<Service>::all(client.clone()), handler.clone(), cancel.clone()),
        watch_kind(Api::<Node>::all(client), handler, cancel),
    );
    info!("Stopped watches");
}

/// Feed one kind's watch stream into the scheduler.
///
/// Stream errors are logged; the watcher retries with its default backoff.
pub async fn watch_kind<K>(api: Api<K>, handler: EventHandler, cancel: CancellationToken)
where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Default
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    K: Into<WatchedResource>,
{
    let kind = K::kind(&()).to_string();
    let mut tracker = KeyTracker::default();
    let mut stream = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = stream.next() => match event {
                Some(Ok(event)) => {
                    for notification in tracker.observe(event) {
                        match notification {
                            Notification::Added { object, initial } => handler.on_add(object, initial).await,
                            Notification::Deleted(object) => handler.on_delete(object).await,
                        }
                    }
                }
                Some(Err(e)) => warn!(kind = %kind, error = %e, "Watch error, retrying"),
                None => {
                    debug!(kind = %kind, "Watch stream ended");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;
