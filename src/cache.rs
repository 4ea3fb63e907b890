// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory view of the tracked cluster resources.
//!
//! The cache is owned by exactly one task (the debounce loop) and therefore
//! has no internal locking. Each kind has an admission predicate:
//!
//! - `ConfigMap` must carry `nacosbridge.io/config=true`
//! - `Service` must carry the publish label `nacosbridge.io/service`
//! - `Node` is always admitted
//!
//! [`ResourceCache::insert`] and [`ResourceCache::delete`] report whether the
//! admitted set changed, which is what drives the debounce timer.

use k8s_openapi::api::core::v1::{ConfigMap, Node, Service};
use std::collections::BTreeMap;
use tracing::debug;

use crate::labels;
use crate::resource::{label_is_true, NamespacedName, WatchedResource};

/// Admitted resources keyed by identity, one map per kind.
///
/// Maps are ordered so every rebuild walks resources in the same order.
#[derive(Debug, Default)]
pub struct ResourceCache {
    configmaps: BTreeMap<NamespacedName, ConfigMap>,
    services: BTreeMap<NamespacedName, Service>,
    nodes: BTreeMap<NamespacedName, Node>,
}

impl ResourceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or refresh a resource.
    ///
    /// Returns `true` iff the admitted set changed: a new identity was stored,
    /// a stored snapshot was replaced by a different one, or an admitted
    /// identity was evicted because its new version fails the predicate.
    /// Snapshots are compared after [`WatchedResource::into_snapshot`], so
    /// bookkeeping-only updates are not changes.
    pub fn insert(&mut self, resource: WatchedResource) -> bool {
        let resource = resource.into_snapshot();
        let admitted = Self::admits(&resource);
        let key = resource.key();
        let kind = resource.kind();

        let changed = match resource {
            WatchedResource::ConfigMap(cm) => upsert(&mut self.configmaps, key.clone(), cm, admitted),
            WatchedResource::Service(svc) => upsert(&mut self.services, key.clone(), svc, admitted),
            WatchedResource::Node(node) => upsert(&mut self.nodes, key.clone(), node, admitted),
        };

        debug!(
            kind = kind,
            resource = %key,
            admitted = admitted,
            changed = changed,
            "Cache insert"
        );
        changed
    }

    /// Remove a resource by identity.
    ///
    /// Only the identity of `resource` is used, so identity-only tombstones
    /// delivered on a not-found race work too. Returns `true` iff it was present.
    pub fn delete(&mut self, resource: &WatchedResource) -> bool {
        let key = resource.key();
        let removed = match resource {
            WatchedResource::ConfigMap(_) => self.configmaps.remove(&key).is_some(),
            WatchedResource::Service(_) => self.services.remove(&key).is_some(),
            WatchedResource::Node(_) => self.nodes.remove(&key).is_some(),
        };

        debug!(kind = resource.kind(), resource = %key, removed = removed, "Cache delete");
        removed
    }

    /// Admission predicate of the resource's kind.
    #[must_use]
    pub fn admits(resource: &WatchedResource) -> bool {
        match resource {
            WatchedResource::ConfigMap(_) => label_is_true(resource.labels(), labels::CONFIG),
            WatchedResource::Service(_) => resource.labels().contains_key(labels::SERVICE_NAME),
            WatchedResource::Node(_) => true,
        }
    }

    /// Admitted configuration candidates.
    pub fn configmaps(&self) -> impl Iterator<Item = (&NamespacedName, &ConfigMap)> {
        self.configmaps.iter()
    }

    /// Admitted services.
    pub fn services(&self) -> impl Iterator<Item = (&NamespacedName, &Service)> {
        self.services.iter()
    }

    /// All known nodes, reduced to name and `InternalIP` addresses.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of admitted objects per kind: (configmaps, services, nodes).
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.configmaps.len(), self.services.len(), self.nodes.len())
    }

    /// Whether nothing is admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configmaps.is_empty() && self.services.is_empty() && self.nodes.is_empty()
    }
}

/// Store or evict `value` depending on admission, reporting whether the map changed.
fn upsert<T: PartialEq>(
    map: &mut BTreeMap<NamespacedName, T>,
    key: NamespacedName,
    value: T,
    admitted: bool,
) -> bool {
    if !admitted {
        return map.remove(&key).is_some();
    }

    match map.get(&key) {
        Some(existing) if *existing == value => false,
        _ => {
            map.insert(key, value);
            true
        }
    }
}
