// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tracked resource kinds and their identities.
//!
//! The watch collaborator delivers `ConfigMap`, `Service` and `Node` objects.
//! They are carried as one tagged enum so the cache and the event queue handle
//! every kind through the same code path.

use k8s_openapi::api::core::v1::{ConfigMap, Node, NodeAddress, NodeStatus, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{KIND_CONFIG_MAP, KIND_NODE, KIND_SERVICE, NODE_INTERNAL_IP};

/// Unique key of a resource: its namespace and name.
///
/// Cluster-scoped resources such as nodes carry an empty namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacedName {
    /// Namespace, empty for cluster-scoped resources
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl NamespacedName {
    /// Build a key from its parts.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of any Kubernetes object.
    #[must_use]
    pub fn of<K: ResourceExt>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// A snapshot of one tracked cluster resource.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchedResource {
    /// The designated configuration object (or a candidate for it)
    ConfigMap(ConfigMap),
    /// A network-facing service
    Service(Service),
    /// A cluster node, source of node-port endpoints
    Node(Node),
}

impl WatchedResource {
    /// Identity of the wrapped object.
    #[must_use]
    pub fn key(&self) -> NamespacedName {
        match self {
            Self::ConfigMap(cm) => NamespacedName::of(cm),
            Self::Service(svc) => NamespacedName::of(svc),
            Self::Node(node) => NamespacedName::of(node),
        }
    }

    /// Kind name of the wrapped object.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMap(_) => KIND_CONFIG_MAP,
            Self::Service(_) => KIND_SERVICE,
            Self::Node(_) => KIND_NODE,
        }
    }

    /// Labels of the wrapped object.
    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        match self {
            Self::ConfigMap(cm) => cm.labels(),
            Self::Service(svc) => svc.labels(),
            Self::Node(node) => node.labels(),
        }
    }

    /// Reduce the object to what a rebuild reads.
    ///
    /// Apiserver bookkeeping (`resourceVersion`, `generation`, `managedFields`)
    /// is cleared on every kind. A node keeps only its name and sorted
    /// `InternalIP` addresses, so kubelet heartbeats compare equal.
    #[must_use]
    pub fn into_snapshot(self) -> Self {
        match self {
            Self::ConfigMap(mut cm) => {
                clear_bookkeeping(&mut cm.metadata);
                Self::ConfigMap(cm)
            }
            Self::Service(mut svc) => {
                clear_bookkeeping(&mut svc.metadata);
                Self::Service(svc)
            }
            Self::Node(node) => Self::Node(node_snapshot(node)),
        }
    }
}

fn clear_bookkeeping(meta: &mut ObjectMeta) {
    meta.resource_version = None;
    meta.generation = None;
    meta.managed_fields = None;
}

fn node_snapshot(node: Node) -> Node {
    let mut addresses: Vec<NodeAddress> = node
        .status
        .and_then(|status| status.addresses)
        .unwrap_or_default()
        .into_iter()
        .filter(|addr| addr.type_ == NODE_INTERNAL_IP)
        .collect();
    addresses.sort_by(|a, b| a.address.cmp(&b.address));

    Node {
        metadata: ObjectMeta {
            name: node.metadata.name,
            ..Default::default()
        },
        status: Some(NodeStatus {
            addresses: Some(addresses),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl From<ConfigMap> for WatchedResource {
    fn from(cm: ConfigMap) -> Self {
        Self::ConfigMap(cm)
    }
}

impl From<Service> for WatchedResource {
    fn from(svc: Service) -> Self {
        Self::Service(svc)
    }
}

impl From<Node> for WatchedResource {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

/// Whether a boolean label is set to `"true"`.
#[must_use]
pub fn label_is_true(labels: &BTreeMap<String, String>, key: &str) -> bool {
    labels.get(key).is_some_and(|v| v == crate::labels::TRUE)
}
