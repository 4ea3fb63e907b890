// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to live cluster objects for the write-back loop.

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;

use crate::errors::WriteError;
use crate::resource::NamespacedName;

/// Read and write access to one kind of cluster object.
///
/// Writes carry the object's `resourceVersion`, so a concurrent change
/// surfaces as [`WriteError::Conflict`].
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    /// Fetch the current object.
    async fn get(&self, key: &NamespacedName) -> Result<K, WriteError>;

    /// Replace the whole object, returning the stored version.
    async fn replace(&self, key: &NamespacedName, object: &K) -> Result<K, WriteError>;

    /// Write the object's status through the status subresource.
    async fn replace_status(&self, key: &NamespacedName, object: &K) -> Result<K, WriteError>;
}

/// [`ObjectStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a store using `client` for every call.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, key: &NamespacedName) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), &key.namespace)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &NamespacedName) -> Result<K, WriteError> {
        self.api::<K>(key)
            .get(&key.name)
            .await
            .map_err(|e| WriteError::from_kube(&e, K::kind(&()).as_ref(), &key.to_string()))
    }

    async fn replace(&self, key: &NamespacedName, object: &K) -> Result<K, WriteError> {
        self.api::<K>(key)
            .replace(&key.name, &PostParams::default(), object)
            .await
            .map_err(|e| WriteError::from_kube(&e, K::kind(&()).as_ref(), &key.to_string()))
    }

    async fn replace_status(&self, key: &NamespacedName, object: &K) -> Result<K, WriteError> {
        let kind = K::kind(&());
        let value = serde_json::to_value(object).map_err(|e| WriteError::Other {
            kind: kind.to_string(),
            name: key.to_string(),
            reason: format!("cannot encode object: {e}"),
        })?;

        // resourceVersion in a merge patch turns it into a conditional write
        let patch = json!({
            "metadata": { "resourceVersion": object.meta().resource_version },
            "status": value.get("status"),
        });

        self.api::<K>(key)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| WriteError::from_kube(&e, kind.as_ref(), &key.to_string()))
    }
}
