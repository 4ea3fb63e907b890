// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Nacos registry adapter.
//!
//! The adapter remembers the desired state of its last successful
//! [`Registry::build`] and converges Nacos by diffing against it:
//!
//! - instances only in the new state are registered
//! - instances only in the old state are deregistered
//! - instances in both are left alone, unless their port or metadata moved
//!
//! Registrations run before deregistrations. The first failure aborts the
//! call and the remembered state is kept, so the next cycle recomputes the
//! same pending changes.
//!
//! One [`NamingClient`] is kept per Nacos namespace, created on first use and
//! reused until the connection settings change.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::{Instance, NacosSettings, NamingClient};
use super::{Registry, ServiceRecord};
use crate::constants::{
    NACOS_REGISTRY_NAME, NACOS_REQUEST_TIMEOUT_MILLIS, PROVENANCE_CLUSTER,
    PROVENANCE_CLUSTER_KEY, PROVENANCE_CREATED_BY, PROVENANCE_CREATED_BY_KEY,
};
use crate::errors::RegistryError;
use crate::metrics;

/// Identity of one desired instance: (registry namespace, service name, endpoint).
///
/// The same physical endpoint is never registered twice under one service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    /// Registry namespace, empty for the default namespace
    pub namespace: String,
    /// Registry service name
    pub service: String,
    /// Instance address
    pub endpoint: String,
}

/// Complete desired state of the adapter.
pub type DesiredState = BTreeMap<InstanceKey, Instance>;

/// Changes needed to move the backend from one desired state to another.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Plan {
    /// Instances to register, in key order
    pub register: Vec<(InstanceKey, Instance)>,
    /// Instances to deregister, in key order
    pub deregister: Vec<(InstanceKey, Instance)>,
}

impl Plan {
    /// Whether the backend is already converged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.register.is_empty() && self.deregister.is_empty()
    }
}

/// Registry adapter for Nacos.
#[derive(Debug)]
pub struct NacosRegistry {
    http: HttpClient,
    settings: Option<NacosSettings>,
    clients: HashMap<String, NamingClient>,
    applied: DesiredState,
}

impl Default for NacosRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NacosRegistry {
    /// Create an unconfigured adapter with no remembered state.
    #[must_use]
    pub fn new() -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(NACOS_REQUEST_TIMEOUT_MILLIS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            settings: None,
            clients: HashMap::new(),
            applied: DesiredState::new(),
        }
    }

    /// Desired state of the last successful build.
    #[must_use]
    pub fn applied(&self) -> &DesiredState {
        &self.applied
    }

    /// Number of cached namespace connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    async fn client_for(&mut self, namespace: &str) -> Result<&mut NamingClient, RegistryError> {
        if !self.clients.contains_key(namespace) {
            let settings = self.settings.clone().ok_or_else(|| RegistryError::NotConfigured {
                registry: NACOS_REGISTRY_NAME.to_string(),
            })?;
            let client = NamingClient::connect(self.http.clone(), settings, namespace).await?;
            self.clients.insert(namespace.to_string(), client);
        }

        self.clients
            .get_mut(namespace)
            .ok_or_else(|| RegistryError::NotConfigured {
                registry: NACOS_REGISTRY_NAME.to_string(),
            })
    }

    async fn apply(&mut self, plan: &Plan) -> Result<(), RegistryError> {
        for (key, instance) in &plan.register {
            let result = self.client_for(&key.namespace).await?.register_instance(instance).await;
            metrics::record_registry_operation(NACOS_REGISTRY_NAME, "register", result.is_ok());
            result?;
        }

        for (key, instance) in &plan.deregister {
            let result = self.client_for(&key.namespace).await?.deregister_instance(instance).await;
            metrics::record_registry_operation(NACOS_REGISTRY_NAME, "deregister", result.is_ok());
            result?;
        }

        Ok(())
    }
}

#[async_trait]
impl Registry for NacosRegistry {
    fn name(&self) -> &str {
        NACOS_REGISTRY_NAME
    }

    fn config(&mut self, settings: &BTreeMap<String, String>) -> Result<(), RegistryError> {
        let parsed = NacosSettings::from_map(NACOS_REGISTRY_NAME, settings)?;

        if self.settings.as_ref() != Some(&parsed) {
            if !self.clients.is_empty() {
                info!(
                    endpoint = %parsed.base_url(),
                    dropped = self.clients.len(),
                    "Nacos settings changed, dropping cached connections"
                );
            }
            self.clients.clear();
            self.settings = Some(parsed);
        }

        Ok(())
    }

    async fn build(&mut self, records: &[ServiceRecord]) -> Result<(), RegistryError> {
        if self.settings.is_none() {
            return Err(RegistryError::NotConfigured {
                registry: NACOS_REGISTRY_NAME.to_string(),
            });
        }

        let desired = desired_state(records);
        let plan = plan(&self.applied, &desired);

        if plan.is_empty() {
            debug!(instances = desired.len(), "Nacos already converged");
            self.applied = desired;
            return Ok(());
        }

        info!(
            instances = desired.len(),
            register = plan.register.len(),
            deregister = plan.deregister.len(),
            "Applying Nacos changes"
        );

        self.apply(&plan).await?;
        self.applied = desired;
        Ok(())
    }
}

/// Expand records into one desired instance per endpoint.
///
/// The first record claiming an `(namespace, service, endpoint)` key wins.
/// Provenance metadata is merged over the record's own metadata.
#[must_use]
pub fn desired_state(records: &[ServiceRecord]) -> DesiredState {
    let mut state = DesiredState::new();

    for record in records {
        let mut metadata = record.metadata.clone();
        metadata.insert(
            PROVENANCE_CREATED_BY_KEY.to_string(),
            PROVENANCE_CREATED_BY.to_string(),
        );
        metadata.insert(PROVENANCE_CLUSTER_KEY.to_string(), PROVENANCE_CLUSTER.to_string());

        for endpoint in &record.endpoints {
            let key = InstanceKey {
                namespace: record.namespace.clone(),
                service: record.name.clone(),
                endpoint: endpoint.clone(),
            };
            state.entry(key).or_insert_with(|| Instance {
                service: record.name.clone(),
                ip: endpoint.clone(),
                port: record.port,
                metadata: metadata.clone(),
            });
        }
    }

    state
}

/// Compute the changes that turn `old` into `new`.
///
/// An instance whose port moved is registered at the new port and the stale
/// one deregistered; one whose metadata changed is re-registered in place.
#[must_use]
pub fn plan(old: &DesiredState, new: &DesiredState) -> Plan {
    let mut plan = Plan::default();

    for (key, instance) in new {
        match old.get(key) {
            None => plan.register.push((key.clone(), instance.clone())),
            Some(previous) if previous == instance => {}
            Some(previous) => {
                plan.register.push((key.clone(), instance.clone()));
                if previous.port != instance.port {
                    plan.deregister.push((key.clone(), previous.clone()));
                }
            }
        }
    }

    for (key, instance) in old {
        if !new.contains_key(key) {
            plan.deregister.push((key.clone(), instance.clone()));
        }
    }

    plan.deregister.sort_by(|a, b| a.0.cmp(&b.0));
    plan
}

#[cfg(test)]
#[path = "nacos_tests.rs"]
mod nacos_tests;
