// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The rebuild cycle.
//!
//! One cycle reads a snapshot of the [`ResourceCache`] and:
//!
//! 1. locates and parses the configuration payload
//! 2. queues node-port corrections for services asking for them
//! 3. configures every registry adapter and hands it the full record set
//!
//! A missing or invalid configuration aborts the cycle before any adapter is
//! touched. An adapter failure only affects that adapter; the next cycle
//! tries again.

use k8s_openapi::api::core::v1::{ConfigMap, Service};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::ResourceCache;
use crate::config::RegistryConfig;
use crate::constants::CONFIG_DATA_KEY;
use crate::errors::SyncError;
use crate::metrics;
use crate::projection::{is_published, node_internal_ips, project_all};
use crate::registry::Registry;
use crate::resource::NamespacedName;
use crate::status::ports::{correct_node_ports, wants_node_ports};
use crate::status::{StatusUpdate, StatusWriter};

/// What one rebuild cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Write-back requests accepted by the queue
    pub write_backs: usize,
    /// Records handed to each adapter, by adapter name
    pub records: Vec<(String, usize)>,
    /// Adapters whose configuration or build failed
    pub failed: Vec<String>,
}

/// Drives the registry adapters from the cluster view.
pub struct SyncEngine {
    registries: Vec<Box<dyn Registry>>,
    writer: StatusWriter<Service>,
}

impl SyncEngine {
    /// Create an engine driving `registries` and queueing corrections on `writer`.
    #[must_use]
    pub fn new(registries: Vec<Box<dyn Registry>>, writer: StatusWriter<Service>) -> Self {
        Self { registries, writer }
    }

    /// Run one rebuild cycle over `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when the configuration object is
    /// missing or invalid. Adapter failures are logged and reported in the
    /// summary instead.
    pub async fn rebuild(&mut self, cache: &ResourceCache) -> Result<RebuildSummary, SyncError> {
        let start = Instant::now();
        let result = self.rebuild_inner(cache).await;

        let outcome = match &result {
            Ok(summary) if summary.failed.is_empty() => "success",
            Ok(_) => "partial",
            Err(_) => "error",
        };
        metrics::record_rebuild(outcome, start.elapsed());
        result
    }

    async fn rebuild_inner(&mut self, cache: &ResourceCache) -> Result<RebuildSummary, SyncError> {
        let (key, payload) = locate_config(cache)?;
        let config = RegistryConfig::parse(payload)?;
        debug!(config = %key, registries = config.watch_namespace.len(), "Loaded configuration");

        let mut summary = RebuildSummary {
            write_backs: self.queue_write_backs(cache),
            ..Default::default()
        };

        let services: Vec<&Service> = cache.services().map(|(_, svc)| svc).collect();
        let node_ips = node_internal_ips(cache.nodes());

        for registry in &mut self.registries {
            let name = registry.name().to_string();

            if let Err(e) = registry.config(&config.settings_for(&name)) {
                let err = SyncError::Registry {
                    registry: name.clone(),
                    source: e,
                };
                error!(registry = %name, error = %err, "Registry configuration rejected");
                summary.failed.push(name);
                continue;
            }

            let filter = config.namespaces_for(&name);
            let records = project_all(services.iter().copied(), &node_ips, &filter);
            let count = records.len();

            match registry.build(&records).await {
                Ok(()) => {
                    info!(registry = %name, records = count, "Registry synchronized");
                    summary.records.push((name, count));
                }
                Err(e) => {
                    let err = SyncError::Registry {
                        registry: name.clone(),
                        source: e,
                    };
                    error!(registry = %name, error = %err, "Registry build failed, will retry next cycle");
                    summary.failed.push(name);
                }
            }
        }

        Ok(summary)
    }

    /// Queue a node-port correction for every published service asking for one.
    fn queue_write_backs(&self, cache: &ResourceCache) -> usize {
        let mut queued = 0;
        for (key, svc) in cache.services() {
            if !is_published(svc) || !wants_node_ports(svc) {
                continue;
            }
            if self.writer.send(StatusUpdate::new(key.clone(), correct_node_ports)) {
                queued += 1;
            }
        }
        queued
    }
}

/// Find the configuration object and its payload.
///
/// With several candidates the first by identity wins.
fn locate_config(cache: &ResourceCache) -> Result<(&NamespacedName, &str), SyncError> {
    let mut candidates = cache.configmaps().filter_map(|(key, cm)| {
        config_payload(cm).map(|payload| (key, payload))
    });

    let found = candidates.next().ok_or_else(|| SyncError::Configuration {
        reason: format!("no configuration object with a '{CONFIG_DATA_KEY}' key"),
    })?;

    if let Some((ignored, _)) = candidates.next() {
        warn!(used = %found.0, ignored = %ignored, "Multiple configuration objects found");
    }

    Ok(found)
}

fn config_payload(cm: &ConfigMap) -> Option<&str> {
    cm.data.as_ref()?.get(CONFIG_DATA_KEY).map(String::as_str)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
