// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Parsing of the designated configuration payload.
//!
//! The payload lives under the `config.json` key of the `ConfigMap` labeled
//! `nacosbridge.io/config=true`:
//!
//! ```json
//! {
//!   "watch_namespace": { "nacos": "team-a,team-b" },
//!   "service_config": { "nacos.address": "nacos.infra", "nacos.port": "8848" }
//! }
//! ```
//!
//! `watch_namespace` maps a registry name to its namespace allow-list.
//! `service_config` keys are prefixed with `<registry>.` and split per adapter.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{LIST_SEPARATOR, REGISTRY_KEY_SEPARATOR};
use crate::errors::SyncError;

/// Parsed configuration payload shared by all registry adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry name to comma-separated namespace allow-list
    pub watch_namespace: BTreeMap<String, String>,
    /// `<registry>.<key>` to value
    pub service_config: BTreeMap<String, String>,
}

impl RegistryConfig {
    /// Parse a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when the payload is blank or not
    /// a valid configuration document.
    pub fn parse(content: &str) -> Result<Self, SyncError> {
        if content.trim().is_empty() {
            return Err(SyncError::Configuration {
                reason: "configuration payload is empty".to_string(),
            });
        }

        serde_json::from_str(content).map_err(|e| SyncError::Configuration {
            reason: format!("invalid configuration payload: {e}"),
        })
    }

    /// Namespace allow-list of a registry. Empty means every namespace.
    #[must_use]
    pub fn namespaces_for(&self, registry: &str) -> NamespaceFilter {
        NamespaceFilter::parse(self.watch_namespace.get(registry).map_or("", String::as_str))
    }

    /// Configuration keys of a registry with its `<registry>.` prefix stripped.
    #[must_use]
    pub fn settings_for(&self, registry: &str) -> BTreeMap<String, String> {
        let prefix = format!("{registry}{REGISTRY_KEY_SEPARATOR}");
        self.service_config
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|key| (key.to_string(), v.clone())))
            .collect()
    }
}

/// Set of Kubernetes namespaces a registry publishes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceFilter {
    allowed: BTreeSet<String>,
}

impl NamespaceFilter {
    /// Parse a comma-separated allow-list; blank entries are ignored.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self {
            allowed: split_list(list).map(str::to_string).collect(),
        }
    }

    /// Whether services in `namespace` are eligible.
    #[must_use]
    pub fn allows(&self, namespace: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(namespace)
    }

    /// Whether every namespace is eligible.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Split a comma-separated list, trimming whitespace and dropping blanks.
pub fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
