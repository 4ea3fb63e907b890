// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry adapter contract.
//!
//! A registry adapter keeps one external service-discovery backend in sync
//! with the records projected from the cluster. Every rebuild cycle calls, in
//! order:
//!
//! 1. [`Registry::name`] to look up the adapter's slice of the configuration
//! 2. [`Registry::config`] with the adapter's own settings
//! 3. [`Registry::build`] with the complete desired record set
//!
//! Adapters own their previous desired state and their backend connections.
//! Neither is shared with other adapters.

pub mod client;
pub mod nacos;

pub use nacos::NacosRegistry;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::errors::RegistryError;

/// One service entry destined for a registry.
///
/// Derived from cluster state on every cycle, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceRecord {
    /// Registry service name
    pub name: String,
    /// Registry namespace, empty for the registry's default
    pub namespace: String,
    /// Port shared by every endpoint
    pub port: i32,
    /// IP addresses or hostnames, in a stable order
    pub endpoints: Vec<String>,
    /// Free-form metadata attached to each instance
    pub metadata: BTreeMap<String, String>,
}

/// Capability implemented by every registry backend.
#[async_trait]
pub trait Registry: Send {
    /// Stable registry name, also its configuration prefix.
    fn name(&self) -> &str;

    /// Apply the adapter's configuration for this cycle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfig`] when a required key is
    /// missing or a value cannot be parsed.
    fn config(&mut self, settings: &BTreeMap<String, String>) -> Result<(), RegistryError>;

    /// Converge the backend on `records`.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure. The adapter's remembered state is
    /// left untouched so the next cycle recomputes the same pending changes.
    async fn build(&mut self, records: &[ServiceRecord]) -> Result<(), RegistryError>;
}
