// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Nacos Bridge - Kubernetes to Nacos service registry sync
//!
//! Nacos Bridge watches `Service`, `Node` and one designated `ConfigMap` and
//! keeps a Nacos registry in sync with the services users opt in through
//! labels. It also writes a small set of derived corrections (pinned node
//! ports) back onto the services themselves.
//!
//! ## Overview
//!
//! Watch notifications flow through a single debounced loop:
//!
//! ```text
//! watch feed -> scheduler -> ResourceCache
//!                   |
//!                   +-> SyncEngine -> registry adapters (Nacos)
//!                            |
//!                            +-> write-back queue -> StatusUpdateHandler
//! ```
//!
//! ## Modules
//!
//! - [`cache`] - Admitted cluster objects keyed by namespaced name
//! - [`scheduler`] - Operation queue and debounced rebuild trigger
//! - [`engine`] - One rebuild cycle over a cache snapshot
//! - [`projection`] - Service to registry record translation
//! - [`registry`] - Registry adapter contract and the Nacos adapter
//! - [`status`] - Optimistic-concurrency write-back of corrections
//! - [`watch`] - `kube` watcher glue
//!
//! ## Example
//!
//! ```rust,no_run
//! use nacos_bridge::projection::project_service;
//! use k8s_openapi::api::core::v1::Service;
//!
//! let svc = Service::default();
//! let records = project_service(&svc, &["10.0.0.1".to_string()]);
//! assert!(records.is_err());
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod projection;
pub mod registry;
pub mod resource;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod watch;

#[cfg(test)]
mod cache_tests;
#[cfg(test)]
mod errors_tests;
#[cfg(test)]
mod test_fixtures;
