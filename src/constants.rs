// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the nacos-bridge controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Kind Constants
// ============================================================================

/// Kind name for core/v1 `ConfigMap`
pub const KIND_CONFIG_MAP: &str = "ConfigMap";

/// Kind name for core/v1 `Service`
pub const KIND_SERVICE: &str = "Service";

/// Kind name for core/v1 `Node`
pub const KIND_NODE: &str = "Node";

// ============================================================================
// Configuration Payload Constants
// ============================================================================

/// Data key of the designated configuration `ConfigMap`
pub const CONFIG_DATA_KEY: &str = "config.json";

/// Separator between a registry name and its configuration key (`nacos.address`)
pub const REGISTRY_KEY_SEPARATOR: char = '.';

/// Separator of namespace and port allow-lists in labels and configuration
pub const LIST_SEPARATOR: char = ',';

// ============================================================================
// Scheduler Constants
// ============================================================================

/// Quiet period after the last cache mutation before a rebuild runs (10 seconds)
pub const DEFAULT_DEBOUNCE_SECS: u64 = 10;

/// Capacity of the change-event queue feeding the debounce loop
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// Write-back Constants
// ============================================================================

/// Capacity of the status-update queue
pub const DEFAULT_STATUS_QUEUE_CAPACITY: usize = 100;

/// Maximum number of attempts for one write-back under conflict
pub const CONFLICT_RETRY_MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// Nacos Constants
// ============================================================================

/// Registry name of the Nacos adapter, also its configuration prefix
pub const NACOS_REGISTRY_NAME: &str = "nacos";

/// Default Nacos server port
pub const NACOS_DEFAULT_PORT: u16 = 8848;

/// Default Nacos scheme
pub const NACOS_DEFAULT_SCHEME: &str = "http";

/// Default Nacos context path
pub const NACOS_DEFAULT_CONTEXT_PATH: &str = "/nacos";

/// Default Nacos service group
pub const NACOS_DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Nacos namespace used when a record carries no namespace override
pub const NACOS_PUBLIC_NAMESPACE: &str = "public";

/// Request timeout for Nacos HTTP calls (5 seconds)
pub const NACOS_REQUEST_TIMEOUT_MILLIS: u64 = 5000;

/// Weight assigned to every registered instance
pub const NACOS_INSTANCE_WEIGHT: f64 = 10.0;

/// Registered instances are persistent, not heartbeat-driven
pub const NACOS_INSTANCE_EPHEMERAL: bool = false;

/// Provenance metadata key naming the writer
pub const PROVENANCE_CREATED_BY_KEY: &str = "created_by";

/// Provenance metadata value naming the writer
pub const PROVENANCE_CREATED_BY: &str = "nacosbridge.io";

/// Provenance metadata key naming the origin
pub const PROVENANCE_CLUSTER_KEY: &str = "cluster";

/// Provenance metadata value naming the origin
pub const PROVENANCE_CLUSTER: &str = "k8s.service";

// ============================================================================
// Projection Constants
// ============================================================================

/// Suffix of cluster-internal service DNS names
pub const CLUSTER_DNS_SUFFIX: &str = "svc.cluster.local";

/// Node address type used for node-port exposure
pub const NODE_INTERNAL_IP: &str = "InternalIP";

/// Service type value for node-port exposure
pub const SERVICE_TYPE_NODE_PORT: &str = "NodePort";

/// Service type value for load-balancer exposure
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

/// Service type value for external-name exposure
pub const SERVICE_TYPE_EXTERNAL_NAME: &str = "ExternalName";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the Prometheus metrics HTTP server
pub const METRICS_SERVER_DEFAULT_ADDRESS: &str = "0.0.0.0:9090";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
