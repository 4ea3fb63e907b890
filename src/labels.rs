// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label and annotation keys forming the contract with cluster resources.
//!
//! Users opt a `Service` into registration and shape its registry records
//! through these keys. The designated configuration `ConfigMap` is found by
//! [`CONFIG`].

// ============================================================================
// Selection Labels
// ============================================================================

/// Marks the designated configuration `ConfigMap` (value must be `"true"`)
pub const CONFIG: &str = "nacosbridge.io/config";

/// Publish flag on a `Service`. A non-empty value also overrides the base record name.
pub const SERVICE_NAME: &str = "nacosbridge.io/service";

/// Projection strategy selector: `cluster`, `external` or `gateway`
pub const SERVICE_TYPE: &str = "nacosbridge.io/service-type";

// ============================================================================
// Record Shaping Labels
// ============================================================================

/// Registry namespace override (default: the registry's default namespace)
pub const SERVICE_NAMESPACE: &str = "nacosbridge.io/namespace";

/// Comma-separated list of port names to publish
pub const OPEN_PORT: &str = "nacosbridge.io/openport";

/// Per-port record name override, suffixed by the port name
pub const PORT_NAME_PREFIX: &str = "nacosbridge.io/portname-";

/// External domain published by `gateway` services
pub const SERVICE_DOMAIN: &str = "nacosbridge.io/service-domain";

/// Per-port domain keys of `gateway` services, each value a port number
pub const DOMAIN_PORT_PREFIX: &str = "nacosbridge.io/domain-port-";

// ============================================================================
// Write-back Labels
// ============================================================================

/// Requests node-port exposure of a `Service` (value must be `"true"`)
pub const EXTERNAL: &str = "nacosbridge.io/external";

/// Explicit node port for a named port, suffixed by the port name
pub const NODE_PORT_PREFIX: &str = "nacosbridge.io/nodeport-";

// ============================================================================
// Annotations
// ============================================================================

/// Annotations starting with this prefix are copied into record metadata,
/// with the prefix stripped
pub const METADATA_PREFIX: &str = "nacosbridge.io/metadata.";

// ============================================================================
// Label Values
// ============================================================================

/// Truthy value of boolean labels
pub const TRUE: &str = "true";
