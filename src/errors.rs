// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the synchronization core.
//!
//! The taxonomy mirrors how each failure degrades:
//!
//! - [`SyncError::Configuration`] aborts only the current rebuild cycle
//! - [`SyncError::Translation`] skips one resource and the cycle continues
//! - [`RegistryError`] aborts one adapter for the current cycle
//! - [`WriteError::Conflict`] is retried under the conflict policy
//! - every other [`WriteError`] drops the write-back request
//!
//! Nothing here is fatal to the process: each failure is retried by the next
//! scheduled rebuild.

use thiserror::Error;

/// Errors raised while running a rebuild cycle.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// The designated configuration object is missing or unusable.
    ///
    /// Returned when no admitted `ConfigMap` carries the configuration data key,
    /// or when its payload cannot be parsed. Previous registry state is untouched.
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Explanation of what is missing or invalid
        reason: String,
    },

    /// A single resource carries a malformed label, annotation or port.
    ///
    /// The offending resource is skipped and projection continues.
    #[error("Cannot translate {resource}: {reason}")]
    Translation {
        /// `namespace/name` of the offending resource
        resource: String,
        /// Explanation of what is malformed
        reason: String,
    },

    /// A registry adapter failed to apply its configuration or desired state.
    #[error("Registry '{registry}' failed: {source}")]
    Registry {
        /// Name of the failing adapter
        registry: String,
        /// Underlying adapter error
        #[source]
        source: RegistryError,
    },
}

/// Errors returned by registry adapters.
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// Adapter configuration is missing a required key or has an invalid value.
    #[error("Invalid configuration for registry '{registry}': {reason}")]
    InvalidConfig {
        /// Name of the adapter
        registry: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// `build` was called before a successful `config`.
    #[error("Registry '{registry}' is not configured")]
    NotConfigured {
        /// Name of the adapter
        registry: String,
    },

    /// A connection for a registry namespace could not be created.
    #[error("Failed to connect to {endpoint} for namespace '{namespace}': {reason}")]
    Connection {
        /// Registry namespace the connection was created for
        namespace: String,
        /// Backend endpoint
        endpoint: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Request URL without credentials
        url: String,
        /// Response body or reason phrase
        message: String,
    },

    /// The request never produced a response (DNS, connect, timeout).
    #[error("Request to {url} failed: {reason}")]
    Transport {
        /// Request URL without credentials
        url: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// Registering an instance failed.
    #[error("Failed to register {service} at {endpoint}:{port} in '{namespace}': {reason}")]
    Register {
        /// Registry namespace
        namespace: String,
        /// Registry service name
        service: String,
        /// Instance address
        endpoint: String,
        /// Instance port
        port: i32,
        /// Specific reason for the failure
        reason: String,
    },

    /// Deregistering an instance failed.
    #[error("Failed to deregister {service} at {endpoint}:{port} in '{namespace}': {reason}")]
    Deregister {
        /// Registry namespace
        namespace: String,
        /// Registry service name
        service: String,
        /// Instance address
        endpoint: String,
        /// Instance port
        port: i32,
        /// Specific reason for the failure
        reason: String,
    },
}

impl RegistryError {
    /// Whether the error is transient and worth retrying within the same call.
    ///
    /// Rate limiting, server errors and transport failures are transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => crate::retry::is_retryable_http_status(*status),
            Self::Transport { .. } => true,
            _ => false,
        }
    }
}

/// Errors raised while writing a corrected object back to the cluster.
#[derive(Error, Debug, Clone)]
pub enum WriteError {
    /// The target object does not exist any more.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Kind of the target object
        kind: String,
        /// `namespace/name` of the target object
        name: String,
    },

    /// The write lost an optimistic-concurrency race (HTTP 409).
    #[error("Conflict writing {kind} {name}: the object has been modified")]
    Conflict {
        /// Kind of the target object
        kind: String,
        /// `namespace/name` of the target object
        name: String,
    },

    /// Any other persistence failure. Never retried.
    #[error("Failed to write {kind} {name}: {reason}")]
    Other {
        /// Kind of the target object
        kind: String,
        /// `namespace/name` of the target object
        name: String,
        /// Specific reason for the failure
        reason: String,
    },
}

impl WriteError {
    /// Classify a Kubernetes API error for the given object.
    #[must_use]
    pub fn from_kube(err: &kube::Error, kind: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(api_err) if api_err.code == 409 => Self::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            other => Self::Other {
                kind: kind.to_string(),
                name: name.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Whether the error should restart the write-back attempt.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
