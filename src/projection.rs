// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Translation of published `Service` objects into registry records.
//!
//! The `nacosbridge.io/service-type` label selects a strategy:
//!
//! - `cluster`: one record per open port, endpoint is the cluster DNS name
//! - `external`: one record per open port, endpoints are the externally
//!   visible addresses (load-balancer ingress, external name, or every node
//!   `InternalIP` paired with the node port)
//! - `gateway`: one record per `domain-port-<n>` label, endpoint is the
//!   `service-domain` label
//!
//! Projection is pure: the same snapshot always yields the same sorted,
//! duplicate-free record set.

use k8s_openapi::api::core::v1::{Node, Service, ServicePort};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::config::{split_list, NamespaceFilter};
use crate::constants::{
    CLUSTER_DNS_SUFFIX, NODE_INTERNAL_IP, SERVICE_TYPE_EXTERNAL_NAME,
    SERVICE_TYPE_LOAD_BALANCER, SERVICE_TYPE_NODE_PORT,
};
use crate::errors::SyncError;
use crate::labels;
use crate::registry::ServiceRecord;
use crate::resource::NamespacedName;

/// Projection strategy of a published service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Publish the cluster-internal DNS name
    Cluster,
    /// Publish the externally visible exposure
    External,
    /// Publish a declared external domain
    Gateway,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "external" => Ok(Self::External),
            "gateway" => Ok(Self::Gateway),
            other => Err(format!("unknown service type '{other}'")),
        }
    }
}

/// Whether a service carries the publish label.
#[must_use]
pub fn is_published(svc: &Service) -> bool {
    svc.labels().contains_key(labels::SERVICE_NAME)
}

/// Sorted, distinct `InternalIP` addresses of the given nodes.
pub fn node_internal_ips<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<String> {
    nodes
        .into_iter()
        .filter_map(|node| node.status.as_ref()?.addresses.as_ref())
        .flatten()
        .filter(|addr| addr.type_ == NODE_INTERNAL_IP && !addr.address.is_empty())
        .map(|addr| addr.address.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Project every eligible service into records.
///
/// Services outside `filter` or without the publish label are ignored. A
/// service that cannot be translated is logged and skipped; the others are
/// still projected.
pub fn project_all<'a>(
    services: impl IntoIterator<Item = &'a Service>,
    node_ips: &[String],
    filter: &NamespaceFilter,
) -> Vec<ServiceRecord> {
    let mut records = BTreeSet::new();

    for svc in services {
        if !is_published(svc) || !filter.allows(&svc.namespace().unwrap_or_default()) {
            continue;
        }

        match project_service(svc, node_ips) {
            Ok(projected) => records.extend(projected),
            Err(e) => warn!(error = %e, "Skipping service"),
        }
    }

    records.into_iter().collect()
}

/// Project one published service into records.
///
/// # Errors
///
/// Returns [`SyncError::Translation`] when the service-type label is missing
/// or unknown, or a `gateway` service has a missing domain or a non-numeric
/// domain port.
pub fn project_service(svc: &Service, node_ips: &[String]) -> Result<Vec<ServiceRecord>, SyncError> {
    let key = NamespacedName::of(svc);
    let translation = |reason: String| SyncError::Translation {
        resource: key.to_string(),
        reason,
    };

    let strategy = svc
        .labels()
        .get(labels::SERVICE_TYPE)
        .ok_or_else(|| translation(format!("missing label {}", labels::SERVICE_TYPE)))?
        .parse::<Strategy>()
        .map_err(translation)?;

    let shape = RecordShape::of(svc);
    let mut records = match strategy {
        Strategy::Cluster => {
            let endpoint = format!("{}.{}.{CLUSTER_DNS_SUFFIX}", key.name, key.namespace);
            shape.per_open_port(svc, &[endpoint], |port| Some(port.port))
        }
        Strategy::External => project_external(svc, &shape, node_ips),
        Strategy::Gateway => project_gateway(svc, &shape).map_err(translation)?,
    };

    records.sort();
    records.dedup();
    debug!(service = %key, strategy = ?strategy, records = records.len(), "Projected service");
    Ok(records)
}

fn project_external(svc: &Service, shape: &RecordShape, node_ips: &[String]) -> Vec<ServiceRecord> {
    let Some(spec) = svc.spec.as_ref() else {
        return Vec::new();
    };

    match spec.type_.as_deref() {
        Some(SERVICE_TYPE_LOAD_BALANCER) => {
            let mut endpoints: Vec<String> = svc
                .status
                .as_ref()
                .and_then(|s| s.load_balancer.as_ref())
                .and_then(|lb| lb.ingress.as_ref())
                .into_iter()
                .flatten()
                .filter_map(|ingress| ingress.ip.clone().or_else(|| ingress.hostname.clone()))
                .filter(|addr| !addr.is_empty())
                .collect();
            if endpoints.is_empty() {
                endpoints.extend(spec.load_balancer_ip.clone().filter(|ip| !ip.is_empty()));
            }
            shape.per_open_port(svc, &endpoints, |port| Some(port.port))
        }
        Some(SERVICE_TYPE_EXTERNAL_NAME) => {
            let endpoints: Vec<String> =
                spec.external_name.clone().filter(|n| !n.is_empty()).into_iter().collect();
            shape.per_open_port(svc, &endpoints, |port| Some(port.port))
        }
        Some(SERVICE_TYPE_NODE_PORT) => shape.per_open_port(svc, node_ips, |port| port.node_port),
        other => {
            debug!(
                service = %NamespacedName::of(svc),
                service_type = ?other,
                "Service has no external exposure yet"
            );
            Vec::new()
        }
    }
}

fn project_gateway(svc: &Service, shape: &RecordShape) -> Result<Vec<ServiceRecord>, String> {
    let svc_labels = svc.labels();
    let domain = svc_labels
        .get(labels::SERVICE_DOMAIN)
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| format!("missing label {}", labels::SERVICE_DOMAIN))?;

    svc_labels
        .iter()
        .filter(|(k, _)| k.starts_with(labels::DOMAIN_PORT_PREFIX))
        .map(|(k, v)| {
            let port = v
                .trim()
                .parse::<i32>()
                .map_err(|e| format!("invalid port '{v}' in label {k}: {e}"))?;
            Ok(shape.record(shape.base_name.clone(), port, vec![domain.to_string()]))
        })
        .collect()
}

/// Name, namespace and metadata shared by every record of one service.
struct RecordShape {
    base_name: String,
    namespace: String,
    metadata: BTreeMap<String, String>,
    open_ports: BTreeSet<String>,
}

impl RecordShape {
    fn of(svc: &Service) -> Self {
        let svc_labels = svc.labels();
        let non_empty = |key: &str| {
            svc_labels
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            base_name: non_empty(labels::SERVICE_NAME).unwrap_or_else(|| svc.name_any()),
            namespace: non_empty(labels::SERVICE_NAMESPACE).unwrap_or_default(),
            metadata: project_metadata(svc.annotations()),
            open_ports: svc_labels
                .get(labels::OPEN_PORT)
                .map(|list| split_list(list).map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }

    fn record(&self, name: String, port: i32, endpoints: Vec<String>) -> ServiceRecord {
        ServiceRecord {
            name,
            namespace: self.namespace.clone(),
            port,
            endpoints,
            metadata: self.metadata.clone(),
        }
    }

    /// One record per open port, with the port number picked by `port_of`.
    ///
    /// Ports without a number (e.g. a node port not yet assigned) are skipped.
    fn per_open_port(
        &self,
        svc: &Service,
        endpoints: &[String],
        port_of: impl Fn(&ServicePort) -> Option<i32>,
    ) -> Vec<ServiceRecord> {
        if endpoints.is_empty() {
            return Vec::new();
        }

        let mut sorted: Vec<String> = endpoints.to_vec();
        sorted.sort();
        sorted.dedup();

        let svc_labels = svc.labels();
        svc.spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|port| {
                let port_name = port.name.as_deref()?;
                if !self.open_ports.contains(port_name) {
                    return None;
                }
                let number = port_of(port).filter(|n| *n > 0)?;
                let name = svc_labels
                    .get(&format!("{}{port_name}", labels::PORT_NAME_PREFIX))
                    .filter(|v| !v.trim().is_empty())
                    .map_or_else(|| self.base_name.clone(), |v| v.trim().to_string());
                Some(self.record(name, number, sorted.clone()))
            })
            .collect()
    }
}

/// Copy annotations carrying the metadata prefix, with the prefix stripped.
#[must_use]
pub fn project_metadata(annotations: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    annotations
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(labels::METADATA_PREFIX)
                .filter(|key| !key.is_empty())
                .map(|key| (key.to_string(), v.clone()))
        })
        .collect()
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod projection_tests;
