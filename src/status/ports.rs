// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node-port correction of services labeled `nacosbridge.io/external=true`.
//!
//! Each `nacosbridge.io/nodeport-<port name>` label pins the node port of the
//! named port, and the service is exposed as `NodePort`.

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::warn;

use super::Mutation;
use crate::constants::SERVICE_TYPE_NODE_PORT;
use crate::labels;
use crate::resource::{label_is_true, NamespacedName};

/// Whether a service asks for node-port exposure.
#[must_use]
pub fn wants_node_ports(svc: &Service) -> bool {
    label_is_true(svc.labels(), labels::EXTERNAL)
}

/// Pin labeled node ports and force `NodePort` exposure.
///
/// Returns [`Mutation::Unchanged`] when the service does not ask for it or
/// already matches.
#[must_use]
pub fn correct_node_ports(svc: &Service) -> Mutation<Service> {
    if !wants_node_ports(svc) {
        return Mutation::Unchanged;
    }

    let overrides = node_port_overrides(svc);
    let mut copy = svc.clone();
    let mut changed = false;

    let Some(spec) = copy.spec.as_mut() else {
        return Mutation::Unchanged;
    };

    for port in spec.ports.iter_mut().flatten() {
        let Some(wanted) = port.name.as_deref().and_then(|name| overrides.get(name)) else {
            continue;
        };
        if port.node_port != Some(*wanted) {
            port.node_port = Some(*wanted);
            changed = true;
        }
    }

    if spec.type_.as_deref() != Some(SERVICE_TYPE_NODE_PORT) {
        spec.type_ = Some(SERVICE_TYPE_NODE_PORT.to_string());
        changed = true;
    }

    if changed {
        Mutation::Changed {
            object: copy,
            spec_changed: true,
            status_changed: false,
        }
    } else {
        Mutation::Unchanged
    }
}

/// Port name to pinned node port, from the `nodeport-<name>` labels.
fn node_port_overrides(svc: &Service) -> BTreeMap<String, i32> {
    svc.labels()
        .iter()
        .filter_map(|(key, value)| {
            let port_name = key.strip_prefix(labels::NODE_PORT_PREFIX)?;
            match value.trim().parse::<i32>() {
                Ok(port) => Some((port_name.to_string(), port)),
                Err(e) => {
                    warn!(
                        service = %NamespacedName::of(svc),
                        label = %key,
                        value = %value,
                        error = %e,
                        "Ignoring invalid node port label"
                    );
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod ports_tests;
