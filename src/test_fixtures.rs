// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Builders for the core/v1 objects used across unit tests.

use k8s_openapi::api::core::v1::{
    ConfigMap, LoadBalancerIngress, LoadBalancerStatus, Node, NodeAddress, NodeCondition, NodeStatus,
    Service,
    ServicePort, ServiceSpec, ServiceStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Build a string map from pairs.
pub fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// A `ConfigMap` with the given labels and data.
pub fn configmap(
    namespace: &str,
    name: &str,
    labels: &[(&str, &str)],
    data: &[(&str, &str)],
) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(map(labels)),
            ..Default::default()
        },
        data: Some(map(data)),
        ..Default::default()
    }
}

/// The designated configuration `ConfigMap` carrying `payload` as `config.json`.
pub fn config_object(payload: &str) -> ConfigMap {
    configmap(
        "nacos-bridge",
        "nacos-bridge-config",
        &[("nacosbridge.io/config", "true")],
        &[("config.json", payload)],
    )
}

/// A `ServicePort` with a name, port and optional node port.
pub fn port(name: &str, port: i32, node_port: Option<i32>) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        node_port,
        ..Default::default()
    }
}

/// A `Service` with labels, a type and ports.
pub fn service(
    namespace: &str,
    name: &str,
    labels: &[(&str, &str)],
    type_: &str,
    ports: Vec<ServicePort>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(map(labels)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(type_.to_string()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Attach annotations to a `Service`.
pub fn with_annotations(mut svc: Service, annotations: &[(&str, &str)]) -> Service {
    svc.metadata.annotations = Some(map(annotations));
    svc
}

/// Attach load-balancer ingress IPs to a `Service` status.
pub fn with_ingress_ips(mut svc: Service, ips: &[&str]) -> Service {
    svc.status = Some(ServiceStatus {
        load_balancer: Some(LoadBalancerStatus {
            ingress: Some(
                ips.iter()
                    .map(|ip| LoadBalancerIngress {
                        ip: Some((*ip).to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
        }),
        ..Default::default()
    });
    svc
}

/// A `Node` with the given `InternalIP` addresses.
pub fn node(name: &str, internal_ips: &[&str]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            addresses: Some(
                internal_ips
                    .iter()
                    .map(|ip| NodeAddress {
                        address: (*ip).to_string(),
                        type_: "InternalIP".to_string(),
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `node` as the kubelet reports it on its `beat`-th status update.
///
/// Only bookkeeping moves: the resource version, the `Ready` condition
/// message and an ExternalIP that projection ignores.
pub fn heartbeat(mut node: Node, beat: u32) -> Node {
    node.metadata.resource_version = Some(format!("{}", 1000 + beat));
    let status = node.status.get_or_insert_with(NodeStatus::default);
    status.conditions = Some(vec![NodeCondition {
        type_: "Ready".to_string(),
        status: "True".to_string(),
        message: Some(format!("kubelet is posting ready status ({beat})")),
        ..Default::default()
    }]);
    status
        .addresses
        .get_or_insert_with(Vec::new)
        .push(NodeAddress {
            address: format!("203.0.113.{}", beat % 250),
            type_: "ExternalIP".to_string(),
        });
    node
}
