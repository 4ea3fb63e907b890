// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cache.rs`

#[cfg(test)]
mod tests {
    use crate::cache::ResourceCache;
    use crate::resource::WatchedResource;
    use crate::test_fixtures::{config_object, configmap, heartbeat, node, port, service};

    fn published(name: &str) -> WatchedResource {
        service(
            "default",
            name,
            &[("nacosbridge.io/service", "")],
            "ClusterIP",
            vec![port("http", 80, None)],
        )
        .into()
    }

    #[test]
    fn test_insert_new_resources_reports_change() {
        let mut cache = ResourceCache::new();

        assert!(cache.insert(config_object("{}").into()));
        assert!(cache.insert(published("web")));
        assert!(cache.insert(node("node-1", &["10.0.0.1"]).into()));
        assert_eq!(cache.counts(), (1, 1, 1));
    }

    #[test]
    fn test_insert_identical_snapshot_is_not_a_change() {
        let mut cache = ResourceCache::new();

        assert!(cache.insert(published("web")));
        assert!(!cache.insert(published("web")));
    }

    #[test]
    fn test_insert_modified_snapshot_is_a_change() {
        let mut cache = ResourceCache::new();
        assert!(cache.insert(node("node-1", &["10.0.0.1"]).into()));

        assert!(cache.insert(node("node-1", &["10.0.0.9"]).into()));
        assert_eq!(cache.counts(), (0, 0, 1));
    }

    #[test]
    fn test_node_heartbeat_is_not_a_change() {
        let mut cache = ResourceCache::new();
        assert!(cache.insert(node("node-1", &["10.0.0.1"]).into()));

        for beat in 1..=3 {
            assert!(!cache.insert(heartbeat(node("node-1", &["10.0.0.1"]), beat).into()));
        }
    }

    #[test]
    fn test_node_address_order_is_not_a_change() {
        let mut cache = ResourceCache::new();
        assert!(cache.insert(node("node-1", &["10.0.0.2", "10.0.0.1"]).into()));

        assert!(!cache.insert(node("node-1", &["10.0.0.1", "10.0.0.2"]).into()));
    }

    #[test]
    fn test_service_resource_version_bump_is_not_a_change() {
        let mut cache = ResourceCache::new();
        assert!(cache.insert(published("web")));

        let WatchedResource::Service(mut svc) = published("web") else {
            unreachable!()
        };
        svc.metadata.resource_version = Some("42".to_string());
        svc.metadata.generation = Some(3);
        assert!(!cache.insert(svc.clone().into()));

        svc.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert("nacosbridge.io/metadata.version".to_string(), "v2".to_string());
        assert!(cache.insert(svc.into()));
    }

    #[test]
    fn test_configmap_without_config_label_is_rejected() {
        let mut cache = ResourceCache::new();
        let cm = configmap("default", "other", &[("app", "x")], &[]);

        assert!(!cache.insert(cm.into()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_configmap_with_false_config_label_is_rejected() {
        let mut cache = ResourceCache::new();
        let cm = configmap("default", "cfg", &[("nacosbridge.io/config", "false")], &[]);

        assert!(!cache.insert(cm.into()));
    }

    #[test]
    fn test_service_without_publish_label_is_rejected() {
        let mut cache = ResourceCache::new();
        let svc = service("default", "web", &[], "ClusterIP", vec![]);

        assert!(!cache.insert(svc.into()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rejected_update_evicts_admitted_resource() {
        let mut cache = ResourceCache::new();
        assert!(cache.insert(published("web")));

        let unpublished = service("default", "web", &[], "ClusterIP", vec![]);
        assert!(cache.insert(unpublished.clone().into()));
        assert_eq!(cache.counts(), (0, 0, 0));

        // A second rejected update finds nothing to evict.
        assert!(!cache.insert(unpublished.into()));
    }

    #[test]
    fn test_delete_present_and_absent() {
        let mut cache = ResourceCache::new();
        cache.insert(published("web"));

        assert!(cache.delete(&published("web")));
        assert!(!cache.delete(&published("web")));
    }

    #[test]
    fn test_delete_uses_identity_only() {
        let mut cache = ResourceCache::new();
        cache.insert(config_object("{}").into());

        // Tombstone with no labels or data, as delivered on a not-found race.
        let tombstone = configmap("nacos-bridge", "nacos-bridge-config", &[], &[]);
        assert!(cache.delete(&tombstone.into()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_same_name_different_kinds_are_independent() {
        let mut cache = ResourceCache::new();
        cache.insert(published("shared"));

        let cm = configmap("default", "shared", &[], &[]);
        assert!(!cache.delete(&cm.into()));
        assert_eq!(cache.counts(), (0, 1, 0));
    }

    #[test]
    fn test_change_reporting_is_order_independent() {
        let ops: Vec<(bool, WatchedResource)> = vec![
            (true, published("a")),
            (true, published("b")),
            (false, published("a")),
            (true, published("a")),
            (false, published("c")),
        ];

        let mut forward = ResourceCache::new();
        let forward_changes: Vec<bool> = ops
            .iter()
            .map(|(insert, r)| {
                if *insert {
                    forward.insert(r.clone())
                } else {
                    forward.delete(r)
                }
            })
            .collect();

        assert_eq!(forward_changes, vec![true, true, true, true, false]);
        assert_eq!(forward.counts(), (0, 2, 0));
    }
}
