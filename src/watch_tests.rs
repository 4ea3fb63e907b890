// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `watch.rs`

#[cfg(test)]
mod tests {
    use super::super::{KeyTracker, Notification};
    use crate::test_fixtures::{node, port, service};
    use k8s_openapi::api::core::v1::{Node, Service};
    use kube::runtime::watcher::Event;
    use kube::ResourceExt;

    fn names(notifications: &[Notification<Node>]) -> Vec<(String, &'static str)> {
        notifications
            .iter()
            .map(|n| match n {
                Notification::Added { object, initial: true } => (object.name_any(), "initial"),
                Notification::Added { object, .. } => (object.name_any(), "added"),
                Notification::Deleted(object) => (object.name_any(), "deleted"),
            })
            .collect()
    }

    #[test]
    fn test_events_map_to_notifications() {
        let mut tracker = KeyTracker::default();

        let mut seen = Vec::new();
        seen.extend(tracker.observe(Event::<Node>::Init));
        seen.extend(tracker.observe(Event::InitApply(node("n1", &["10.0.0.1"]))));
        seen.extend(tracker.observe(Event::<Node>::InitDone));
        seen.extend(tracker.observe(Event::Apply(node("n2", &["10.0.0.2"]))));
        seen.extend(tracker.observe(Event::Delete(node("n1", &[]))));

        assert_eq!(
            names(&seen),
            vec![
                ("n1".to_string(), "initial"),
                ("n2".to_string(), "added"),
                ("n1".to_string(), "deleted"),
            ]
        );
    }

    #[test]
    fn test_relist_reports_vanished_objects() {
        let mut tracker = KeyTracker::default();
        tracker.observe(Event::Apply(node("n1", &["10.0.0.1"])));
        tracker.observe(Event::Apply(node("n2", &["10.0.0.2"])));

        tracker.observe(Event::<Node>::Init);
        tracker.observe(Event::InitApply(node("n2", &["10.0.0.2"])));
        let done = tracker.observe(Event::<Node>::InitDone);

        assert_eq!(names(&done), vec![("n1".to_string(), "deleted")]);

        // A second relist with the same members reports nothing
        tracker.observe(Event::<Node>::Init);
        tracker.observe(Event::InitApply(node("n2", &["10.0.0.2"])));
        assert!(tracker.observe(Event::<Node>::InitDone).is_empty());
    }

    #[test]
    fn test_identity_only_delete_keeps_namespace() {
        let mut tracker = KeyTracker::default();
        let svc = service("shop", "web", &[], "ClusterIP", vec![port("http", 80, None)]);
        tracker.observe(Event::Apply(svc));

        tracker.observe(Event::<Service>::Init);
        let done = tracker.observe(Event::<Service>::InitDone);

        let [Notification::Deleted(deleted)] = done.as_slice() else {
            panic!("expected one delete, got {done:?}");
        };
        assert_eq!(deleted.name_any(), "web");
        assert_eq!(deleted.namespace().as_deref(), Some("shop"));
        assert!(deleted.spec.is_none());
    }

    #[test]
    fn test_init_done_without_init_is_ignored() {
        let mut tracker = KeyTracker::default();
        tracker.observe(Event::Apply(node("n1", &[])));

        assert!(tracker.observe(Event::<Node>::InitDone).is_empty());
    }
}
