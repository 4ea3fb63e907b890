// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for synchronization error types.

#[cfg(test)]
mod tests {
    use crate::errors::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(
            kube::error::Status::failure(&format!("{reason} message"), reason)
                .with_code(code)
                .boxed(),
        )
    }

    #[test]
    fn test_configuration_error_display() {
        let error = SyncError::Configuration {
            reason: "no ConfigMap labeled nacosbridge.io/config=true".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Configuration error: no ConfigMap labeled nacosbridge.io/config=true"
        );
    }

    #[test]
    fn test_translation_error_display() {
        let error = SyncError::Translation {
            resource: "default/web".to_string(),
            reason: "invalid port 'abc'".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Cannot translate default/web: invalid port 'abc'"
        );
    }

    #[test]
    fn test_registry_error_wrapped_in_sync_error() {
        let error = SyncError::Registry {
            registry: "nacos".to_string(),
            source: RegistryError::NotConfigured {
                registry: "nacos".to_string(),
            },
        };

        assert_eq!(
            error.to_string(),
            "Registry 'nacos' failed: Registry 'nacos' is not configured"
        );
    }

    #[test]
    fn test_register_error_display() {
        let error = RegistryError::Register {
            namespace: "dev".to_string(),
            service: "web".to_string(),
            endpoint: "10.0.0.1".to_string(),
            port: 8080,
            reason: "HTTP 400".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Failed to register web at 10.0.0.1:8080 in 'dev': HTTP 400"
        );
    }

    #[test]
    fn test_http_server_errors_are_transient() {
        for status in [429, 500, 502, 503, 504] {
            let error = RegistryError::Http {
                status,
                url: "http://nacos:8848/nacos/v1/ns/instance".to_string(),
                message: "boom".to_string(),
            };
            assert!(error.is_transient(), "HTTP {status} should be transient");
        }
    }

    #[test]
    fn test_http_client_errors_are_not_transient() {
        for status in [400, 401, 403, 404] {
            let error = RegistryError::Http {
                status,
                url: "http://nacos:8848/nacos/v1/ns/instance".to_string(),
                message: "nope".to_string(),
            };
            assert!(!error.is_transient(), "HTTP {status} should not be transient");
        }
    }

    #[test]
    fn test_transport_error_is_transient() {
        let error = RegistryError::Transport {
            url: "http://nacos:8848".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(error.is_transient());
    }

    #[test]
    fn test_config_error_is_not_transient() {
        let error = RegistryError::InvalidConfig {
            registry: "nacos".to_string(),
            reason: "address is required".to_string(),
        };
        assert!(!error.is_transient());
    }

    #[test]
    fn test_write_error_from_kube_conflict() {
        let error = WriteError::from_kube(&api_error(409, "Conflict"), "Service", "default/web");

        assert!(error.is_conflict());
        assert_eq!(
            error.to_string(),
            "Conflict writing Service default/web: the object has been modified"
        );
    }

    #[test]
    fn test_write_error_from_kube_not_found() {
        let error = WriteError::from_kube(&api_error(404, "NotFound"), "Service", "default/web");

        assert!(matches!(error, WriteError::NotFound { .. }));
        assert!(!error.is_conflict());
    }

    #[test]
    fn test_write_error_from_kube_other() {
        let error = WriteError::from_kube(&api_error(422, "Invalid"), "Service", "default/web");

        assert!(matches!(error, WriteError::Other { .. }));
        assert!(!error.is_conflict());
    }
}
