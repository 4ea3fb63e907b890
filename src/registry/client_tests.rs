// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the Nacos naming client.

#[cfg(test)]
mod tests {
    use super::super::{Instance, NacosSettings, NamingClient};
    use crate::errors::RegistryError;
    use crate::test_fixtures::map;
    use reqwest::Client as HttpClient;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // =====================================================
    // Settings Parsing Tests
    // =====================================================

    #[test]
    fn test_settings_defaults() {
        let settings = NacosSettings::from_map("nacos", &map(&[("address", "nacos.infra")])).unwrap();

        assert_eq!(settings.port, 8848);
        assert_eq!(settings.scheme, "http");
        assert_eq!(settings.context_path, "/nacos");
        assert_eq!(settings.group, "DEFAULT_GROUP");
        assert_eq!(settings.username, None);
        assert_eq!(settings.base_url(), "http://nacos.infra:8848/nacos");
    }

    #[test]
    fn test_settings_missing_address() {
        let err = NacosSettings::from_map("nacos", &map(&[("port", "8848")])).unwrap_err();

        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
        assert!(err.to_string().contains("address is required"));
    }

    #[test]
    fn test_settings_invalid_port() {
        let err =
            NacosSettings::from_map("nacos", &map(&[("address", "n"), ("port", "88x")])).unwrap_err();

        assert!(err.to_string().contains("invalid port '88x'"));
    }

    #[test]
    fn test_settings_unsupported_scheme() {
        let err = NacosSettings::from_map("nacos", &map(&[("address", "n"), ("scheme", "ftp")]))
            .unwrap_err();

        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_settings_credentials_require_both_values() {
        let only_user =
            NacosSettings::from_map("nacos", &map(&[("address", "n"), ("username", "admin")]))
                .unwrap();
        assert_eq!(only_user.username, None);
        assert_eq!(only_user.password, None);

        let both = NacosSettings::from_map(
            "nacos",
            &map(&[("address", "n"), ("username", "admin"), ("password", "secret")]),
        )
        .unwrap();
        assert_eq!(both.username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_settings_context_path_normalized() {
        let settings = NacosSettings::from_map(
            "nacos",
            &map(&[("address", "n"), ("context_path", "registry/"), ("scheme", "HTTPS")]),
        )
        .unwrap();

        assert_eq!(settings.base_url(), "https://n:8848/registry");
    }

    // =====================================================
    // HTTP Tests
    // =====================================================

    fn settings_for(server: &MockServer, extra: &[(&str, &str)]) -> NacosSettings {
        let addr = server.address();
        let ip = addr.ip().to_string();
        let port = addr.port().to_string();
        let mut pairs = vec![("address", ip.as_str()), ("port", port.as_str())];
        pairs.extend_from_slice(extra);
        NacosSettings::from_map("nacos", &map(&pairs)).unwrap()
    }

    fn instance() -> Instance {
        Instance {
            service: "web".to_string(),
            ip: "10.0.0.1".to_string(),
            port: 8080,
            metadata: map(&[("created_by", "nacosbridge.io")]),
        }
    }

    #[tokio::test]
    async fn test_register_instance_sends_fixed_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/ns/instance"))
            .and(query_param("namespaceId", "dev"))
            .and(query_param("serviceName", "web"))
            .and(query_param("ip", "10.0.0.1"))
            .and(query_param("port", "8080"))
            .and(query_param("weight", "10"))
            .and(query_param("healthy", "true"))
            .and(query_param("ephemeral", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = NamingClient::connect(HttpClient::new(), settings_for(&server, &[]), "dev")
            .await
            .unwrap();

        client.register_instance(&instance()).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_namespace_maps_to_public() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/nacos/v1/ns/instance"))
            .and(query_param("namespaceId", "public"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = NamingClient::connect(HttpClient::new(), settings_for(&server, &[]), "")
            .await
            .unwrap();

        assert_eq!(client.namespace_id(), "public");
        client.deregister_instance(&instance()).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_rejected_with_client_error_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/ns/instance"))
            .respond_with(ResponseTemplate::new(400).set_body_string("caused: bad ip"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = NamingClient::connect(HttpClient::new(), settings_for(&server, &[]), "dev")
            .await
            .unwrap();

        let err = client.register_instance(&instance()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Register { .. }));
        assert!(err.to_string().contains("bad ip"));
    }

    #[tokio::test]
    async fn test_unexpected_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/ns/instance"))
            .respond_with(ResponseTemplate::new(200).set_body_string("failed"))
            .mount(&server)
            .await;

        let mut client = NamingClient::connect(HttpClient::new(), settings_for(&server, &[]), "dev")
            .await
            .unwrap();

        let err = client.register_instance(&instance()).await.unwrap_err();
        assert!(err.to_string().contains("unexpected response 'failed'"));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/ns/instance"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/ns/instance"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = NamingClient::connect(HttpClient::new(), settings_for(&server, &[]), "dev")
            .await
            .unwrap();

        client.register_instance(&instance()).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_once_and_token_attached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/auth/login"))
            .and(body_string_contains("username=admin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"accessToken":"tok-123","tokenTtl":18000}"#),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/ns/instance"))
            .and(query_param("accessToken", "tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&server)
            .await;

        let settings = settings_for(&server, &[("username", "admin"), ("password", "secret")]);
        let mut client = NamingClient::connect(HttpClient::new(), settings, "dev")
            .await
            .unwrap();

        client.register_instance(&instance()).await.unwrap();
        client.register_instance(&instance()).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_failure_is_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nacos/v1/auth/login"))
            .respond_with(ResponseTemplate::new(403).set_body_string("unknown user!"))
            .mount(&server)
            .await;

        let settings = settings_for(&server, &[("username", "admin"), ("password", "bad")]);
        let err = NamingClient::connect(HttpClient::new(), settings, "dev")
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Connection { .. }));
    }
}
