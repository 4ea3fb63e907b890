// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Nacos naming HTTP client.
//!
//! One [`NamingClient`] is bound to one Nacos namespace. It speaks the Nacos
//! Open API:
//!
//! - `POST {context}/v1/auth/login` when credentials are configured
//! - `POST {context}/v1/ns/instance` to register an instance
//! - `DELETE {context}/v1/ns/instance` to deregister an instance
//!
//! Transient failures (429, 5xx, transport errors) are retried with
//! [`registry_backoff`]; anything else fails the call immediately.

use reqwest::{Client as HttpClient, Method};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::constants::{
    NACOS_DEFAULT_CONTEXT_PATH, NACOS_DEFAULT_GROUP, NACOS_DEFAULT_PORT, NACOS_DEFAULT_SCHEME,
    NACOS_INSTANCE_EPHEMERAL, NACOS_INSTANCE_WEIGHT, NACOS_PUBLIC_NAMESPACE,
};
use crate::errors::RegistryError;
use crate::retry::{registry_backoff, retry_with_backoff};

/// Body Nacos returns on a successful instance operation
const NACOS_OK: &str = "ok";

/// Token refresh margin before the advertised expiry
const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Connection settings of a Nacos server, parsed from the adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NacosSettings {
    /// `http` or `https`
    pub scheme: String,
    /// Host name or IP of the Nacos server
    pub address: String,
    /// Nacos HTTP port
    pub port: u16,
    /// Context path, normalized to a leading slash and no trailing slash
    pub context_path: String,
    /// Service group instances are registered under
    pub group: String,
    /// Login user, set only together with a password
    pub username: Option<String>,
    /// Login password, set only together with a user
    pub password: Option<String>,
}

impl NacosSettings {
    /// Parse settings from the adapter's configuration map.
    ///
    /// Recognized keys: `address` (required), `port`, `scheme`,
    /// `context_path`, `group`, `username`, `password`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfig`] when `address` is missing or a
    /// value is invalid.
    pub fn from_map(registry: &str, map: &BTreeMap<String, String>) -> Result<Self, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidConfig {
            registry: registry.to_string(),
            reason,
        };
        let value = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let address = value("address")
            .ok_or_else(|| invalid("address is required".to_string()))?
            .to_string();

        let port = match value("port") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| invalid(format!("invalid port '{raw}': {e}")))?,
            None => NACOS_DEFAULT_PORT,
        };

        let scheme = value("scheme").unwrap_or(NACOS_DEFAULT_SCHEME).to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(invalid(format!("unsupported scheme '{scheme}'")));
        }

        let context_path = format!(
            "/{}",
            value("context_path")
                .unwrap_or(NACOS_DEFAULT_CONTEXT_PATH)
                .trim_matches('/')
        );

        let (username, password) = match (value("username"), value("password")) {
            (Some(user), Some(pass)) => (Some(user.to_string()), Some(pass.to_string())),
            _ => (None, None),
        };

        Ok(Self {
            scheme,
            address,
            port,
            context_path,
            group: value("group").unwrap_or(NACOS_DEFAULT_GROUP).to_string(),
            username,
            password,
        })
    }

    /// Base URL of the Nacos API, including the context path.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme,
            self.address,
            self.port,
            self.context_path.trim_end_matches('/')
        )
    }
}

/// One registered (ip, port) pair of a Nacos service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Nacos service name
    pub service: String,
    /// Instance address
    pub ip: String,
    /// Instance port
    pub port: i32,
    /// Instance metadata, provenance included
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    token_ttl: Option<u64>,
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// Naming client bound to one Nacos namespace.
#[derive(Debug)]
pub struct NamingClient {
    http: HttpClient,
    settings: NacosSettings,
    namespace_id: String,
    token: Option<AccessToken>,
}

impl NamingClient {
    /// Create a client for `namespace`, logging in when credentials are set.
    ///
    /// An empty namespace maps to the Nacos `public` namespace.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Connection`] when the login fails.
    pub async fn connect(
        http: HttpClient,
        settings: NacosSettings,
        namespace: &str,
    ) -> Result<Self, RegistryError> {
        let namespace_id = if namespace.is_empty() {
            NACOS_PUBLIC_NAMESPACE.to_string()
        } else {
            namespace.to_string()
        };

        let mut client = Self {
            http,
            settings,
            namespace_id,
            token: None,
        };

        client
            .ensure_token()
            .await
            .map_err(|e| RegistryError::Connection {
                namespace: client.namespace_id.clone(),
                endpoint: client.settings.base_url(),
                reason: e.to_string(),
            })?;

        info!(
            namespace = %client.namespace_id,
            endpoint = %client.settings.base_url(),
            authenticated = client.token.is_some(),
            "Created Nacos naming client"
        );
        Ok(client)
    }

    /// Namespace id this client writes to.
    #[must_use]
    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    /// Register (or refresh) an instance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Register`] when Nacos rejects the instance.
    pub async fn register_instance(&mut self, instance: &Instance) -> Result<(), RegistryError> {
        let metadata = serde_json::to_string(&instance.metadata).map_err(|e| {
            self.register_error(instance, format!("cannot encode metadata: {e}"))
        })?;

        let mut params = self.instance_params(instance);
        params.extend([
            ("weight", NACOS_INSTANCE_WEIGHT.to_string()),
            ("enabled", "true".to_string()),
            ("healthy", "true".to_string()),
            ("metadata", metadata),
        ]);

        self.instance_call(Method::POST, params)
            .await
            .map_err(|e| self.register_error(instance, e.to_string()))?;

        info!(
            namespace = %self.namespace_id,
            service = %instance.service,
            ip = %instance.ip,
            port = instance.port,
            "Registered instance"
        );
        Ok(())
    }

    /// Deregister an instance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Deregister`] when Nacos rejects the request.
    pub async fn deregister_instance(&mut self, instance: &Instance) -> Result<(), RegistryError> {
        let params = self.instance_params(instance);

        self.instance_call(Method::DELETE, params)
            .await
            .map_err(|e| RegistryError::Deregister {
                namespace: self.namespace_id.clone(),
                service: instance.service.clone(),
                endpoint: instance.ip.clone(),
                port: instance.port,
                reason: e.to_string(),
            })?;

        info!(
            namespace = %self.namespace_id,
            service = %instance.service,
            ip = %instance.ip,
            port = instance.port,
            "Deregistered instance"
        );
        Ok(())
    }

    fn register_error(&self, instance: &Instance, reason: String) -> RegistryError {
        RegistryError::Register {
            namespace: self.namespace_id.clone(),
            service: instance.service.clone(),
            endpoint: instance.ip.clone(),
            port: instance.port,
            reason,
        }
    }

    fn instance_params(&self, instance: &Instance) -> Vec<(&'static str, String)> {
        vec![
            ("namespaceId", self.namespace_id.clone()),
            ("groupName", self.settings.group.clone()),
            ("serviceName", instance.service.clone()),
            ("ip", instance.ip.clone()),
            ("port", instance.port.to_string()),
            ("ephemeral", NACOS_INSTANCE_EPHEMERAL.to_string()),
        ]
    }

    /// Call the instance endpoint and check for Nacos' `ok` body.
    async fn instance_call(
        &mut self,
        method: Method,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<(), RegistryError> {
        self.ensure_token().await?;
        if let Some(token) = &self.token {
            params.push(("accessToken", token.value.clone()));
        }

        let url = format!("{}/v1/ns/instance", self.settings.base_url());
        let body = nacos_request(&self.http, method, &url, &params, None).await?;

        if body.trim() == NACOS_OK {
            Ok(())
        } else {
            Err(RegistryError::Http {
                status: 200,
                url,
                message: format!("unexpected response '{}'", body.trim()),
            })
        }
    }

    /// Log in when credentials are configured and the current token is stale.
    async fn ensure_token(&mut self) -> Result<(), RegistryError> {
        let (Some(username), Some(password)) = (&self.settings.username, &self.settings.password)
        else {
            return Ok(());
        };
        if self.token.as_ref().is_some_and(AccessToken::is_fresh) {
            return Ok(());
        }

        let url = format!("{}/v1/auth/login", self.settings.base_url());
        let form = [("username", username.clone()), ("password", password.clone())];
        let body = nacos_request(&self.http, Method::POST, &url, &[], Some(&form[..])).await?;

        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|e| RegistryError::Http {
                status: 200,
                url: url.clone(),
                message: format!("invalid login response: {e}"),
            })?;

        let expires_at = login.token_ttl.map(|ttl| {
            Instant::now() + Duration::from_secs(ttl.saturating_sub(TOKEN_REFRESH_MARGIN_SECS))
        });
        debug!(namespace = %self.namespace_id, ttl = ?login.token_ttl, "Obtained Nacos access token");

        self.token = Some(AccessToken {
            value: login.access_token,
            expires_at,
        });
        Ok(())
    }
}

/// Execute a request to the Nacos API with automatic retry of transient failures.
///
/// `url` never contains credentials; query parameters and the form body are
/// passed separately and are not logged.
async fn nacos_request(
    http: &HttpClient,
    method: Method,
    url: &str,
    query: &[(&'static str, String)],
    form: Option<&[(&'static str, String)]>,
) -> Result<String, RegistryError> {
    let operation = format!("{method} {url}");
    retry_with_backoff(
        registry_backoff(),
        &operation,
        RegistryError::is_transient,
        || nacos_request_internal(http, method.clone(), url, query, form),
    )
    .await
}

/// Single attempt of a Nacos API request, without retry.
async fn nacos_request_internal(
    http: &HttpClient,
    method: Method,
    url: &str,
    query: &[(&'static str, String)],
    form: Option<&[(&'static str, String)]>,
) -> Result<String, RegistryError> {
    debug!(method = %method, url = %url, "HTTP request to Nacos");

    let mut request = http.request(method.clone(), url).query(query);
    if let Some(form) = form {
        request = request.form(form);
    }

    let response = request.send().await.map_err(|e| RegistryError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        error!(
            method = %method,
            url = %url,
            status = %status,
            error = %text,
            "Nacos API request failed"
        );
        return Err(RegistryError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            message: text,
        });
    }

    debug!(method = %method, url = %url, status = %status, "Nacos API request successful");
    Ok(text)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
