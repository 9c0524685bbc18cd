//! # Platform Configuration
//!
//! Endpoint and credentials of the platform inventory API.
//!
//! Values come from environment variables and may be overlaid by a Kubernetes
//! Secret named by `PLATFORM_CREDENTIALS_SECRET` in the controller namespace.
//! The Secret may carry the keys `username`, `password`, `api_url`,
//! `auth_url`, `project_name`, `user_domain` and `project_domain`.

use crate::config::controller::{env_var_or_default, env_var_or_default_str};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;
use zeroize::Zeroizing;

#[derive(Clone)]
pub struct PlatformConfig {
    /// Base URL of the inventory API, e.g. `http://10.10.10.2:6385`
    pub api_url: String,
    /// Base URL of the identity service, e.g. `http://10.10.10.2:5000/v3`
    pub auth_url: String,
    pub username: String,
    pub password: Zeroizing<String>,
    pub project_name: String,
    pub user_domain: String,
    pub project_domain: String,
    pub request_timeout_secs: u64,
    /// Refresh the session token this many seconds before it expires
    pub token_refresh_margin_secs: i64,
    /// Secret overlaying the values above
    pub credentials_secret: Option<String>,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("project_name", &self.project_name)
            .finish_non_exhaustive()
    }
}

impl PlatformConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            api_url: env_var_or_default_str("PLATFORM_API_URL", ""),
            auth_url: env_var_or_default_str("PLATFORM_AUTH_URL", ""),
            username: env_var_or_default_str("PLATFORM_USERNAME", "admin"),
            password: Zeroizing::new(env_var_or_default_str("PLATFORM_PASSWORD", "")),
            project_name: env_var_or_default_str("PLATFORM_PROJECT_NAME", "admin"),
            user_domain: env_var_or_default_str("PLATFORM_USER_DOMAIN", "Default"),
            project_domain: env_var_or_default_str("PLATFORM_PROJECT_DOMAIN", "Default"),
            request_timeout_secs: env_var_or_default(
                "PLATFORM_REQUEST_TIMEOUT_SECS",
                DEFAULT_PLATFORM_REQUEST_TIMEOUT_SECS,
            ),
            token_refresh_margin_secs: env_var_or_default(
                "PLATFORM_TOKEN_REFRESH_MARGIN_SECS",
                DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
            ),
            credentials_secret: std::env::var("PLATFORM_CREDENTIALS_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    /// Load from the environment, overlay the credentials Secret and validate
    pub async fn load(client: &Client, namespace: &str) -> Result<Self> {
        let mut config = Self::from_env();
        if let Some(secret_name) = config.credentials_secret.clone() {
            let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
            let secret = secrets.get(&secret_name).await.with_context(|| {
                format!("Failed to read platform credentials secret '{namespace}/{secret_name}'")
            })?;
            config.apply_secret_data(&secret.data.unwrap_or_default())?;
            info!(
                secret.name = secret_name.as_str(),
                secret.namespace = namespace,
                "Loaded platform credentials from secret"
            );
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from Secret data
    pub fn apply_secret_data(&mut self, data: &BTreeMap<String, ByteString>) -> Result<()> {
        let value = |key: &str| -> Result<Option<String>> {
            data.get(key)
                .map(|bytes| {
                    String::from_utf8(bytes.0.clone())
                        .with_context(|| format!("Secret key '{key}' is not valid UTF-8"))
                        .map(|s| s.trim().to_string())
                })
                .transpose()
        };

        if let Some(v) = value("api_url")? {
            self.api_url = v;
        }
        if let Some(v) = value("auth_url")? {
            self.auth_url = v;
        }
        if let Some(v) = value("username")? {
            self.username = v;
        }
        if let Some(v) = value("password")? {
            self.password = Zeroizing::new(v);
        }
        if let Some(v) = value("project_name")? {
            self.project_name = v;
        }
        if let Some(v) = value("user_domain")? {
            self.user_domain = v;
        }
        if let Some(v) = value("project_domain")? {
            self.project_domain = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("PLATFORM_API_URL is not set and no credentials secret provides api_url");
        }
        if self.auth_url.is_empty() {
            anyhow::bail!("PLATFORM_AUTH_URL is not set and no credentials secret provides auth_url");
        }
        if self.password.is_empty() {
            anyhow::bail!("platform password is empty");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
