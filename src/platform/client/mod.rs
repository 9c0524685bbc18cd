//! # Sysinv REST Client
//!
//! REST implementation of [`PlatformApi`](crate::platform::PlatformApi) for
//! the system-inventory service.
//!
//! - Keystone v3 session tokens, refreshed ahead of expiry
//! - One re-authentication and retry when a call comes back 401
//! - `X-Client-Request-Id` on every mutating request so retried steps are idempotent
//! - reqwest with rustls (no OpenSSL dependencies)

mod auth;
mod operations;
mod requests;
mod responses;

use crate::config::PlatformConfig;
use crate::crd::ResourceKind;
use crate::observability::metrics;
use crate::platform::PlatformError;
use anyhow::{Context, Result};
use auth::Session;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, warn};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const CLIENT_REQUEST_ID_HEADER: &str = "X-Client-Request-Id";

/// System-inventory REST client
///
/// Safe for concurrent use; the session lock is never held across an await.
pub struct SysinvClient {
    http_client: Client,
    config: PlatformConfig,
    session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for SysinvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinvClient")
            .field("api_url", &self.config.api_url)
            .field("auth_url", &self.config.auth_url)
            .finish_non_exhaustive()
    }
}

/// A request to the inventory API
pub(crate) struct Call<'a> {
    pub kind: ResourceKind,
    pub operation: &'static str,
    pub method: Method,
    pub path: String,
    pub client_request_id: Option<&'a str>,
    pub body: Option<Value>,
}

impl SysinvClient {
    /// Create a client; no request is made until the first call
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    #[allow(
        clippy::missing_errors_doc,
        reason = "Error documentation is provided in doc comments"
    )]
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http_client,
            config,
            session: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn build(&self, call: &Call<'_>, token: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http_client
            .request(call.method.clone(), self.url(&call.path))
            .header(AUTH_TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(id) = call.client_request_id {
            request = request.header(CLIENT_REQUEST_ID_HEADER, id);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }
        request
    }

    /// Send a call, re-authenticating once on 401, and classify any failure
    pub(crate) async fn execute(&self, call: Call<'_>) -> Result<Response, PlatformError> {
        let start = Instant::now();
        let result = self.execute_inner(&call).await;
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        metrics::record_platform_request(
            call.kind.as_str(),
            call.operation,
            label,
            start.elapsed().as_secs_f64(),
        );
        if let Err(e) = &result {
            debug!(
                kind = %call.kind,
                operation = call.operation,
                path = call.path.as_str(),
                error = %e,
                "Platform request failed"
            );
        }
        result
    }

    async fn execute_inner(&self, call: &Call<'_>) -> Result<Response, PlatformError> {
        let token = self.token().await?;
        let mut response = self.build(call, &token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(
                operation = call.operation,
                "Platform session rejected, re-authenticating"
            );
            self.invalidate_session();
            let token = self.authenticate().await?;
            response = self.build(call, &token).send().await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(PlatformError::Transient(
                    "platform rejected a freshly issued session token".to_string(),
                ));
            }
        }

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(PlatformError::from_status(status, &body))
        }
    }
}
