//! Session tokens from the identity service.

use super::requests::AuthRequest;
use super::responses::TokenResponse;
use super::SysinvClient;
use crate::platform::PlatformError;
use chrono::{DateTime, Duration, Utc};
use std::sync::PoisonError;
use tracing::{debug, warn};
use zeroize::Zeroizing;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Lifetime assumed when the identity service returns an unparsable expiry
const FALLBACK_TOKEN_LIFETIME_MINUTES: i64 = 30;

pub(crate) struct Session {
    pub token: Zeroizing<String>,
    pub expires_at: DateTime<Utc>,
}

impl SysinvClient {
    /// Current token, authenticating first if the session is missing or about to expire
    pub(crate) async fn token(&self) -> Result<Zeroizing<String>, PlatformError> {
        let margin = Duration::seconds(self.config.token_refresh_margin_secs);
        {
            let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(session) = session.as_ref() {
                if session.expires_at - margin > Utc::now() {
                    return Ok(session.token.clone());
                }
            }
        }
        self.authenticate().await
    }

    pub(crate) fn invalidate_session(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Request a new project-scoped token
    pub(crate) async fn authenticate(&self) -> Result<Zeroizing<String>, PlatformError> {
        let url = format!(
            "{}/auth/tokens",
            self.config.auth_url.trim_end_matches('/')
        );
        debug!(url = url.as_str(), "Requesting platform session token");

        let response = self
            .http_client
            .post(&url)
            .json(&AuthRequest::password(&self.config))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Credentials may be rotated out of band, keep retrying
            return Err(PlatformError::Transient(
                "identity service rejected the platform credentials".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status, &body));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| Zeroizing::new(v.to_string()))
            .ok_or_else(|| {
                PlatformError::Transient(format!(
                    "identity service response has no {SUBJECT_TOKEN_HEADER} header"
                ))
            })?;

        let body: TokenResponse = response.json().await?;
        let expires_at = DateTime::parse_from_rfc3339(&body.token.expires_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                warn!(
                    expires_at = body.token.expires_at.as_str(),
                    error = %e,
                    "Unparsable token expiry, assuming {FALLBACK_TOKEN_LIFETIME_MINUTES} minutes"
                );
                Utc::now() + Duration::minutes(FALLBACK_TOKEN_LIFETIME_MINUTES)
            });

        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(Session {
            token: token.clone(),
            expires_at,
        });
        debug!(expires_at = %expires_at, "Platform session established");
        Ok(token)
    }
}
