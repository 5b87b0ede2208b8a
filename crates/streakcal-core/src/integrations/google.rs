//! Google account credentials.
//!
//! Client credentials and tokens live in the OS keyring. One consent covers
//! both the Calendar API and sending the digest through Gmail.

use tracing::{debug, info};

use super::keyring_store;
use super::oauth::{self, OAuthConfig, OAuthTokens};
use crate::error::OAuthError;

const SERVICE: &str = "google";
const CLIENT_ID_KEY: &str = "google_client_id";
const CLIENT_SECRET_KEY: &str = "google_client_secret";

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.readonly",
];

/// Google OAuth client.
#[derive(Debug, Clone, Default)]
pub struct GoogleAuth {
    client_id: String,
    client_secret: String,
}

impl GoogleAuth {
    /// Load client credentials from the keyring. Empty if not stored yet.
    pub fn new() -> Self {
        let client_id = keyring_store::get(CLIENT_ID_KEY)
            .ok()
            .flatten()
            .unwrap_or_default();
        let client_secret = keyring_store::get(CLIENT_SECRET_KEY)
            .ok()
            .flatten()
            .unwrap_or_default();
        Self {
            client_id,
            client_secret,
        }
    }

    /// Persist OAuth client credentials to the keyring.
    pub fn set_credentials(client_id: &str, client_secret: &str) -> Result<(), OAuthError> {
        keyring_store::set(CLIENT_ID_KEY, client_id)?;
        keyring_store::set(CLIENT_SECRET_KEY, client_secret)?;
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn is_authenticated(&self) -> bool {
        oauth::load_tokens(SERVICE).is_some()
    }

    fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            service_name: SERVICE.to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            redirect_port: 19821,
        }
    }

    fn runtime() -> Result<tokio::runtime::Runtime, OAuthError> {
        Ok(tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?)
    }

    /// Run the browser consent flow and store the tokens.
    pub fn authenticate(&self) -> Result<(), OAuthError> {
        if !self.has_credentials() {
            return Err(OAuthError::CredentialsNotConfigured {
                service: SERVICE.into(),
            });
        }
        let config = self.oauth_config();
        let tokens = Self::runtime()?.block_on(oauth::authorize(&config))?;
        oauth::store_tokens(SERVICE, &tokens)?;
        info!("google account authorized");
        Ok(())
    }

    /// Remove stored tokens.
    pub fn disconnect(&self) -> Result<(), OAuthError> {
        keyring_store::delete(SERVICE)
    }

    /// A valid access token, refreshed when expired.
    pub fn access_token(&self) -> Result<String, OAuthError> {
        let tokens = oauth::load_tokens(SERVICE).ok_or_else(|| OAuthError::NotAuthenticated {
            service: SERVICE.into(),
        })?;
        if !oauth::is_expired(&tokens) {
            return Ok(tokens.access_token);
        }

        let refresh = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuthError::TokenRefreshFailed("no refresh token stored".into()))?;
        if !self.has_credentials() {
            return Err(OAuthError::CredentialsNotConfigured {
                service: SERVICE.into(),
            });
        }

        debug!("refreshing google access token");
        let config = self.oauth_config();
        let refreshed: OAuthTokens =
            Self::runtime()?.block_on(oauth::refresh_token(&config, refresh))?;
        oauth::store_tokens(SERVICE, &refreshed)?;
        Ok(refreshed.access_token)
    }
}
