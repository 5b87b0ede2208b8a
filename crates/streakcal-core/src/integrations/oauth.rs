//! OAuth2 authorization code flow for a desktop CLI.
//!
//! 1. Opens the browser at the authorization URL
//! 2. Accepts the redirect on a localhost listener
//! 3. Exchanges the code for an access token and refresh token

use std::io::{Read, Write};
use std::net::TcpListener;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::keyring_store;
use crate::error::OAuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp.
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub service_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_port: u16,
}

impl OAuthConfig {
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }

    pub fn auth_url_full(&self) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri()),
            urlencoding::encode(&scopes),
        )
    }
}

/// Run the browser flow and return fresh tokens. Storing them is up to the caller.
pub async fn authorize(config: &OAuthConfig) -> Result<OAuthTokens, OAuthError> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", config.redirect_port))?;

    let auth_url = config.auth_url_full();
    info!(service = %config.service_name, "opening browser for authorization");
    if open::that(&auth_url).is_err() {
        eprintln!("Open this URL to authorize:\n{auth_url}");
    }

    let (mut stream, _) = listener.accept()?;
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf)?;
    let request = String::from_utf8_lossy(&buf[..n]);

    if let Some(err) = extract_param(&request, "error") {
        return Err(OAuthError::AuthorizationFailed(err));
    }
    let code = extract_param(&request, "code")
        .ok_or_else(|| OAuthError::InvalidCallback("no code in callback".into()))?;

    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body><h2>streakcal is authorized.</h2><p>You can close this tab.</p></body></html>";
    stream.write_all(response.as_bytes())?;
    drop(stream);
    drop(listener);

    exchange_code(config, &code).await
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(config: &OAuthConfig, code: &str) -> Result<OAuthTokens, OAuthError> {
    let redirect_uri = config.redirect_uri();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];

    let body: Value = Client::new()
        .post(&config.token_url)
        .form(&params)
        .send()
        .await?
        .json()
        .await?;

    if let Some(error) = body.get("error") {
        return Err(OAuthError::TokenExchangeFailed(error.to_string()));
    }
    Ok(parse_tokens(&body, None))
}

/// Refresh an access token. The old refresh token is kept when the
/// provider does not rotate it.
pub async fn refresh_token(config: &OAuthConfig, refresh: &str) -> Result<OAuthTokens, OAuthError> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];

    let resp = Client::new()
        .post(&config.token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;
    let body: Value = resp
        .json()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

    if let Some(error) = body.get("error") {
        return Err(OAuthError::TokenRefreshFailed(error.to_string()));
    }
    debug!(service = %config.service_name, "access token refreshed");
    Ok(parse_tokens(&body, Some(refresh)))
}

fn parse_tokens(body: &Value, previous_refresh: Option<&str>) -> OAuthTokens {
    let expires_at = body
        .get("expires_in")
        .and_then(Value::as_i64)
        .map(|secs| chrono::Utc::now().timestamp() + secs);

    OAuthTokens {
        access_token: body["access_token"].as_str().unwrap_or_default().to_string(),
        refresh_token: body
            .get("refresh_token")
            .and_then(Value::as_str)
            .or(previous_refresh)
            .map(String::from),
        expires_at,
        token_type: body["token_type"].as_str().unwrap_or("Bearer").to_string(),
        scope: body.get("scope").and_then(Value::as_str).map(String::from),
    }
}

pub fn store_tokens(service_name: &str, tokens: &OAuthTokens) -> Result<(), OAuthError> {
    let json = serde_json::to_string(tokens)
        .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;
    keyring_store::set(service_name, &json)
}

/// Load stored tokens from the keyring.
pub fn load_tokens(service_name: &str) -> Option<OAuthTokens> {
    keyring_store::get(service_name)
        .ok()
        .flatten()
        .and_then(|json| serde_json::from_str(&json).ok())
}

/// Expired, or expiring within 60 seconds.
pub fn is_expired(tokens: &OAuthTokens) -> bool {
    match tokens.expires_at {
        Some(exp) => chrono::Utc::now().timestamp() > exp - 60,
        None => false,
    }
}

fn extract_param(request: &str, name: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let path = first_line.split_whitespace().nth(1)?;
    let url = url::Url::parse(&format!("http://localhost{path}")).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token_url: String) -> OAuthConfig {
        OAuthConfig {
            service_name: "google".into(),
            client_id: "client id".into(),
            client_secret: "secret".into(),
            auth_url: "https://accounts.example.com/auth".into(),
            token_url,
            scopes: vec!["a".into(), "b".into()],
            redirect_port: 19822,
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn auth_url_encodes_parameters() {
        let url = config(String::new()).auth_url_full();
        assert!(url.starts_with("https://accounts.example.com/auth?client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A19822%2Fcallback"));
        assert!(url.contains("scope=a%20b"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn callback_code_is_extracted() {
        let req = "GET /callback?code=4%2Fabc&scope=x HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(extract_param(req, "code").as_deref(), Some("4/abc"));
        assert_eq!(extract_param(req, "error"), None);
        assert_eq!(extract_param("", "code"), None);
    }

    #[test]
    fn expiry_uses_sixty_second_margin() {
        let now = chrono::Utc::now().timestamp();
        let mut tokens = OAuthTokens {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: Some(now + 30),
            token_type: "Bearer".into(),
            scope: None,
        };
        assert!(is_expired(&tokens));
        tokens.expires_at = Some(now + 3600);
        assert!(!is_expired(&tokens));
        tokens.expires_at = None;
        assert!(!is_expired(&tokens));
    }

    #[test]
    fn refresh_keeps_previous_refresh_token() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new","expires_in":3600,"token_type":"Bearer"}"#)
            .create();

        let cfg = config(format!("{}/token", server.url()));
        let tokens = runtime().block_on(refresh_token(&cfg, "r1")).unwrap();
        assert_eq!(tokens.access_token, "new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
        assert!(!is_expired(&tokens));
    }

    #[test]
    fn exchange_error_is_reported() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create();

        let cfg = config(format!("{}/token", server.url()));
        let err = runtime().block_on(exchange_code(&cfg, "bad")).unwrap_err();
        assert!(matches!(err, OAuthError::TokenExchangeFailed(msg) if msg.contains("invalid_grant")));
    }
}
