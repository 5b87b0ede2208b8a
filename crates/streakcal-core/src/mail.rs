//! Digest delivery.
//!
//! [`OutboxMailer`] drops `.eml` files into a directory; [`GmailMailer`]
//! sends through the Gmail API with the account authorized for the calendar.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::MailError;
use crate::integrations::google::GoogleAuth;
use crate::storage::data_dir;

pub const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// RFC 822 text with a UTF-8 plain body.
    pub fn to_rfc822(&self, date: DateTime<Utc>) -> String {
        let subject = if self.subject.is_ascii() {
            self.subject.clone()
        } else {
            format!("=?UTF-8?B?{}?=", STANDARD.encode(self.subject.as_bytes()))
        };
        let body = self.body.replace("\r\n", "\n").replace('\n', "\r\n");
        format!(
            "To: {}\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}\r\n",
            self.to,
            subject,
            date.to_rfc2822(),
            body
        )
    }
}

/// Outgoing mail transport.
pub trait Mailer {
    fn send(&mut self, message: &MailMessage) -> Result<(), MailError>;

    /// Recipient to use when none is configured.
    fn default_recipient(&self) -> Result<Option<String>, MailError> {
        Ok(None)
    }
}

/// Writes each message to `<dir>/<timestamp>-<id>.eml`.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Outbox under the data directory.
    pub fn open() -> Result<Self, MailError> {
        let dir = data_dir()
            .map_err(|e| MailError::Io(std::io::Error::other(e.to_string())))?
            .join("outbox");
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Messages written so far, oldest first.
    pub fn messages(&self) -> Result<Vec<PathBuf>, MailError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "eml"))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl Mailer for OutboxMailer {
    fn send(&mut self, message: &MailMessage) -> Result<(), MailError> {
        std::fs::create_dir_all(&self.dir)?;
        let now = Utc::now();
        let name = format!(
            "{}-{}.eml",
            now.format("%Y%m%dT%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let path = self.dir.join(name);
        std::fs::write(&path, message.to_rfc822(now))?;
        info!(path = %path.display(), to = %message.to, "digest written to outbox");
        Ok(())
    }

    fn default_recipient(&self) -> Result<Option<String>, MailError> {
        let user = std::env::var("USER").unwrap_or_else(|_| "me".into());
        Ok(Some(format!("{user}@localhost")))
    }
}

/// Gmail `users.messages.send`.
pub struct GmailMailer {
    base_url: String,
    token: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl GmailMailer {
    /// Connect with the stored Google credentials.
    pub fn connect() -> Result<Self, MailError> {
        let token = GoogleAuth::new().access_token()?;
        Self::with_base_url(GMAIL_API, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, MailError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
            runtime,
        })
    }

    fn call(&self, req: reqwest::RequestBuilder) -> Result<Value, MailError> {
        self.runtime.block_on(async move {
            let resp = req.bearer_auth(&self.token).send().await?;
            let status = resp.status();
            let text = resp.text().await?;
            debug!(%status, "gmail request");
            if !status.is_success() {
                return Err(MailError::Api(format!("{status}: {text}")));
            }
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| MailError::Api(format!("invalid JSON: {e}")))
        })
    }
}

impl Mailer for GmailMailer {
    fn send(&mut self, message: &MailMessage) -> Result<(), MailError> {
        let raw = URL_SAFE_NO_PAD.encode(message.to_rfc822(Utc::now()));
        let url = format!("{}/users/me/messages/send", self.base_url);
        let resp = self.call(self.http.post(url).json(&json!({ "raw": raw })))?;
        info!(to = %message.to, id = resp["id"].as_str().unwrap_or_default(), "digest sent via gmail");
        Ok(())
    }

    fn default_recipient(&self) -> Result<Option<String>, MailError> {
        let url = format!("{}/users/me/profile", self.base_url);
        let profile = self.call(self.http.get(url))?;
        Ok(profile["emailAddress"].as_str().map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message() -> MailMessage {
        MailMessage {
            to: "me@example.com".into(),
            subject: "🗓️ Weekly Habit Report: 2026-10-12".into(),
            body: "line one\nline two".into(),
        }
    }

    #[test]
    fn rfc822_encodes_utf8_subject_and_crlf_body() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let text = message().to_rfc822(at);
        assert!(text.starts_with("To: me@example.com\r\nSubject: =?UTF-8?B?"));
        assert!(text.contains("Content-Type: text/plain; charset=UTF-8"));
        assert!(text.ends_with("\r\n\r\nline one\r\nline two\r\n"));
    }

    #[test]
    fn outbox_writes_eml_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut outbox = OutboxMailer::new(dir.path().join("outbox"));
        assert!(outbox.messages().unwrap().is_empty());

        outbox.send(&message()).unwrap();
        let files = outbox.messages().unwrap();
        assert_eq!(files.len(), 1);
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert!(text.contains("line two"));
    }

    #[test]
    fn gmail_posts_raw_message() {
        let mut server = mockito::Server::new();
        let send = server
            .mock("POST", "/users/me/messages/send")
            .match_header("authorization", "Bearer tok")
            .match_body(mockito::Matcher::Regex(r#"\{"raw":"[A-Za-z0-9_-]+"\}"#.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"m1"}"#)
            .create();

        let mut gmail = GmailMailer::with_base_url(&server.url(), "tok").unwrap();
        gmail.send(&message()).unwrap();
        send.assert();
    }

    #[test]
    fn gmail_profile_supplies_recipient() {
        let mut server = mockito::Server::new();
        let _profile = server
            .mock("GET", "/users/me/profile")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"emailAddress":"owner@example.com"}"#)
            .create();

        let gmail = GmailMailer::with_base_url(&server.url(), "tok").unwrap();
        assert_eq!(
            gmail.default_recipient().unwrap().as_deref(),
            Some("owner@example.com")
        );
    }

    #[test]
    fn gmail_error_status_is_api_error() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/users/me/messages/send")
            .with_status(403)
            .with_body("insufficient scope")
            .create();
        let mut gmail = GmailMailer::with_base_url(&server.url(), "tok").unwrap();
        assert!(matches!(gmail.send(&message()), Err(MailError::Api(msg)) if msg.contains("403")));
    }
}
