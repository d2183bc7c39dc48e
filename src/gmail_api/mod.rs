//! Gmail API module split into logical submodules
//!
//! This module provides all Gmail API functionality organized into:
//! - auth: Credential loading, refresh and the interactive OAuth flow
//! - messages: Inbox listing with pagination
//! - operations: Message actions (archive)

pub mod auth;
pub mod messages;
pub mod operations;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::types::{GoogleErrorResponse, MessagePage};

// Re-export commonly used functions
pub use auth::{try_authenticate, FileTokenStore, HttpTokenRefresher, OAuthFlow, RealOAuthFlow};
pub use auth::{TokenRefresher, TokenStore};
pub use messages::{fetch_inbox_page, list_inbox};
pub use operations::archive_message;

pub const INBOX_LABEL: &str = "INBOX";

const RATE_LIMIT_REASONS: &[&str] = &[
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
    "quotaExceeded",
];

/// The two Gmail calls the archiver needs, kept behind a trait so the loop
/// can run against fakes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailService: Send + Sync {
    async fn list_inbox_page(&self, page_token: Option<String>) -> Result<MessagePage>;
    async fn archive_message(&self, message_id: &str) -> Result<()>;
}

pub struct GmailClient {
    pub client: reqwest::Client,
    pub token: String,
    pub base_url: String,
}

impl GmailClient {
    pub fn new(client: reqwest::Client, token: String, base_url: impl Into<String>) -> Self {
        Self {
            client,
            token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_inbox_page(&self, page_token: Option<String>) -> Result<MessagePage> {
        fetch_inbox_page(self, page_token.as_deref()).await
    }

    async fn archive_message(&self, message_id: &str) -> Result<()> {
        archive_message(self, message_id).await
    }
}

// Turn a non-success response into the matching error variant
pub(crate) async fn error_for_response(response: reqwest::Response) -> Error {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    classify_error(status, &error_text)
}

pub(crate) fn classify_error(status: StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<GoogleErrorResponse>(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|r| r.error.message.clone())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        });

    let rate_limit_reason = parsed.as_ref().is_some_and(|r| {
        r.error.errors.iter().any(|detail| {
            detail
                .reason
                .as_deref()
                .is_some_and(|reason| RATE_LIMIT_REASONS.contains(&reason))
        }) || r.error.status.as_deref() == Some("RESOURCE_EXHAUSTED")
    });

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && rate_limit_reason)
    {
        Error::RateLimited(message)
    } else if status == StatusCode::UNAUTHORIZED {
        Error::Authorization(message)
    } else if status.is_server_error() {
        Error::ServiceUnavailable {
            status: status.as_u16(),
            message,
        }
    } else {
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}
