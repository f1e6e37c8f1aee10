//! External collaborators consumed by the onboarding state machine
//!
//! Each collaborator is a narrow async trait; the orchestrator holds them as
//! `Arc<dyn _>` inside [`Collaborators`], so production HTTP adapters and test
//! doubles are interchangeable.

mod eformsign;
mod mail;
pub mod notice;
mod slack;

pub use eformsign::EformsignClient;
pub use mail::HttpMailRelay;
pub use slack::{slugify_channel_name, SlackClient};

use crate::config::DaemonConfig;
use async_trait::async_trait;
use onboard_types::{ChannelRef, ContractTemplate, DocumentRef, UserRef};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Collaborator call failures
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Connection, timeout or body decoding failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Still throttled after the single retry
    #[error("rate limited calling {0}")]
    RateLimited(String),

    /// The API answered with an error code
    #[error("{method} failed: {code}")]
    Api { method: String, code: String },

    /// A required field was missing from the response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Adapter is not configured for this call
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        CollaboratorError::Transport(err.to_string())
    }
}

impl CollaboratorError {
    /// API error code, if the collaborator returned one
    pub fn api_code(&self) -> Option<&str> {
        match self {
            CollaboratorError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type alias for collaborator calls
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Outcome of inviting a user into a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteOutcome {
    Invited,
    AlreadyMember,
}

/// E-signature platform access token
#[derive(Clone)]
pub struct AccessToken {
    pub access_token: String,
    /// Document API base returned with the token
    pub api_url: Option<String>,
    pub expires_in: Option<i64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Creates supplier channels
#[async_trait]
pub trait ChannelProvisioner: Send + Sync {
    async fn create_channel(&self, company_name: &str) -> CollaboratorResult<ChannelRef>;
}

/// Resolves workspace members and adds them to channels
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    /// `Ok(None)` when no member uses `email`
    async fn lookup(&self, email: &str) -> CollaboratorResult<Option<UserRef>>;

    /// "Already a member" is [`InviteOutcome::AlreadyMember`], not an error
    async fn invite(&self, channel: &ChannelRef, user: &UserRef) -> CollaboratorResult<InviteOutcome>;
}

/// Sends the workspace sign-up e-mail to contacts who are not members yet
#[async_trait]
pub trait InviteMailer: Send + Sync {
    async fn send_join_invite(&self, email: &str, company_name: &str) -> CollaboratorResult<()>;
}

/// Issues contracts for e-signature
#[async_trait]
pub trait ContractDispatcher: Send + Sync {
    async fn issue_token(&self) -> CollaboratorResult<AccessToken>;

    async fn create_document(
        &self,
        token: &AccessToken,
        template: &ContractTemplate,
        recipient_email: &str,
        recipient_name: &str,
    ) -> CollaboratorResult<DocumentRef>;
}

/// Posts human-readable notices
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, target: &str, message: &str) -> CollaboratorResult<()>;
}

/// Every collaborator the state machine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub channels: Arc<dyn ChannelProvisioner>,
    pub membership: Arc<dyn MembershipResolver>,
    pub mailer: Arc<dyn InviteMailer>,
    pub contracts: Arc<dyn ContractDispatcher>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// Production adapters built from configuration
    pub fn from_config(config: &DaemonConfig) -> CollaboratorResult<Self> {
        let slack = Arc::new(SlackClient::new(&config.slack)?);
        Ok(Self {
            channels: slack.clone(),
            membership: slack.clone(),
            mailer: Arc::new(HttpMailRelay::new(&config.mail)?),
            contracts: Arc::new(EformsignClient::new(&config.eformsign)?),
            notifications: slack,
        })
    }
}

pub(crate) fn build_http_client(timeout_secs: u64) -> CollaboratorResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CollaboratorError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Reject a non-success response, keeping a prefix of its body
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> CollaboratorResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Status {
        service,
        status: status.as_u16(),
        body: body.chars().take(512).collect(),
    })
}
