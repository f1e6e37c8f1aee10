//! Slack Web API adapter

use super::{
    build_http_client, ensure_success, ChannelProvisioner, CollaboratorError, CollaboratorResult,
    InviteOutcome, MembershipResolver, NotificationSink,
};
use crate::config::SlackConfig;
use async_trait::async_trait;
use chrono::Utc;
use onboard_types::{ChannelRef, UserRef};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

const MAX_CHANNEL_NAME: usize = 80;

/// Longest throttle wait honoured inside a tick, which runs under a lease
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Slack client implementing channel provisioning, membership and notices
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: Client,
    base_url: String,
    token: String,
    channel_prefix: String,
    private_channels: bool,
    admin_user_ids: Vec<String>,
    require_admin_invite: bool,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> CollaboratorResult<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(CollaboratorError::Config("slack.bot_token is not set".into()));
        }
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            channel_prefix: config.channel_prefix.clone(),
            private_channels: config.private_channels,
            admin_user_ids: config.admin_user_ids.clone(),
            require_admin_invite: config.require_admin_invite,
        })
    }

    /// Call a Web API method; a 429 is retried once after `Retry-After`
    async fn call(&self, method: &str, params: &[(&str, String)]) -> CollaboratorResult<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let mut retried = false;

        let response = loop {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .form(params)
                .send()
                .await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                break response;
            }
            if retried {
                return Err(CollaboratorError::RateLimited(method.to_string()));
            }
            let wait = retry_after_secs(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            tracing::warn!(method = method, wait_secs = wait, "Slack rate limited, retrying once");
            tokio::time::sleep(Duration::from_secs(wait)).await;
            retried = true;
        };

        let body: Value = ensure_success("slack", response).await?.json().await?;
        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(body);
        }
        let code = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        Err(CollaboratorError::Api {
            method: method.to_string(),
            code: code.to_string(),
        })
    }

    async fn create_named(&self, name: &str) -> CollaboratorResult<ChannelRef> {
        let body = self
            .call(
                "conversations.create",
                &[
                    ("name", name.to_string()),
                    ("is_private", self.private_channels.to_string()),
                ],
            )
            .await?;
        body.pointer("/channel/id")
            .and_then(Value::as_str)
            .map(ChannelRef::new)
            .ok_or_else(|| {
                CollaboratorError::InvalidResponse("conversations.create: missing channel.id".into())
            })
    }

    async fn invite_admins(&self, channel: &ChannelRef) -> CollaboratorResult<()> {
        if self.admin_user_ids.is_empty() {
            return Ok(());
        }
        let result = self
            .call(
                "conversations.invite",
                &[
                    ("channel", channel.to_string()),
                    ("users", self.admin_user_ids.join(",")),
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.api_code() == Some("already_in_channel") => Ok(()),
            Err(e) if self.require_admin_invite => Err(e),
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Admin invite failed");
                Ok(())
            }
        }
    }
}

/// Seconds to wait from a `Retry-After` value, clamped to `1..=30`
fn retry_after_secs(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_RETRY_AFTER_SECS)
}

/// Slack-safe channel name: lowercase, whitespace to `_`, only `[a-z0-9_-]`
/// and Hangul kept, separator runs collapsed, at most 80 characters
pub fn slugify_channel_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());

    for c in name.trim().to_lowercase().chars() {
        let c = if c.is_whitespace() { '_' } else { c };
        let allowed = c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || c == '-'
            || c == '_'
            || ('가'..='힣').contains(&c);
        if !allowed {
            continue;
        }
        if (c == '_' || c == '-') && slug.ends_with(c) {
            continue;
        }
        slug.push(c);
    }

    let slug: String = slug
        .trim_matches(|c| c == '_' || c == '-')
        .chars()
        .take(MAX_CHANNEL_NAME)
        .collect();
    if slug.is_empty() {
        "channel".to_string()
    } else {
        slug
    }
}

#[async_trait]
impl ChannelProvisioner for SlackClient {
    async fn create_channel(&self, company_name: &str) -> CollaboratorResult<ChannelRef> {
        let name = slugify_channel_name(&format!("{}{}", self.channel_prefix, company_name));

        let channel = match self.create_named(&name).await {
            Err(e) if e.api_code() == Some("name_taken") => {
                let suffix = format!("-{}", Utc::now().timestamp());
                let base: String = name
                    .chars()
                    .take(MAX_CHANNEL_NAME - suffix.len())
                    .collect();
                let retry_name = format!("{}{}", base, suffix);
                tracing::info!(name = %name, retry_name = %retry_name, "Channel name taken");
                self.create_named(&retry_name).await?
            }
            other => other?,
        };

        if let Err(e) = self
            .call("conversations.join", &[("channel", channel.to_string())])
            .await
        {
            tracing::debug!(channel = %channel, error = %e, "Join after create ignored");
        }

        self.invite_admins(&channel).await?;

        tracing::info!(channel = %channel, name = %name, "Created supplier channel");
        Ok(channel)
    }
}

#[async_trait]
impl MembershipResolver for SlackClient {
    async fn lookup(&self, email: &str) -> CollaboratorResult<Option<UserRef>> {
        match self
            .call("users.lookupByEmail", &[("email", email.to_string())])
            .await
        {
            Ok(body) => body
                .pointer("/user/id")
                .and_then(Value::as_str)
                .map(|id| Some(UserRef::new(id)))
                .ok_or_else(|| {
                    CollaboratorError::InvalidResponse("users.lookupByEmail: missing user.id".into())
                }),
            Err(e) if e.api_code() == Some("users_not_found") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn invite(&self, channel: &ChannelRef, user: &UserRef) -> CollaboratorResult<InviteOutcome> {
        match self
            .call(
                "conversations.invite",
                &[("channel", channel.to_string()), ("users", user.to_string())],
            )
            .await
        {
            Ok(_) => Ok(InviteOutcome::Invited),
            Err(e) if e.api_code() == Some("already_in_channel") => Ok(InviteOutcome::AlreadyMember),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl NotificationSink for SlackClient {
    async fn send(&self, target: &str, message: &str) -> CollaboratorResult<()> {
        self.call(
            "chat.postMessage",
            &[("channel", target.to_string()), ("text", message.to_string())],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify_channel_name("vendor-Acme Foods"), "vendor-acme_foods");
    }

    #[test]
    fn test_slugify_drops_symbols_and_collapses() {
        assert_eq!(slugify_channel_name("vendor-A & B  (Co.)"), "vendor-a_b_co");
        assert_eq!(slugify_channel_name("--x__y--"), "x_y");
    }

    #[test]
    fn test_slugify_keeps_hangul() {
        assert_eq!(slugify_channel_name("vendor-한국 상사"), "vendor-한국_상사");
    }

    #[test]
    fn test_slugify_fallback_and_length() {
        assert_eq!(slugify_channel_name("!!!"), "channel");
        assert_eq!(slugify_channel_name(&"a".repeat(200)).len(), 80);
    }

    #[test]
    fn test_retry_after_is_clamped() {
        assert_eq!(retry_after_secs(Some("3")), 3);
        assert_eq!(retry_after_secs(Some(" 7 ")), 7);
        assert_eq!(retry_after_secs(Some("0")), 1);
        assert_eq!(retry_after_secs(Some("3600")), MAX_RETRY_AFTER_SECS);
        assert_eq!(retry_after_secs(Some("soon")), 1);
        assert_eq!(retry_after_secs(None), 1);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = SlackClient::new(&SlackConfig::default()).unwrap_err();
        assert!(matches!(err, CollaboratorError::Config(_)));
    }
}
