//! Onboarding notices and their delivery
//!
//! Messages render missing values as `-`. Delivery failures are logged and
//! swallowed; a notice never changes record state.

use super::NotificationSink;
use crate::config::NotificationConfig;
use chrono::{DateTime, Utc};
use onboard_types::{ChannelRef, SupplierCredentials, UserRef};
use std::sync::Arc;

fn dash(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn channel_created(company: &str, email: &str, channel: &ChannelRef) -> String {
    format!(
        ":loudspeaker: *New supplier channel*\n- Supplier: {}\n- E-mail: `{}`\n- Channel: <#{}>",
        dash(company),
        dash(email),
        channel
    )
}

pub fn join_invite_sent(company: &str, email: &str, at: DateTime<Utc>) -> String {
    format!(
        ":email: *Workspace join invite sent*\n- Supplier: {}\n- To: `{}`\n- At: {}",
        dash(company),
        dash(email),
        timestamp(at)
    )
}

pub fn user_joined(company: &str, user: &UserRef, at: DateTime<Utc>) -> String {
    format!(
        ":chains: *Added to channel*\n- Supplier: {}\n- Member: <@{}>\n- At: {}",
        dash(company),
        user,
        timestamp(at)
    )
}

pub fn contract_sent(company: &str, email: &str, at: DateTime<Utc>) -> String {
    format!(
        ":page_facing_up: *Contract sent*\n- Supplier: {}\n- Recipient: `{}`\n- At: {}",
        dash(company),
        dash(email),
        timestamp(at)
    )
}

pub fn contract_failed(company: &str, email: &str, reason: &str, at: DateTime<Utc>) -> String {
    format!(
        ":warning: *Contract not sent*\n- Supplier: {}\n- Recipient: `{}`\n- At: {}\n- Reason: {}",
        dash(company),
        dash(email),
        timestamp(at),
        dash(reason)
    )
}

pub fn contract_skipped(company: &str) -> String {
    format!(":package: *Contract signed in advance*\n- Supplier: {}", dash(company))
}

/// One-time credentials tip for the supplier channel
pub fn credentials_tip(
    company: &str,
    credentials: Option<&SupplierCredentials>,
    config: &NotificationConfig,
) -> String {
    let login_id = credentials.map(|c| c.login_id.as_str()).unwrap_or("");
    let password = credentials
        .and_then(|c| c.temporary_password.as_deref())
        .unwrap_or("");

    let mut message = format!(":tada: The `{}` supplier channel is ready.\n", dash(company));
    if let Some(url) = &config.portal_login_url {
        message.push_str(&format!("Admin login: {}\n", url));
    }
    message.push_str(&format!(
        "Account: `{}` / Supplier ID: `{}` / Password: `{}`\n\
         Please change the password when prompted on first login.",
        dash(config.portal_account.as_deref().unwrap_or("")),
        dash(login_id),
        dash(password)
    ));
    if !config.guide_channels.is_empty() {
        let links: Vec<String> = config
            .guide_channels
            .iter()
            .map(|c| format!("<#{}>", c))
            .collect();
        message.push_str(&format!("\n:round_pushpin: Guides: {}", links.join(", ")));
    }
    message
}

/// Fan-out to the broadcast channel and the supplier's channel
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    config: NotificationConfig,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, config: NotificationConfig) -> Self {
        Self { sink, config }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Broadcast channel only
    pub async fn broadcast(&self, message: &str) {
        if let Some(target) = self.config.broadcast_channel.as_deref() {
            self.deliver(target, message).await;
        }
    }

    /// Supplier channel only, when it exists
    pub async fn supplier(&self, channel: Option<&ChannelRef>, message: &str) {
        if let Some(channel) = channel {
            self.deliver(channel.as_str(), message).await;
        }
    }

    /// Broadcast channel and supplier channel
    pub async fn both(&self, channel: Option<&ChannelRef>, message: &str) {
        self.broadcast(message).await;
        self.supplier(channel, message).await;
    }

    async fn deliver(&self, target: &str, message: &str) {
        if let Err(e) = self.sink.send(target, message).await {
            tracing::warn!(channel = target, error = %e, "Notification not delivered");
        }
    }
}
