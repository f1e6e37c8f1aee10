//! Join-invite e-mail through an HTTP mail relay

use super::{build_http_client, ensure_success, CollaboratorError, CollaboratorResult, InviteMailer};
use crate::config::MailConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
    html: String,
}

#[derive(Debug, Clone)]
pub struct HttpMailRelay {
    http: Client,
    config: MailConfig,
}

impl HttpMailRelay {
    pub fn new(config: &MailConfig) -> CollaboratorResult<Self> {
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            config: config.clone(),
        })
    }

    fn compose<'a>(&'a self, to: &'a str, company_name: &str) -> OutgoingMail<'a> {
        let name = if company_name.trim().is_empty() {
            "supplier"
        } else {
            company_name.trim()
        };
        let join_url = &self.config.workspace_join_url;

        OutgoingMail {
            from: &self.config.from,
            to,
            subject: format!("[{}] Join our Slack workspace to access your channel", name),
            text: format!(
                "Hello {name},\n\n\
                 Before we can add you to your dedicated Slack channel, please join our workspace:\n\n\
                 {join_url}\n\n\
                 Once you have joined, you will be invited to the channel automatically.\n"
            ),
            html: format!(
                "<p>Hello <b>{name}</b>,</p>\
                 <p>Before we can add you to your dedicated Slack channel, please join our workspace.</p>\
                 <p><a href=\"{join_url}\">Join the workspace</a></p>\
                 <p>Once you have joined, you will be invited to the channel automatically.</p>"
            ),
        }
    }
}

#[async_trait]
impl InviteMailer for HttpMailRelay {
    async fn send_join_invite(&self, email: &str, company_name: &str) -> CollaboratorResult<()> {
        let to = email.trim();
        if to.is_empty() {
            return Err(CollaboratorError::Config("invite recipient is empty".into()));
        }
        if self.config.workspace_join_url.trim().is_empty() {
            return Err(CollaboratorError::Config("mail.workspace_join_url is not set".into()));
        }
        if self.config.relay_url.trim().is_empty() {
            return Err(CollaboratorError::Config("mail.relay_url is not set".into()));
        }

        let mut request = self
            .http
            .post(&self.config.relay_url)
            .json(&self.compose(to, company_name));
        if let Some(token) = &self.config.relay_token {
            request = request.bearer_auth(token);
        }
        ensure_success("mail relay", request.send().await?).await?;

        tracing::info!(to = to, "Join invite e-mail sent");
        Ok(())
    }
}
