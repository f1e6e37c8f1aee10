//! eformsign contract dispatcher

use super::{
    build_http_client, ensure_success, AccessToken, CollaboratorError, CollaboratorResult,
    ContractDispatcher,
};
use crate::config::EformsignConfig;
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use onboard_types::{ContractTemplate, DocumentRef};
use reqwest::Client;
use serde_json::{json, Value};

/// Response paths that may carry the created document's id
const DOCUMENT_ID_PATHS: &[&str] = &[
    "/document/id",
    "/document/document_id",
    "/documentId",
    "/id",
    "/document_id",
    "/result/document_id",
    "/result/id",
];

#[derive(Debug, Clone)]
pub struct EformsignClient {
    http: Client,
    config: EformsignConfig,
}

impl EformsignClient {
    pub fn new(config: &EformsignConfig) -> CollaboratorResult<Self> {
        for (name, value) in [
            ("eformsign.api_key", &config.api_key),
            ("eformsign.signature_bearer", &config.signature_bearer),
            ("eformsign.member_id", &config.member_id),
        ] {
            if value.trim().is_empty() {
                return Err(CollaboratorError::Config(format!("{} is not set", name)));
            }
        }
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            config: config.clone(),
        })
    }

    fn template_id(&self, template: &ContractTemplate) -> CollaboratorResult<String> {
        let (configured, key) = match template {
            ContractTemplate::None => {
                return Err(CollaboratorError::Config("no contract template selected".into()))
            }
            ContractTemplate::FlatRate { .. } => {
                (&self.config.flat_rate_template_id, "eformsign.flat_rate_template_id")
            }
            ContractTemplate::Tiered { .. } => {
                (&self.config.tiered_template_id, "eformsign.tiered_template_id")
            }
        };
        configured
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::Config(format!("{} is not set", key)))
    }

    fn document_body(
        &self,
        template: &ContractTemplate,
        recipient_email: &str,
        recipient_name: &str,
    ) -> Value {
        json!({
            "document": {
                "document_name": self.config.document_name,
                "comment": self.config.document_comment,
                "recipients": [{
                    "step_type": "05",
                    "use_mail": true,
                    "use_sms": false,
                    "member": {
                        "name": recipient_name,
                        "id": recipient_email,
                    },
                    "auth": {
                        "valid": { "day": self.config.valid_days, "hour": 0 }
                    }
                }],
                "fields": template_fields(template),
                "select_group_name": "",
                "notification": []
            }
        })
    }
}

/// Commission terms filled into the document template
fn template_fields(template: &ContractTemplate) -> Value {
    match template {
        ContractTemplate::None => json!([]),
        ContractTemplate::FlatRate { percent } => json!([
            { "id": "commission", "value": format!("commission {}%", percent) }
        ]),
        ContractTemplate::Tiered {
            threshold_amount,
            percent_under,
            percent_over,
        } => json!([
            { "id": "threshold", "value": threshold_amount.to_string() },
            { "id": "percent_under", "value": percent_under.to_string() },
            { "id": "percent_over", "value": percent_over.to_string() }
        ]),
    }
}

/// Accepts both the flat token response and the nested
/// `oauth_token` / `api_key.company` shape
fn parse_token(body: &Value) -> CollaboratorResult<AccessToken> {
    let pick = |flat: &str, nested: &str| {
        body.get(flat)
            .filter(|v| !v.is_null())
            .or_else(|| body.pointer(nested))
            .cloned()
    };

    let access_token = pick("access_token", "/oauth_token/access_token")
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            let keys: Vec<&str> = body
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            CollaboratorError::InvalidResponse(format!(
                "token response missing access_token (keys={:?})",
                keys
            ))
        })?;

    Ok(AccessToken {
        access_token,
        api_url: pick("api_url", "/api_key/company/api_url")
            .and_then(|v| v.as_str().map(str::to_string)),
        expires_in: pick("expires_in", "/oauth_token/expires_in").and_then(|v| v.as_i64()),
    })
}

fn extract_document_id(body: &Value) -> Option<String> {
    DOCUMENT_ID_PATHS.iter().find_map(|path| match body.pointer(path)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl ContractDispatcher for EformsignClient {
    async fn issue_token(&self) -> CollaboratorResult<AccessToken> {
        let url = format!("{}/api_auth/access_token", self.config.base_url.trim_end_matches('/'));
        let encoded_key = base64::engine::general_purpose::STANDARD.encode(&self.config.api_key);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", encoded_key))
            .header(
                "eformsign_signature",
                format!("Bearer {}", self.config.signature_bearer),
            )
            .json(&json!({
                "execution_time": Utc::now().timestamp_millis(),
                "member_id": self.config.member_id,
            }))
            .send()
            .await?;

        let body: Value = ensure_success("eformsign", response).await?.json().await?;
        let token = parse_token(&body)?;
        tracing::info!(
            api_url = token.api_url.as_deref().unwrap_or("(none)"),
            expires_in = ?token.expires_in,
            "eformsign token issued"
        );
        Ok(token)
    }

    async fn create_document(
        &self,
        token: &AccessToken,
        template: &ContractTemplate,
        recipient_email: &str,
        recipient_name: &str,
    ) -> CollaboratorResult<DocumentRef> {
        let template_id = self.template_id(template)?;
        let api_base = token
            .api_url
            .as_deref()
            .or(self.config.api_url.as_deref())
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                CollaboratorError::InvalidResponse("token carries no api_url to send documents to".into())
            })?;

        let response = self
            .http
            .post(format!("{}/v2.0/api/documents", api_base))
            .query(&[("template_id", template_id.as_str())])
            .bearer_auth(&token.access_token)
            .json(&self.document_body(template, recipient_email, recipient_name))
            .send()
            .await?;

        let body: Value = ensure_success("eformsign", response).await?.json().await?;
        let document_id = extract_document_id(&body).ok_or_else(|| {
            CollaboratorError::InvalidResponse("document response carries no document id".into())
        })?;

        tracing::info!(
            template_id = %template_id,
            recipient = recipient_email,
            document_id = %document_id,
            "eformsign document created"
        );
        Ok(DocumentRef::new(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_flat_token() {
        let token = parse_token(&json!({
            "access_token": "abc",
            "api_url": "https://kr-api.eformsign.com",
            "expires_in": 3600
        }))
        .unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.api_url.as_deref(), Some("https://kr-api.eformsign.com"));
        assert_eq!(token.expires_in, Some(3600));
    }

    #[test]
    fn test_parse_nested_token() {
        let token = parse_token(&json!({
            "oauth_token": { "access_token": "xyz", "expires_in": 60 },
            "api_key": { "company": { "api_url": "https://api.example" } }
        }))
        .unwrap();
        assert_eq!(token.access_token, "xyz");
        assert_eq!(token.api_url.as_deref(), Some("https://api.example"));
    }

    #[test]
    fn test_missing_access_token_is_invalid() {
        let err = parse_token(&json!({ "refresh_token": "r" })).unwrap_err();
        assert!(err.to_string().contains("refresh_token"));
    }

    #[test]
    fn test_document_id_paths() {
        assert_eq!(
            extract_document_id(&json!({ "document": { "id": "d1" } })).as_deref(),
            Some("d1")
        );
        assert_eq!(
            extract_document_id(&json!({ "result": { "document_id": 42 } })).as_deref(),
            Some("42")
        );
        assert_eq!(
            extract_document_id(&json!({ "document": { "id": "" }, "documentId": "d2" })).as_deref(),
            Some("d2")
        );
        assert_eq!(extract_document_id(&json!({ "status": "ok" })), None);
    }

    #[test]
    fn test_template_fields() {
        let flat = template_fields(&ContractTemplate::flat_rate(Decimal::new(1250, 2)));
        assert_eq!(flat[0]["value"], "commission 12.50%");

        let tiered = template_fields(&ContractTemplate::tiered(
            10_000_000,
            Decimal::from(10),
            Decimal::from(20),
        ));
        assert_eq!(tiered.as_array().map(Vec::len), Some(3));
        assert_eq!(tiered[0]["value"], "10000000");
    }

    #[test]
    fn test_template_id_requires_config() {
        let client = EformsignClient::new(&EformsignConfig {
            api_key: "k".into(),
            signature_bearer: "s".into(),
            member_id: "m".into(),
            flat_rate_template_id: Some("tpl-a".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client
                .template_id(&ContractTemplate::flat_rate(Decimal::from(5)))
                .unwrap(),
            "tpl-a"
        );
        assert!(client
            .template_id(&ContractTemplate::tiered(0, Decimal::ONE, Decimal::ONE))
            .is_err());
    }
}
