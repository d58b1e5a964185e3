//! MailerLite Client
//!
//! `POST /subscribers` upserts by email and attaches the contact to groups.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{MailingGroup, MailingList, Subscriber};
use crate::error::{PaymentError, Result};

pub const DEFAULT_API_URL: &str = "https://connect.mailerlite.com/api";

#[derive(Clone, Debug)]
pub struct MailerLiteConfig {
    pub api_url: String,
    pub api_key: String,
    pub business_group_id: String,
    pub customer_group_id: String,
    pub timeout_secs: u64,
}

impl MailerLiteConfig {
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| PaymentError::Config(format!("{name} not set")))
        };

        Ok(Self {
            api_url: std::env::var("MAILERLITE_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.into())
                .trim_end_matches('/')
                .to_string(),
            api_key: var("MAILERLITE_API_KEY")?,
            business_group_id: var("MAILERLITE_BUSINESS_GROUP_ID")?,
            customer_group_id: var("MAILERLITE_CUSTOMER_GROUP_ID")?,
            timeout_secs: 30,
        })
    }

    pub fn group_id(&self, group: MailingGroup) -> &str {
        match group {
            MailingGroup::Business => &self.business_group_id,
            MailingGroup::Customer => &self.customer_group_id,
        }
    }
}

#[derive(Serialize)]
struct SubscriberBody<'a> {
    email: &'a str,
    fields: &'a Map<String, Value>,
    groups: [&'a str; 1],
}

pub struct MailerLiteClient {
    http: reqwest::Client,
    config: MailerLiteConfig,
}

impl MailerLiteClient {
    pub fn new(config: MailerLiteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(MailerLiteConfig::from_env()?)
    }
}

#[async_trait]
impl MailingList for MailerLiteClient {
    async fn subscribe(&self, subscriber: &Subscriber) -> Result<Value> {
        let body = SubscriberBody {
            email: &subscriber.email,
            fields: &subscriber.fields,
            groups: [self.config.group_id(subscriber.group)],
        };

        let response = self
            .http
            .post(format!("{}/subscribers", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::MailingList(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::MailingList(e.to_string()))?;
        let payload = read_reply(status, &body)?;

        tracing::debug!(email = %subscriber.email, group = ?subscriber.group, "Subscribed contact");
        Ok(payload)
    }
}

/// Error replies surface their `message`; an unreadable success body is
/// logged and returned as `null` since the contact was still stored.
fn read_reply(status: StatusCode, body: &str) -> Result<Value> {
    let payload = match serde_json::from_str::<Value>(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(%status, error = %e, "Unreadable MailerLite response body");
            Value::Null
        }
    };

    if !status.is_success() {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| status.to_string(), ToString::to_string);
        return Err(PaymentError::MailingList(message));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_error_carries_message() {
        let err = read_reply(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"The email must be a valid email address."}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Mailing list error: The email must be a valid email address."
        );

        let err = read_reply(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert_eq!(err.to_string(), "Mailing list error: 502 Bad Gateway");
    }

    #[test]
    fn test_reply_success_tolerates_unreadable_body() {
        assert_eq!(read_reply(StatusCode::OK, "").unwrap(), Value::Null);
        let payload = read_reply(StatusCode::CREATED, r#"{"data":{"id":"1"}}"#).unwrap();
        assert_eq!(payload["data"]["id"], "1");
    }

    #[test]
    fn test_group_ids() {
        let config = MailerLiteConfig {
            api_url: DEFAULT_API_URL.into(),
            api_key: "key".into(),
            business_group_id: "111".into(),
            customer_group_id: "222".into(),
            timeout_secs: 30,
        };
        assert_eq!(config.group_id(MailingGroup::Business), "111");
        assert_eq!(config.group_id(MailingGroup::Customer), "222");
    }

    #[test]
    fn test_body_shape() {
        let subscriber = Subscriber::new("a@b.com", MailingGroup::Business).with_name(Some("Acme"));
        let body = SubscriberBody {
            email: &subscriber.email,
            fields: &subscriber.fields,
            groups: ["111"],
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({
                "email": "a@b.com",
                "fields": {"role": "business", "name": "Acme"},
                "groups": ["111"],
            })
        );
    }
}
