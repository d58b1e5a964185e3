//! Paynow Gateway Client
//!
//! Paynow speaks form-encoded requests and responses. Every message carries a
//! `hash` field: the uppercase hex SHA-512 of all other values, in message
//! order, followed by the integration key.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha512};

use super::{GatewayStatus, InitiateRequest, Initiation, PaymentGateway, StatusUpdate};
use crate::error::{PaymentError, Result};

/// Default transaction initiation endpoint
pub const DEFAULT_INITIATE_URL: &str = "https://www.paynow.co.zw/interface/initiatetransaction";

/// Paynow client configuration
#[derive(Clone, Debug)]
pub struct PaynowConfig {
    pub integration_id: String,
    pub integration_key: String,
    pub initiate_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl PaynowConfig {
    pub fn new(integration_id: impl Into<String>, integration_key: impl Into<String>) -> Self {
        Self {
            integration_id: integration_id.into(),
            integration_key: integration_key.into(),
            initiate_url: DEFAULT_INITIATE_URL.into(),
            timeout_secs: 30,
        }
    }

    pub fn from_env() -> Result<Self> {
        let integration_id = std::env::var("PAYNOW_INTEGRATION_ID")
            .map_err(|_| PaymentError::Config("PAYNOW_INTEGRATION_ID not set".into()))?;
        let integration_key = std::env::var("PAYNOW_INTEGRATION_KEY")
            .map_err(|_| PaymentError::Config("PAYNOW_INTEGRATION_KEY not set".into()))?;

        let mut config = Self::new(integration_id, integration_key);
        if let Ok(url) = std::env::var("PAYNOW_INITIATE_URL") {
            config.initiate_url = url;
        }
        Ok(config)
    }
}

/// Uppercase hex SHA-512 over `values` followed by `integration_key`
pub fn paynow_hash<'a>(values: impl IntoIterator<Item = &'a str>, integration_key: &str) -> String {
    let mut hasher = Sha512::new();
    for value in values {
        hasher.update(value.as_bytes());
    }
    hasher.update(integration_key.as_bytes());
    hex::encode_upper(hasher.finalize())
}

fn field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn parse_form(body: &str) -> Result<Vec<(String, String)>> {
    serde_urlencoded::from_str(body)
        .map_err(|e| PaymentError::Gateway(format!("unreadable gateway response: {e}")))
}

/// Paynow HTTP client
pub struct PaynowClient {
    http: reqwest::Client,
    config: PaynowConfig,
}

impl PaynowClient {
    pub fn new(config: PaynowConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(PaynowConfig::from_env()?)
    }

    /// Ordered, hashed initiation form
    fn initiate_form(&self, request: &InitiateRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("id", self.config.integration_id.clone()),
            ("reference", request.reference.clone()),
            ("amount", format!("{:.2}", request.amount)),
            ("additionalinfo", request.description.clone()),
            ("returnurl", request.return_url.clone()),
            ("resulturl", request.result_url.clone()),
            ("authemail", request.email.clone()),
            ("status", "Message".to_string()),
        ];
        let hash = paynow_hash(
            form.iter().map(|(_, v)| v.as_str()),
            &self.config.integration_key,
        );
        form.push(("hash", hash));
        form
    }

    /// Rejects `status=Error` replies and replies whose hash does not match
    fn check_reply(&self, fields: &[(String, String)]) -> Result<()> {
        let status = field(fields, "status").unwrap_or_default();
        if status.eq_ignore_ascii_case("error") {
            let reason = field(fields, "error").unwrap_or("unknown error");
            return Err(PaymentError::Gateway(reason.to_string()));
        }
        if !self.verify_hash(fields) {
            return Err(PaymentError::Gateway("response hash mismatch".into()));
        }
        Ok(())
    }

    async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<Vec<(String, String)>> {
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?
            .error_for_status()
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        parse_form(&body)
    }
}

#[async_trait]
impl PaymentGateway for PaynowClient {
    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation> {
        tracing::debug!(reference = %request.reference, amount = %request.amount, "Initiating Paynow transaction");

        let form = self.initiate_form(request);
        let fields = self.post_form(&self.config.initiate_url, &form).await?;
        self.check_reply(&fields)?;

        let redirect_url = field(&fields, "browserurl")
            .ok_or_else(|| PaymentError::Gateway("no browserurl in response".into()))?;
        let poll_url = field(&fields, "pollurl")
            .ok_or_else(|| PaymentError::Gateway("no pollurl in response".into()))?;

        Ok(Initiation {
            redirect_url: redirect_url.to_string(),
            poll_url: poll_url.to_string(),
            instructions: field(&fields, "instructions").map(ToString::to_string),
        })
    }

    async fn poll(&self, poll_url: &str) -> Result<StatusUpdate> {
        tracing::debug!(poll_url, "Polling Paynow transaction");

        let fields = self.post_form(poll_url, &[] as &[(&str, &str)]).await?;
        self.check_reply(&fields)?;

        let status = field(&fields, "status")
            .ok_or_else(|| PaymentError::Gateway("no status in poll response".into()))?;

        Ok(StatusUpdate {
            reference: field(&fields, "reference").map(ToString::to_string),
            paynow_reference: field(&fields, "paynowreference").map(ToString::to_string),
            amount: field(&fields, "amount").and_then(|a| a.parse().ok()),
            status: GatewayStatus::parse(status),
            poll_url: field(&fields, "pollurl").map(ToString::to_string),
        })
    }

    fn verify_hash(&self, fields: &[(String, String)]) -> bool {
        let Some(received) = field(fields, "hash") else {
            return false;
        };
        let expected = paynow_hash(
            fields
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("hash"))
                .map(|(_, v)| v.as_str()),
            &self.config.integration_key,
        );
        expected.eq_ignore_ascii_case(received)
    }

    fn name(&self) -> &str {
        "Paynow"
    }
}
