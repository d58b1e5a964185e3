//! Mock Gateway
//!
//! Scriptable in-process gateway for development and tests. Counts every call
//! so tests can assert that a code path never reached the gateway.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{GatewayStatus, InitiateRequest, Initiation, PaymentGateway, StatusUpdate};
use crate::error::{PaymentError, Result};

/// Mock gateway with scripted poll results
pub struct MockGateway {
    checkout_base: String,
    fail_initiate: bool,
    /// Poll outcomes consumed in order; the last one repeats
    polls: Mutex<VecDeque<Result<GatewayStatus>>>,
    initiated: Mutex<Vec<InitiateRequest>>,
    initiate_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Initiation succeeds; polls report `Paid`
    pub fn new() -> Self {
        Self {
            checkout_base: "https://pay.example".into(),
            fail_initiate: false,
            polls: Mutex::new(VecDeque::from([Ok(GatewayStatus::Paid)])),
            initiated: Mutex::new(Vec::new()),
            initiate_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
        }
    }

    /// Every initiation is rejected
    pub fn rejecting() -> Self {
        Self {
            fail_initiate: true,
            ..Self::new()
        }
    }

    /// Queue poll outcomes, replacing the current script
    pub async fn script_polls(&self, outcomes: impl IntoIterator<Item = Result<GatewayStatus>>) {
        let mut polls = self.polls.lock().await;
        *polls = outcomes.into_iter().collect();
    }

    pub fn checkout_url(&self, reference: &str) -> String {
        format!("{}/checkout/{reference}", self.checkout_base)
    }

    pub fn poll_url(&self, reference: &str) -> String {
        format!("{}/poll/{reference}", self.checkout_base)
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub async fn initiated(&self) -> Vec<InitiateRequest> {
        self.initiated.lock().await.clone()
    }
}

fn replay(outcome: &Result<GatewayStatus>) -> Result<GatewayStatus> {
    match outcome {
        Ok(status) => Ok(status.clone()),
        Err(e) => Err(PaymentError::Gateway(e.to_string())),
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initiate {
            return Err(PaymentError::Gateway("initiation rejected".into()));
        }
        self.initiated.lock().await.push(request.clone());

        Ok(Initiation {
            redirect_url: self.checkout_url(&request.reference),
            poll_url: self.poll_url(&request.reference),
            instructions: None,
        })
    }

    async fn poll(&self, poll_url: &str) -> Result<StatusUpdate> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);

        let status = {
            let mut polls = self.polls.lock().await;
            let outcome = if polls.len() > 1 {
                polls.pop_front()
            } else {
                polls.front().map(replay)
            };
            outcome.unwrap_or(Ok(GatewayStatus::Created))?
        };

        Ok(StatusUpdate {
            reference: None,
            paynow_reference: Some("MOCK-1".into()),
            amount: None,
            status,
            poll_url: Some(poll_url.to_string()),
        })
    }

    fn verify_hash(&self, fields: &[(String, String)]) -> bool {
        fields
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("hash") && v == "MOCK")
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_polls_repeat_last() {
        let gateway = MockGateway::new();
        gateway
            .script_polls([Ok(GatewayStatus::Sent), Ok(GatewayStatus::Paid)])
            .await;

        assert_eq!(gateway.poll("p").await.unwrap().status, GatewayStatus::Sent);
        assert_eq!(gateway.poll("p").await.unwrap().status, GatewayStatus::Paid);
        assert_eq!(gateway.poll("p").await.unwrap().status, GatewayStatus::Paid);
        assert_eq!(gateway.poll_calls(), 3);
    }

    #[tokio::test]
    async fn test_rejecting_gateway() {
        let gateway = MockGateway::rejecting();
        let request = InitiateRequest {
            reference: "HC-1".into(),
            email: "a@b.com".into(),
            description: "Essential".into(),
            amount: rust_decimal::Decimal::ONE,
            return_url: String::new(),
            result_url: String::new(),
        };
        assert!(gateway.initiate(&request).await.is_err());
        assert_eq!(gateway.initiate_calls(), 1);
    }
}
