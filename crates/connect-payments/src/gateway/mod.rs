//! Payment Gateway Integration
//!
//! Opens hosted checkouts and reports settlement, either by polling or via the
//! gateway's asynchronous status updates.

mod mock;
mod paynow;

pub use mock::MockGateway;
pub use paynow::{PaynowClient, PaynowConfig, paynow_hash};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;

/// Payment gateway client (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a transaction and obtain the hosted checkout URL
    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation>;

    /// Query settlement status through a poll URL handed out by `initiate`
    async fn poll(&self, poll_url: &str) -> Result<StatusUpdate>;

    /// Check the integrity hash of an inbound status update
    fn verify_hash(&self, fields: &[(String, String)]) -> bool;

    /// Gateway name
    fn name(&self) -> &str;
}

/// A transaction to open with the gateway
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitiateRequest {
    pub reference: String,
    pub email: String,
    /// Line shown on the hosted checkout page
    pub description: String,
    pub amount: Decimal,
    pub return_url: String,
    pub result_url: String,
}

/// Gateway answer to a successful initiation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Initiation {
    pub redirect_url: String,
    pub poll_url: String,
    pub instructions: Option<String>,
}

/// Settlement status reported by a poll or webhook
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayStatus {
    Created,
    Sent,
    Paid,
    AwaitingDelivery,
    Delivered,
    Cancelled,
    Failed,
    Disputed,
    Refunded,
    Other(String),
}

impl GatewayStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "created" => Self::Created,
            "sent" => Self::Sent,
            "paid" => Self::Paid,
            "awaiting delivery" => Self::AwaitingDelivery,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            "failed" => Self::Failed,
            "disputed" => Self::Disputed,
            "refunded" => Self::Refunded,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    /// Funds captured
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid | Self::AwaitingDelivery)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::AwaitingDelivery => "awaiting delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Disputed => "disputed",
            Self::Refunded => "refunded",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of polling a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub reference: Option<String>,
    pub paynow_reference: Option<String>,
    pub amount: Option<Decimal>,
    pub status: GatewayStatus,
    pub poll_url: Option<String>,
}

impl StatusUpdate {
    pub const fn is_paid(&self) -> bool {
        self.status.is_paid()
    }
}
