//! Persistent Records
//!
//! Rows owned by the store. Handlers never cache these between calls; every
//! request rebuilds its context from the transaction reference.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every registration reference
pub const REFERENCE_PREFIX: &str = "HC";

/// Account role chosen at registration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Business,
    Customer,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Customer => "customer",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the two roles
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "business" => Some(Self::Business),
            "customer" => Some(Self::Customer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Null or missing role columns read as the default role
fn role_or_default<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Role>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Transaction lifecycle: `pending -> unpaid <-> unpaid`, `pending|unpaid -> paid`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Paid,
    Unpaid,
}

impl TransactionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "unpaid" => Some(Self::Unpaid),
            _ => None,
        }
    }
}

/// Unknown or null status columns read as pending, so verification asks the
/// gateway instead of failing on the row.
fn status_or_pending<'de, D>(deserializer: D) -> Result<TransactionStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(TransactionStatus::parse)
        .unwrap_or_default())
}

/// Null timestamps read as the epoch
fn timestamp_or_epoch<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Correlation id handed to the caller at registration
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// `HC-<epoch millis>`, strictly increasing within the process.
    ///
    /// Registrations landing in the same millisecond take the next free one.
    pub fn generate() -> Self {
        Self(format!("{REFERENCE_PREFIX}-{}", next_reference_millis(Utc::now())))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

static LAST_REFERENCE_MILLIS: AtomicI64 = AtomicI64::new(0);

fn next_reference_millis(now: DateTime<Utc>) -> i64 {
    let now = now.timestamp_millis();
    let previous = match LAST_REFERENCE_MILLIS.fetch_update(
        Ordering::SeqCst,
        Ordering::SeqCst,
        |last| Some(now.max(last + 1)),
    ) {
        Ok(last) | Err(last) => last,
    };
    now.max(previous + 1)
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A checkout opened by the registration handler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub reference: Reference,
    pub email: String,
    pub name: String,
    /// Display name of the plan
    pub plan: String,
    pub plan_id: String,
    #[serde(default, deserialize_with = "role_or_default")]
    pub role: Role,
    pub amount: Decimal,
    /// Required to verify later; a row without one can never settle
    pub poll_url: Option<String>,
    #[serde(default, deserialize_with = "status_or_pending")]
    pub status: TransactionStatus,
    #[serde(default, deserialize_with = "timestamp_or_epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_paid(&self) -> bool {
        self.status == TransactionStatus::Paid
    }
}

/// Partial update applied after a gateway poll
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransactionUpdate {
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl TransactionUpdate {
    pub const fn unpaid(polled_at: DateTime<Utc>) -> Self {
        Self {
            status: TransactionStatus::Unpaid,
            paid_at: None,
            last_polled_at: Some(polled_at),
        }
    }

    pub const fn paid(at: DateTime<Utc>) -> Self {
        Self {
            status: TransactionStatus::Paid,
            paid_at: Some(at),
            last_polled_at: Some(at),
        }
    }
}

/// Payment row used by the process-payment / webhook path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    pub email: String,
    pub description: Option<String>,
    /// Raw gateway status text
    pub status: String,
    pub paynow_reference: Option<String>,
    pub poll_url: Option<String>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub business_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Which subscription this payment activates, if the row is well formed
    pub fn subscription_owner(&self) -> Option<SubscriptionOwner> {
        match (&self.user_id, &self.business_id) {
            (Some(user), None) => Some(SubscriptionOwner::User(user.clone())),
            (None, Some(business)) => Some(SubscriptionOwner::Business(business.clone())),
            _ => None,
        }
    }
}

/// Status reconciliation written by the webhook
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PaymentUpdate {
    pub status: String,
    pub paynow_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_url: Option<String>,
    pub is_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Exactly one of user or business owns a subscription payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionOwner {
    User(String),
    Business(String),
}

impl SubscriptionOwner {
    /// Store table holding this owner
    pub const fn table(&self) -> &'static str {
        match self {
            Self::User(_) => "users",
            Self::Business(_) => "businesses",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Business(id) => id,
        }
    }
}

/// Subscription fields set on activation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubscriptionActivation {
    pub subscription_status: String,
    pub subscription_plan: String,
    pub subscription_started_at: DateTime<Utc>,
    pub subscription_expires_at: DateTime<Utc>,
    pub last_payment_reference: String,
}

/// Length of one paid subscription period
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

/// Plan label used when the payment carried no description
pub const DEFAULT_SUBSCRIPTION_PLAN: &str = "standard";

impl SubscriptionActivation {
    pub fn for_payment(payment: &Payment, now: DateTime<Utc>) -> Self {
        Self {
            subscription_status: "active".into(),
            subscription_plan: payment
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUBSCRIPTION_PLAN.into()),
            subscription_started_at: now,
            subscription_expires_at: now + Duration::days(SUBSCRIPTION_PERIOD_DAYS),
            last_payment_reference: payment.reference.clone(),
        }
    }
}

/// Account row upserted on confirmed payment, keyed by email
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub name: String,
    pub plan: String,
    pub plan_id: String,
    pub role: Role,
}

/// Passwordless login invite
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Invite {
    pub email: String,
    pub full_name: String,
    pub plan_id: String,
    pub role: Role,
    pub redirect_to: String,
}

/// Business/partner interest captured from the landing page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub email: String,
    pub name: Option<String>,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Customer interest captured from the landing page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub email: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment(user_id: Option<&str>, business_id: Option<&str>) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            reference: "INV-1".into(),
            amount: dec!(10),
            email: "a@b.com".into(),
            description: None,
            status: "pending".into(),
            paynow_reference: None,
            poll_url: None,
            is_paid: false,
            paid_at: None,
            user_id: user_id.map(Into::into),
            business_id: business_id.map(Into::into),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_reference_format() {
        let reference = Reference::generate();
        let (prefix, digits) = reference.as_str().split_once('-').unwrap();
        assert_eq!(prefix, "HC");
        assert!(!digits.is_empty());
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_references_unique_within_one_millisecond() {
        let now = Utc::now();
        let first = next_reference_millis(now);
        let second = next_reference_millis(now);
        assert!(second > first);

        let references: std::collections::HashSet<String> = (0..500)
            .map(|_| Reference::generate().as_str().to_string())
            .collect();
        assert_eq!(references.len(), 500);
    }

    #[test]
    fn test_transaction_row_tolerates_null_and_unknown_columns() {
        let row = serde_json::json!({
            "reference": "HC-1",
            "email": "a@b.com",
            "name": "Acme",
            "plan": "Essential",
            "plan_id": "essential",
            "role": null,
            "amount": "19.99",
            "poll_url": "https://pay/poll/x",
            "status": "PROCESSING",
            "created_at": null,
        });
        let transaction: Transaction = serde_json::from_value(row).unwrap();

        assert_eq!(transaction.status, TransactionStatus::Pending);
        assert_eq!(transaction.role, Role::Business);
        assert_eq!(transaction.created_at, DateTime::<Utc>::default());
        assert!(transaction.paid_at.is_none());

        let paid: Transaction = serde_json::from_value(serde_json::json!({
            "reference": "HC-2",
            "email": "a@b.com",
            "name": "Acme",
            "plan": "Essential",
            "plan_id": "essential",
            "amount": 19.99,
            "poll_url": null,
            "status": "Paid",
            "created_at": "2026-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(paid.is_paid());
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("Customer"), Some(Role::Customer));
        assert_eq!(Role::parse("BUSINESS"), Some(Role::Business));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::default(), Role::Business);
    }

    #[test]
    fn test_subscription_owner_is_exclusive() {
        assert_eq!(
            payment(Some("u1"), None).subscription_owner(),
            Some(SubscriptionOwner::User("u1".into()))
        );
        assert_eq!(
            payment(None, Some("b1")).subscription_owner(),
            Some(SubscriptionOwner::Business("b1".into()))
        );
        assert_eq!(payment(Some("u1"), Some("b1")).subscription_owner(), None);
        assert_eq!(payment(None, None).subscription_owner(), None);
    }

    #[test]
    fn test_activation_defaults_plan() {
        let now = Utc::now();
        let activation = SubscriptionActivation::for_payment(&payment(Some("u1"), None), now);
        assert_eq!(activation.subscription_plan, DEFAULT_SUBSCRIPTION_PLAN);
        assert_eq!(activation.subscription_status, "active");
        assert_eq!(
            activation.subscription_expires_at - activation.subscription_started_at,
            Duration::days(SUBSCRIPTION_PERIOD_DAYS)
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TransactionStatus::Unpaid).unwrap(),
            serde_json::json!("unpaid")
        );
    }
}
