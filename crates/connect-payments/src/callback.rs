//! Gateway Status Callback
//!
//! Reconciles asynchronous gateway status updates onto payment rows. Once the
//! primary update lands the gateway always gets a success answer, so local
//! activation trouble never provokes webhook redelivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{PaymentError, Result};
use crate::gateway::{GatewayStatus, PaymentGateway};
use crate::model::{Payment, PaymentUpdate, SubscriptionActivation};
use crate::request::{CallbackNotice, CallbackResponse};
use crate::store::Store;

pub struct CallbackService {
    store: Arc<dyn Store>,
    /// Used to check message hashes when the gateway is configured
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl CallbackService {
    pub fn new(store: Arc<dyn Store>, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        Self { store, gateway }
    }

    pub async fn handle(&self, notice: CallbackNotice) -> Result<CallbackResponse> {
        if let Some(gateway) = &self.gateway {
            if !notice.has_hash() {
                tracing::warn!(reference = %notice.reference, "Unsigned status update");
                return Err(PaymentError::invalid("hash is required"));
            }
            if !gateway.verify_hash(&notice.fields) {
                tracing::warn!(reference = %notice.reference, "Status update hash mismatch");
                return Err(PaymentError::invalid("hash does not match"));
            }
        }

        let status = GatewayStatus::parse(&notice.status);
        let now = Utc::now();
        let is_paid = status.is_paid();

        let update = PaymentUpdate {
            status: notice.status.clone(),
            paynow_reference: notice.paynow_reference.clone(),
            poll_url: notice.poll_url.clone(),
            is_paid,
            paid_at: is_paid.then_some(now),
            updated_at: now,
        };

        let payment = self
            .store
            .update_payment(&notice.reference, &update)
            .await
            .map_err(|e| match e {
                PaymentError::Persistence(_) => e,
                other => PaymentError::Persistence(other.to_string()),
            })?;

        tracing::info!(
            reference = %notice.reference,
            status = %status,
            paid = is_paid,
            "Reconciled payment status"
        );

        if !is_paid {
            return Ok(CallbackResponse { success: true });
        }

        if payment.amount == notice.amount {
            self.activate(&payment, now).await;
        } else {
            tracing::warn!(
                reference = %notice.reference,
                expected = %payment.amount,
                reported = %notice.amount,
                "Gateway reported a different amount; subscription not activated"
            );
        }

        Ok(CallbackResponse { success: true })
    }

    async fn activate(&self, payment: &Payment, now: DateTime<Utc>) {
        let Some(owner) = payment.subscription_owner() else {
            tracing::warn!(
                reference = %payment.reference,
                "Payment does not reference exactly one user or business; nothing to activate"
            );
            return;
        };

        let activation = SubscriptionActivation::for_payment(payment, now);
        match self.store.activate_subscription(&owner, &activation).await {
            Ok(()) => tracing::info!(
                reference = %payment.reference,
                table = owner.table(),
                id = owner.id(),
                plan = %activation.subscription_plan,
                "Activated subscription"
            ),
            Err(e) => tracing::error!(
                reference = %payment.reference,
                error = %e,
                "Failed to activate subscription"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::model::SubscriptionOwner;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn payment(reference: &str, user_id: Option<&str>, business_id: Option<&str>) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            reference: reference.into(),
            amount: dec!(10.00),
            email: "a@b.com".into(),
            description: Some("Premium".into()),
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

    fn notice(reference: &str, status: &str) -> CallbackNotice {
        CallbackNotice::from_form(&format!(
            "reference={reference}&paynowreference=555&amount=10.00&status={status}&pollurl=https%3A%2F%2Fpay%2Fpoll"
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_paid_activates_user_only() {
        let store = Arc::new(MemoryStore::new());
        store.insert_payment(&payment("INV-1", Some("u1"), None)).await.unwrap();
        let service = CallbackService::new(store.clone(), None);

        let response = service.handle(notice("INV-1", "Paid")).await.unwrap();
        assert!(response.success);

        let stored = store.payment("INV-1").await.unwrap();
        assert!(stored.is_paid);
        assert!(stored.paid_at.is_some());
        assert_eq!(stored.paynow_reference.as_deref(), Some("555"));

        let activations = store.activations().await;
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].0, SubscriptionOwner::User("u1".into()));
        assert_eq!(activations[0].1.subscription_plan, "Premium");
    }

    #[tokio::test]
    async fn test_awaiting_delivery_activates_business() {
        let store = Arc::new(MemoryStore::new());
        store.insert_payment(&payment("INV-2", None, Some("b1"))).await.unwrap();
        let service = CallbackService::new(store.clone(), None);

        service
            .handle(notice("INV-2", "Awaiting+Delivery"))
            .await
            .unwrap();

        let activations = store.activations().await;
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].0, SubscriptionOwner::Business("b1".into()));
    }

    #[tokio::test]
    async fn test_unpaid_status_activates_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.insert_payment(&payment("INV-3", Some("u1"), None)).await.unwrap();
        let service = CallbackService::new(store.clone(), None);

        service.handle(notice("INV-3", "Cancelled")).await.unwrap();

        let stored = store.payment("INV-3").await.unwrap();
        assert!(!stored.is_paid);
        assert_eq!(stored.status, "Cancelled");
        assert!(store.activations().await.is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_owner_activates_nothing() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_payment(&payment("INV-4", Some("u1"), Some("b1")))
            .await
            .unwrap();
        let service = CallbackService::new(store.clone(), None);

        let response = service.handle(notice("INV-4", "Paid")).await.unwrap();
        assert!(response.success);
        assert!(store.activations().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_payment_is_persistence_error() {
        let service = CallbackService::new(Arc::new(MemoryStore::new()), None);
        let err = service.handle(notice("INV-404", "Paid")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Persistence(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_amount_mismatch_records_status_without_activation() {
        let store = Arc::new(MemoryStore::new());
        store.insert_payment(&payment("INV-6", Some("u1"), None)).await.unwrap();
        let service = CallbackService::new(store.clone(), None);

        let underpaid = CallbackNotice::from_form(
            "reference=INV-6&paynowreference=1&amount=0.01&status=Paid",
        )
        .unwrap();
        let response = service.handle(underpaid).await.unwrap();

        assert!(response.success);
        let stored = store.payment("INV-6").await.unwrap();
        assert!(stored.is_paid);
        assert_eq!(stored.status, "Paid");
        assert!(store.activations().await.is_empty());
    }

    #[tokio::test]
    async fn test_activation_failure_still_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        store.insert_payment(&payment("INV-7", None, Some("b1"))).await.unwrap();
        store.set_fail_activations(true);
        let service = CallbackService::new(store.clone(), None);

        let response = service.handle(notice("INV-7", "Paid")).await.unwrap();

        assert!(response.success);
        assert!(store.payment("INV-7").await.unwrap().is_paid);
        assert!(store.activations().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsigned_update_rejected_when_gateway_configured() {
        let store = Arc::new(MemoryStore::new());
        store.insert_payment(&payment("INV-8", Some("u1"), None)).await.unwrap();
        let gateway: Arc<dyn PaymentGateway> = Arc::new(MockGateway::new());
        let service = CallbackService::new(store.clone(), Some(gateway));

        let err = service.handle(notice("INV-8", "Paid")).await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "hash is required");
        let stored = store.payment("INV-8").await.unwrap();
        assert!(!stored.is_paid);
        assert_eq!(stored.status, "pending");
        assert!(store.activations().await.is_empty());
    }

    #[tokio::test]
    async fn test_hash_checked_when_gateway_configured() {
        let store = Arc::new(MemoryStore::new());
        store.insert_payment(&payment("INV-5", Some("u1"), None)).await.unwrap();
        let gateway: Arc<dyn PaymentGateway> = Arc::new(MockGateway::new());
        let service = CallbackService::new(store.clone(), Some(gateway));

        let forged = CallbackNotice::from_form(
            "reference=INV-5&paynowreference=1&amount=10.00&status=Paid&hash=FORGED",
        )
        .unwrap();
        let err = service.handle(forged).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(!store.payment("INV-5").await.unwrap().is_paid);

        let genuine = CallbackNotice::from_form(
            "reference=INV-5&paynowreference=1&amount=10.00&status=Paid&hash=MOCK",
        )
        .unwrap();
        assert!(service.handle(genuine).await.unwrap().success);
    }
}
