//! Registration
//!
//! Opens a hosted checkout for a validated purchase intent and records the
//! pending transaction.

use std::sync::Arc;

use chrono::Utc;

use crate::config::SiteUrls;
use crate::error::{PaymentError, Result};
use crate::gateway::{InitiateRequest, PaymentGateway};
use crate::model::{Reference, Transaction, TransactionStatus};
use crate::request::{RegisterResponse, Registration};
use crate::store::Store;

pub struct RegistrationService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn Store>,
    urls: SiteUrls,
}

impl RegistrationService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn Store>, urls: SiteUrls) -> Self {
        Self {
            gateway,
            store,
            urls,
        }
    }

    /// Start a checkout and return the gateway-hosted payment page.
    ///
    /// The pending row is written after the gateway accepted the payment, so
    /// a failed write is logged and the caller is still sent to checkout.
    pub async fn register(&self, registration: Registration) -> Result<RegisterResponse> {
        let reference = Reference::generate();

        let request = InitiateRequest {
            reference: reference.to_string(),
            email: registration.email.clone(),
            description: registration.plan.clone(),
            amount: registration.amount,
            return_url: self.urls.return_url(&reference),
            result_url: self.urls.result_url(),
        };

        let initiation = self.gateway.initiate(&request).await.map_err(|e| {
            tracing::error!(%reference, error = %e, "Gateway rejected initiation");
            match e {
                PaymentError::Gateway(_) => e,
                other => PaymentError::Gateway(other.to_string()),
            }
        })?;

        if initiation.redirect_url.trim().is_empty() {
            return Err(PaymentError::Gateway("no checkout URL returned".into()));
        }

        let transaction = Transaction {
            reference: reference.clone(),
            email: registration.email,
            name: registration.name,
            plan: registration.plan,
            plan_id: registration.plan_id,
            role: registration.role,
            amount: registration.amount,
            poll_url: Some(initiation.poll_url),
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            paid_at: None,
            last_polled_at: None,
        };

        match self.store.insert_transaction(&transaction).await {
            Ok(()) => tracing::info!(
                %reference,
                email = %transaction.email,
                plan_id = %transaction.plan_id,
                "Registered pending transaction"
            ),
            Err(e) => tracing::error!(
                %reference,
                error = %e,
                "Failed to persist pending transaction; continuing to checkout"
            ),
        }

        Ok(RegisterResponse {
            authorization_url: initiation.redirect_url,
        })
    }
}
