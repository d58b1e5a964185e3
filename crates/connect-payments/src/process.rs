//! Process Payment
//!
//! Opens a gateway transaction for an existing invoice reference and records
//! the payment row the status callback later reconciles.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::SiteUrls;
use crate::error::{PaymentError, Result};
use crate::gateway::{InitiateRequest, PaymentGateway};
use crate::model::Payment;
use crate::request::{PaymentOrder, ProcessPaymentResponse};
use crate::store::Store;

/// Checkout line used when the order carries no description
pub const DEFAULT_DESCRIPTION: &str = "Helensvale Connect subscription";

pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn Store>,
    urls: SiteUrls,
}

impl PaymentService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn Store>, urls: SiteUrls) -> Self {
        Self {
            gateway,
            store,
            urls,
        }
    }

    pub async fn process(&self, order: PaymentOrder) -> Result<ProcessPaymentResponse> {
        let request = InitiateRequest {
            reference: order.reference.clone(),
            email: order.email.clone(),
            description: order
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.into()),
            amount: order.amount,
            return_url: self.urls.invoice_return_url(&order.reference),
            result_url: self.urls.result_url(),
        };

        let initiation = self.gateway.initiate(&request).await.map_err(|e| {
            tracing::error!(reference = %order.reference, error = %e, "Payment initiation failed");
            match e {
                PaymentError::Gateway(_) => e,
                other => PaymentError::Gateway(other.to_string()),
            }
        })?;

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            reference: order.reference,
            amount: order.amount,
            email: order.email,
            description: order.description,
            status: "pending".into(),
            paynow_reference: None,
            poll_url: Some(initiation.poll_url.clone()),
            is_paid: false,
            paid_at: None,
            user_id: order.user_id,
            business_id: order.business_id,
            created_at: now,
            updated_at: now,
        };

        // The callback can only reconcile payments it can find.
        self.store.insert_payment(&payment).await.map_err(|e| {
            tracing::error!(reference = %payment.reference, error = %e, "Failed to record payment");
            match e {
                PaymentError::Persistence(_) => e,
                other => PaymentError::Persistence(other.to_string()),
            }
        })?;

        tracing::info!(reference = %payment.reference, amount = %payment.amount, "Payment initiated");

        Ok(ProcessPaymentResponse {
            success: true,
            poll_url: initiation.poll_url,
            instructions: initiation.instructions,
            redirect_url: initiation.redirect_url,
        })
    }
}
