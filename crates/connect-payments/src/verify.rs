//! Verification
//!
//! The gateway poll is the single authority on whether a customer paid. Once
//! it says yes, the bookkeeping, mailing-list and invite steps run
//! independently and none of them can turn the answer back into a failure.

use std::sync::Arc;

use chrono::Utc;

use crate::config::SiteUrls;
use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;
use crate::mailing::{MailingList, Subscriber};
use crate::model::{Account, Invite, Reference, Transaction, TransactionUpdate};
use crate::request::{VerifyCustomer, VerifyMetadata, VerifyResponse};
use crate::store::Store;

pub const VERIFIED_MESSAGE: &str = "Payment verified successfully";

pub struct VerificationService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn Store>,
    mailing: Arc<dyn MailingList>,
    urls: SiteUrls,
}

impl VerificationService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn Store>,
        mailing: Arc<dyn MailingList>,
        urls: SiteUrls,
    ) -> Self {
        Self {
            gateway,
            store,
            mailing,
            urls,
        }
    }

    pub async fn verify(&self, reference: &Reference) -> Result<VerifyResponse> {
        let transaction = self
            .store
            .find_transaction(reference)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Transaction".into()))?;

        if transaction.is_paid() {
            tracing::info!(%reference, "Transaction already paid");
            return Ok(success(&transaction));
        }

        let poll_url = transaction
            .poll_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                PaymentError::Config(format!("transaction {reference} has no poll URL"))
            })?;

        let update = match self.gateway.poll(poll_url).await {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(%reference, error = %e, "Gateway poll failed");
                self.record_unpaid(reference).await;
                return Err(match e {
                    PaymentError::Gateway(_) => e,
                    other => PaymentError::Gateway(other.to_string()),
                });
            }
        };

        if !update.is_paid() {
            tracing::info!(%reference, status = %update.status, "Payment not settled");
            self.record_unpaid(reference).await;
            return Err(PaymentError::PaymentIncomplete);
        }

        tracing::info!(%reference, email = %transaction.email, "Payment confirmed");
        self.activate(&transaction).await;

        Ok(success(&transaction))
    }

    async fn record_unpaid(&self, reference: &Reference) {
        let update = TransactionUpdate::unpaid(Utc::now());
        if let Err(e) = self.store.update_transaction(reference, &update).await {
            tracing::error!(%reference, error = %e, "Failed to record unpaid poll");
        }
    }

    /// Best-effort fan-out after a confirmed payment
    async fn activate(&self, transaction: &Transaction) {
        let reference = &transaction.reference;

        let update = TransactionUpdate::paid(Utc::now());
        if let Err(e) = self.store.update_transaction(reference, &update).await {
            tracing::error!(%reference, error = %e, "Failed to mark transaction paid");
        }

        let account = Account {
            email: transaction.email.clone(),
            name: transaction.name.clone(),
            plan: transaction.plan.clone(),
            plan_id: transaction.plan_id.clone(),
            role: transaction.role,
        };
        if let Err(e) = self.store.upsert_account(&account).await {
            tracing::error!(%reference, error = %e, "Failed to upsert account");
        }

        let subscriber = Subscriber::new(&transaction.email, transaction.role.into())
            .with_name(Some(&transaction.name));
        if let Err(e) = self.mailing.subscribe(&subscriber).await {
            tracing::warn!(%reference, error = %e, "Failed to subscribe to mailing list");
        }

        let invite = Invite {
            email: transaction.email.clone(),
            full_name: transaction.name.clone(),
            plan_id: transaction.plan_id.clone(),
            role: transaction.role,
            redirect_to: self.urls.dashboard_url(transaction.role),
        };
        if let Err(e) = self.store.invite_user(&invite).await {
            tracing::warn!(%reference, error = %e, "Failed to send login invite");
        }
    }
}

fn success(transaction: &Transaction) -> VerifyResponse {
    VerifyResponse {
        message: VERIFIED_MESSAGE.into(),
        plan_id: transaction.plan_id.clone(),
        metadata: VerifyMetadata {
            full_name: transaction.name.clone(),
            role: transaction.role,
        },
        customer: VerifyCustomer {
            email: transaction.email.clone(),
        },
    }
}
