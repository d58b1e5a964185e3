//! In-memory store (for development and tests)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Store;
use crate::error::{PaymentError, Result};
use crate::model::{
    Account, Invite, Lead, Partner, Payment, PaymentUpdate, Reference, SubscriptionActivation,
    SubscriptionOwner, Transaction, TransactionUpdate,
};

#[derive(Default)]
pub struct MemoryStore {
    transactions: RwLock<HashMap<Reference, Transaction>>,
    payments: RwLock<HashMap<String, Payment>>,
    accounts: RwLock<HashMap<String, Account>>,
    invites: RwLock<Vec<Invite>>,
    activations: RwLock<Vec<(SubscriptionOwner, SubscriptionActivation)>>,
    partners: RwLock<HashMap<String, Partner>>,
    leads: RwLock<Vec<Lead>>,
    fail_writes: AtomicBool,
    fail_activations: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail; reads keep working
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make only subscription activation fail
    pub fn set_fail_activations(&self, fail: bool) {
        self.fail_activations.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PaymentError::Persistence("store unavailable".into()));
        }
        Ok(())
    }

    pub async fn transaction(&self, reference: &str) -> Option<Transaction> {
        self.transactions
            .read()
            .await
            .get(&Reference::from_string(reference))
            .cloned()
    }

    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn payment(&self, reference: &str) -> Option<Payment> {
        self.payments.read().await.get(reference).cloned()
    }

    pub async fn account(&self, email: &str) -> Option<Account> {
        self.accounts.read().await.get(email).cloned()
    }

    pub async fn invites(&self) -> Vec<Invite> {
        self.invites.read().await.clone()
    }

    pub async fn activations(&self) -> Vec<(SubscriptionOwner, SubscriptionActivation)> {
        self.activations.read().await.clone()
    }

    pub async fn partner(&self, email: &str) -> Option<Partner> {
        self.partners.read().await.get(email).cloned()
    }

    pub async fn leads(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.check_writable()?;
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&transaction.reference) {
            return Err(PaymentError::Persistence(format!(
                "duplicate reference {}",
                transaction.reference
            )));
        }
        transactions.insert(transaction.reference.clone(), transaction.clone());
        Ok(())
    }

    async fn find_transaction(&self, reference: &Reference) -> Result<Option<Transaction>> {
        Ok(self.transactions.read().await.get(reference).cloned())
    }

    async fn update_transaction(
        &self,
        reference: &Reference,
        update: &TransactionUpdate,
    ) -> Result<()> {
        self.check_writable()?;
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(reference)
            .ok_or_else(|| PaymentError::NotFound(format!("Transaction {reference}")))?;

        transaction.status = update.status;
        if update.paid_at.is_some() {
            transaction.paid_at = update.paid_at;
        }
        if update.last_polled_at.is_some() {
            transaction.last_polled_at = update.last_polled_at;
        }
        Ok(())
    }

    async fn upsert_account(&self, account: &Account) -> Result<()> {
        self.check_writable()?;
        self.accounts
            .write()
            .await
            .insert(account.email.clone(), account.clone());
        Ok(())
    }

    async fn invite_user(&self, invite: &Invite) -> Result<()> {
        self.check_writable()?;
        self.invites.write().await.push(invite.clone());
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.check_writable()?;
        self.payments
            .write()
            .await
            .insert(payment.reference.clone(), payment.clone());
        Ok(())
    }

    async fn update_payment(&self, reference: &str, update: &PaymentUpdate) -> Result<Payment> {
        self.check_writable()?;
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(reference)
            .ok_or_else(|| PaymentError::NotFound(format!("Payment {reference}")))?;

        payment.status.clone_from(&update.status);
        payment.paynow_reference = Some(update.paynow_reference.clone());
        if update.poll_url.is_some() {
            payment.poll_url.clone_from(&update.poll_url);
        }
        payment.is_paid = update.is_paid;
        if update.paid_at.is_some() {
            payment.paid_at = update.paid_at;
        }
        payment.updated_at = update.updated_at;
        Ok(payment.clone())
    }

    async fn activate_subscription(
        &self,
        owner: &SubscriptionOwner,
        activation: &SubscriptionActivation,
    ) -> Result<()> {
        self.check_writable()?;
        if self.fail_activations.load(Ordering::SeqCst) {
            return Err(PaymentError::Persistence(format!(
                "{} row {} unavailable",
                owner.table(),
                owner.id()
            )));
        }
        self.activations
            .write()
            .await
            .push((owner.clone(), activation.clone()));
        Ok(())
    }

    async fn upsert_partner(&self, partner: &Partner) -> Result<()> {
        self.check_writable()?;
        self.partners
            .write()
            .await
            .insert(partner.email.clone(), partner.clone());
        Ok(())
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        self.check_writable()?;
        self.leads.write().await.push(lead.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, TransactionStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn transaction(reference: &str) -> Transaction {
        Transaction {
            reference: Reference::from_string(reference),
            email: "a@b.com".into(),
            name: "Acme".into(),
            plan: "Essential".into(),
            plan_id: "essential".into(),
            role: Role::Business,
            amount: dec!(19.99),
            poll_url: Some("https://pay/poll/x".into()),
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            paid_at: None,
            last_polled_at: None,
        }
    }

    #[tokio::test]
    async fn test_update_keeps_paid_at_when_absent() {
        let store = MemoryStore::new();
        store.insert_transaction(&transaction("HC-1")).await.unwrap();

        let paid_at = Utc::now();
        let reference = Reference::from_string("HC-1");
        store
            .update_transaction(&reference, &TransactionUpdate::paid(paid_at))
            .await
            .unwrap();
        store
            .update_transaction(&reference, &TransactionUpdate::unpaid(Utc::now()))
            .await
            .unwrap();

        let stored = store.transaction("HC-1").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Unpaid);
        assert_eq!(stored.paid_at, Some(paid_at));
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = MemoryStore::new();
        store.insert_transaction(&transaction("HC-1")).await.unwrap();
        assert!(store.insert_transaction(&transaction("HC-1")).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_writes_still_read() {
        let store = MemoryStore::new();
        store.insert_transaction(&transaction("HC-1")).await.unwrap();
        store.set_fail_writes(true);

        assert!(store.insert_transaction(&transaction("HC-2")).await.is_err());
        let found = store
            .find_transaction(&Reference::from_string("HC-1"))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_payment() {
        let store = MemoryStore::new();
        let update = PaymentUpdate {
            status: "Paid".into(),
            paynow_reference: "1".into(),
            poll_url: None,
            is_paid: true,
            paid_at: None,
            updated_at: Utc::now(),
        };
        let err = store.update_payment("missing", &update).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
