//! Persistence Store
//!
//! Durable state lives in the hosted store; handlers hold nothing between
//! requests.

mod memory;
mod supabase;

pub use memory::MemoryStore;
pub use supabase::{SupabaseConfig, SupabaseStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    Account, Invite, Lead, Partner, Payment, PaymentUpdate, Reference, SubscriptionActivation,
    SubscriptionOwner, Transaction, TransactionUpdate,
};

/// Store operations used by the payment workflow
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new pending transaction
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Get transaction by reference
    async fn find_transaction(&self, reference: &Reference) -> Result<Option<Transaction>>;

    /// Apply a status update to the transaction keyed by `reference`
    async fn update_transaction(
        &self,
        reference: &Reference,
        update: &TransactionUpdate,
    ) -> Result<()>;

    /// Insert or update an account keyed by email
    async fn upsert_account(&self, account: &Account) -> Result<()>;

    /// Send a passwordless invite
    async fn invite_user(&self, invite: &Invite) -> Result<()>;

    /// Insert a new payment row
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    /// Reconcile gateway status onto the payment keyed by `reference`.
    /// Returns the updated row; `NotFound` when no row matched.
    async fn update_payment(&self, reference: &str, update: &PaymentUpdate) -> Result<Payment>;

    /// Mark a user or business subscription active
    async fn activate_subscription(
        &self,
        owner: &SubscriptionOwner,
        activation: &SubscriptionActivation,
    ) -> Result<()>;

    /// Insert or update a partner keyed by email
    async fn upsert_partner(&self, partner: &Partner) -> Result<()>;

    /// Record a customer lead
    async fn insert_lead(&self, lead: &Lead) -> Result<()>;
}
