//! Supabase Store
//!
//! Tables are reached through PostgREST (`/rest/v1/<table>`), invites through
//! the auth admin API. All requests authenticate with the service-role key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::Store;
use crate::error::{PaymentError, Result};
use crate::model::{
    Account, Invite, Lead, Partner, Payment, PaymentUpdate, Reference, SubscriptionActivation,
    SubscriptionOwner, Transaction, TransactionUpdate,
};

/// Supabase connection settings
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub timeout_secs: u64,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
            timeout_secs: 30,
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| PaymentError::Config("SUPABASE_URL not set".into()))?;
        let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| PaymentError::Config("SUPABASE_SERVICE_ROLE_KEY not set".into()))?;
        Ok(Self::new(url, key))
    }
}

#[derive(Serialize)]
struct InviteBody<'a> {
    email: &'a str,
    data: InviteData<'a>,
}

#[derive(Serialize)]
struct InviteData<'a> {
    full_name: &'a str,
    plan_id: &'a str,
    role: &'a str,
}

/// PostgREST-backed store
pub struct SupabaseStore {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    /// `/rest/v1/<table>` with the given query pairs
    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{table}", self.config.url))
            .map_err(|e| PaymentError::Config(format!("SUPABASE_URL: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn invite_url(&self, redirect_to: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/auth/v1/invite", self.config.url))
            .map_err(|e| PaymentError::Config(format!("SUPABASE_URL: {e}")))?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| PaymentError::Persistence(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PaymentError::Persistence(format!("{status}: {body}")))
    }

    async fn rows<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Vec<T>> {
        Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| PaymentError::Persistence(format!("unreadable rows: {e}")))
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let url = self.table_url(table, &[])?;
        Self::send(
            self.request(Method::POST, url)
                .header("Prefer", "return=minimal")
                .json(row),
        )
        .await?;
        Ok(())
    }

    async fn upsert<T: Serialize + Sync>(&self, table: &str, on_conflict: &str, row: &T) -> Result<()> {
        let url = self.table_url(table, &[("on_conflict", on_conflict)])?;
        Self::send(
            self.request(Method::POST, url)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(row),
        )
        .await?;
        Ok(())
    }

    /// PATCH rows matching `column = value`, returning the updated rows
    async fn update<T: Serialize + Sync, R: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
        patch: &T,
    ) -> Result<Vec<R>> {
        let filter = format!("eq.{value}");
        let url = self.table_url(table, &[(column, filter.as_str())])?;
        Self::rows(
            self.request(Method::PATCH, url)
                .header("Prefer", "return=representation")
                .json(patch),
        )
        .await
    }
}

#[async_trait]
impl Store for SupabaseStore {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.insert("transactions", transaction).await
    }

    async fn find_transaction(&self, reference: &Reference) -> Result<Option<Transaction>> {
        let filter = format!("eq.{reference}");
        let url = self.table_url(
            "transactions",
            &[("reference", filter.as_str()), ("select", "*"), ("limit", "1")],
        )?;
        let rows: Vec<Transaction> = Self::rows(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_transaction(
        &self,
        reference: &Reference,
        update: &TransactionUpdate,
    ) -> Result<()> {
        let rows: Vec<serde_json::Value> = self
            .update("transactions", "reference", reference.as_str(), update)
            .await?;
        if rows.is_empty() {
            return Err(PaymentError::NotFound(format!("Transaction {reference}")));
        }
        Ok(())
    }

    async fn upsert_account(&self, account: &Account) -> Result<()> {
        self.upsert("profiles", "email", account).await
    }

    async fn invite_user(&self, invite: &Invite) -> Result<()> {
        let url = self.invite_url(&invite.redirect_to)?;
        let body = InviteBody {
            email: &invite.email,
            data: InviteData {
                full_name: &invite.full_name,
                plan_id: &invite.plan_id,
                role: invite.role.as_str(),
            },
        };
        Self::send(self.request(Method::POST, url).json(&body)).await?;
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.insert("payments", payment).await
    }

    async fn update_payment(&self, reference: &str, update: &PaymentUpdate) -> Result<Payment> {
        let rows: Vec<Payment> = self.update("payments", "reference", reference, update).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PaymentError::NotFound(format!("Payment {reference}")))
    }

    async fn activate_subscription(
        &self,
        owner: &SubscriptionOwner,
        activation: &SubscriptionActivation,
    ) -> Result<()> {
        let rows: Vec<serde_json::Value> = self
            .update(owner.table(), "id", owner.id(), activation)
            .await?;
        if rows.is_empty() {
            return Err(PaymentError::NotFound(format!(
                "{} row {}",
                owner.table(),
                owner.id()
            )));
        }
        Ok(())
    }

    async fn upsert_partner(&self, partner: &Partner) -> Result<()> {
        self.upsert("partners", "email", partner).await
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        self.insert("leads", lead).await
    }
}
