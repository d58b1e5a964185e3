//! Application State

use std::sync::Arc;

use connect_payments::{
    MailerLiteClient, MailingList, MemoryStore, MockGateway, PaymentError, PaymentGateway,
    PaynowClient, RecordingMailingList, SiteUrls, Store, SupabaseStore,
};

/// Shared application state.
///
/// Collaborators are `None` when their credentials are absent; endpoints that
/// need one answer with a configuration error before calling anything.
#[derive(Clone)]
pub struct AppState {
    /// Payment gateway (Paynow)
    pub gateway: Option<Arc<dyn PaymentGateway>>,

    /// Persistence store (Supabase)
    pub store: Option<Arc<dyn Store>>,

    /// Mailing list (MailerLite)
    pub mailing: Option<Arc<dyn MailingList>>,

    /// Public site URLs for return, result and dashboard links
    pub urls: SiteUrls,
}

fn dev_collaborators_enabled() -> bool {
    std::env::var("CONNECT_DEV_COLLABORATORS")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl AppState {
    /// Build collaborators from the environment
    pub fn from_env() -> Self {
        let dev = dev_collaborators_enabled();

        let gateway: Option<Arc<dyn PaymentGateway>> = match PaynowClient::from_env() {
            Ok(client) => {
                tracing::info!("✓ Paynow configured");
                Some(Arc::new(client))
            }
            Err(e) if dev => {
                tracing::warn!("⚠ {e} - using mock gateway");
                Some(Arc::new(MockGateway::new()))
            }
            Err(e) => {
                tracing::warn!("⚠ {e} - payments disabled");
                None
            }
        };

        let store: Option<Arc<dyn Store>> = match SupabaseStore::from_env() {
            Ok(store) => {
                tracing::info!("✓ Supabase configured");
                Some(Arc::new(store))
            }
            Err(e) if dev => {
                tracing::warn!("⚠ {e} - using in-memory store");
                Some(Arc::new(MemoryStore::new()))
            }
            Err(e) => {
                tracing::warn!("⚠ {e} - persistence disabled");
                None
            }
        };

        let mailing: Option<Arc<dyn MailingList>> = match MailerLiteClient::from_env() {
            Ok(client) => {
                tracing::info!("✓ MailerLite configured");
                Some(Arc::new(client))
            }
            Err(e) if dev => {
                tracing::warn!("⚠ {e} - using recording mailing list");
                Some(Arc::new(RecordingMailingList::new()))
            }
            Err(e) => {
                tracing::warn!("⚠ {e} - mailing list disabled");
                None
            }
        };

        Self {
            gateway,
            store,
            mailing,
            urls: SiteUrls::from_env(),
        }
    }

    pub fn gateway(&self) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
        self.gateway.clone().ok_or_else(|| {
            PaymentError::Config(
                "payment gateway is not configured (PAYNOW_INTEGRATION_ID, PAYNOW_INTEGRATION_KEY)"
                    .into(),
            )
        })
    }

    pub fn store(&self) -> Result<Arc<dyn Store>, PaymentError> {
        self.store.clone().ok_or_else(|| {
            PaymentError::Config(
                "store is not configured (SUPABASE_URL, SUPABASE_SERVICE_ROLE_KEY)".into(),
            )
        })
    }

    pub fn mailing(&self) -> Result<Arc<dyn MailingList>, PaymentError> {
        self.mailing.clone().ok_or_else(|| {
            PaymentError::Config(
                "mailing list is not configured (MAILERLITE_API_KEY, MAILERLITE_BUSINESS_GROUP_ID, MAILERLITE_CUSTOMER_GROUP_ID)"
                    .into(),
            )
        })
    }
}
