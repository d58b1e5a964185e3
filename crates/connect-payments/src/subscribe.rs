//! Lead Capture
//!
//! Landing-page signups go to the mailing list first; the store copy is a
//! secondary record and its failures are only logged.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::mailing::{MailingGroup, MailingList, Subscriber};
use crate::model::{Lead, Partner};
use crate::request::{LeadSignup, SubscribeResponse};
use crate::store::Store;

pub struct LeadCaptureService {
    mailing: Arc<dyn MailingList>,
    store: Option<Arc<dyn Store>>,
}

impl LeadCaptureService {
    pub fn new(mailing: Arc<dyn MailingList>, store: Option<Arc<dyn Store>>) -> Self {
        Self { mailing, store }
    }

    pub async fn subscribe(&self, signup: LeadSignup) -> Result<SubscribeResponse> {
        let group = signup.group();
        let subscriber = Subscriber::new(&signup.email, group)
            .with_name(signup.name.as_deref())
            .with_fields(&signup.fields);

        let result = self.mailing.subscribe(&subscriber).await?;
        tracing::info!(email = %signup.email, group = ?group, "Captured signup");

        self.record(signup, group).await;

        Ok(SubscribeResponse { ok: true, result })
    }

    async fn record(&self, signup: LeadSignup, group: MailingGroup) {
        let Some(store) = &self.store else {
            tracing::debug!(email = %signup.email, "No store configured; signup not recorded");
            return;
        };

        let now = Utc::now();
        let email = signup.email.clone();
        let outcome = match group {
            MailingGroup::Business => {
                store
                    .upsert_partner(&Partner {
                        email: signup.email,
                        name: signup.name,
                        fields: signup.fields,
                        updated_at: now,
                    })
                    .await
            }
            MailingGroup::Customer => {
                store
                    .insert_lead(&Lead {
                        email: signup.email,
                        name: signup.name,
                        lead_type: signup.lead_type,
                        fields: signup.fields,
                        created_at: now,
                    })
                    .await
            }
        };

        if let Err(e) = outcome {
            tracing::warn!(%email, error = %e, "Failed to record signup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailing::RecordingMailingList;
    use crate::store::MemoryStore;
    use serde_json::Map;

    fn signup(lead_type: Option<&str>) -> LeadSignup {
        LeadSignup {
            email: "jo@shop.com".into(),
            name: Some("Jo".into()),
            lead_type: lead_type.map(Into::into),
            fields: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_partner_signup_upserts_partner() {
        let mailing = Arc::new(RecordingMailingList::new());
        let store = Arc::new(MemoryStore::new());
        let service = LeadCaptureService::new(mailing.clone(), Some(store.clone()));

        let response = service.subscribe(signup(Some("partner"))).await.unwrap();
        assert!(response.ok);

        assert_eq!(mailing.subscribers().await[0].group, MailingGroup::Business);
        assert_eq!(mailing.subscribers().await[0].fields["role"], "business");
        assert!(store.partner("jo@shop.com").await.is_some());
        assert!(store.leads().await.is_empty());
    }

    #[tokio::test]
    async fn test_customer_signup_inserts_lead() {
        let mailing = Arc::new(RecordingMailingList::new());
        let store = Arc::new(MemoryStore::new());
        let service = LeadCaptureService::new(mailing.clone(), Some(store.clone()));

        service.subscribe(signup(None)).await.unwrap();

        assert_eq!(mailing.subscribers().await[0].group, MailingGroup::Customer);
        assert_eq!(store.leads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_writes(true);
        let service =
            LeadCaptureService::new(Arc::new(RecordingMailingList::new()), Some(store));

        assert!(service.subscribe(signup(None)).await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_mailing_failure_fails_request() {
        let mailing = Arc::new(RecordingMailingList::new());
        mailing.set_failing(true);
        let store = Arc::new(MemoryStore::new());
        let service = LeadCaptureService::new(mailing, Some(store.clone()));

        let err = service.subscribe(signup(None)).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(store.leads().await.is_empty());
    }
}
