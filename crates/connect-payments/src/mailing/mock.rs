//! Recording mailing list (for development and tests)

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::{MailingList, Subscriber};
use crate::error::{PaymentError, Result};

#[derive(Default)]
pub struct RecordingMailingList {
    subscribers: Mutex<Vec<Subscriber>>,
    fail: AtomicBool,
}

impl RecordingMailingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn subscribers(&self) -> Vec<Subscriber> {
        self.subscribers.lock().await.clone()
    }
}

#[async_trait]
impl MailingList for RecordingMailingList {
    async fn subscribe(&self, subscriber: &Subscriber) -> Result<Value> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::MailingList("mailing list unavailable".into()));
        }
        let mut subscribers = self.subscribers.lock().await;
        subscribers.push(subscriber.clone());
        Ok(json!({
            "data": {
                "id": subscribers.len().to_string(),
                "email": subscriber.email,
                "fields": subscriber.fields,
            }
        }))
    }
}
