//! Mailing List Integration

mod mailerlite;
mod mock;

pub use mailerlite::{MailerLiteClient, MailerLiteConfig};
pub use mock::RecordingMailingList;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::Role;

/// Audience a contact is filed under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MailingGroup {
    Business,
    Customer,
}

impl From<Role> for MailingGroup {
    fn from(role: Role) -> Self {
        match role {
            Role::Business => Self::Business,
            Role::Customer => Self::Customer,
        }
    }
}

impl MailingGroup {
    /// Value written to the contact's `role` field
    pub const fn role_tag(self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Customer => "customer",
        }
    }
}

/// A contact to upsert into a group
#[derive(Clone, Debug, PartialEq)]
pub struct Subscriber {
    pub email: String,
    pub group: MailingGroup,
    /// Custom fields; `role` is always set from the group
    pub fields: Map<String, Value>,
}

impl Subscriber {
    pub fn new(email: impl Into<String>, group: MailingGroup) -> Self {
        let mut fields = Map::new();
        fields.insert("role".into(), Value::from(group.role_tag()));
        Self {
            email: email.into(),
            group,
            fields,
        }
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        if let Some(name) = name {
            self.fields.insert("name".into(), Value::from(name));
        }
        self
    }

    /// Merge caller-supplied fields; the `role` tag cannot be overridden
    pub fn with_fields(mut self, fields: &Map<String, Value>) -> Self {
        for (key, value) in fields {
            if key != "role" {
                self.fields.insert(key.clone(), value.clone());
            }
        }
        self
    }
}

/// Mailing list client
#[async_trait]
pub trait MailingList: Send + Sync {
    /// Upsert a contact into its group; returns the provider's response
    async fn subscribe(&self, subscriber: &Subscriber) -> Result<Value>;
}
