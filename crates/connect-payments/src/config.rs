//! Site URLs
//!
//! Where the gateway sends the browser back to, where it posts status
//! updates, and which dashboard an invited account lands on.

use crate::model::{Reference, Role};

/// Default public origin for local development
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

#[derive(Clone, Debug)]
pub struct SiteUrls {
    base: String,
}

impl Default for SiteUrls {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_URL)
    }
}

impl SiteUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Reads `SITE_URL`, falling back to the local default
    pub fn from_env() -> Self {
        std::env::var("SITE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map_or_else(Self::default, Self::new)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Browser return target after checkout, carrying the reference
    pub fn return_url(&self, reference: &Reference) -> String {
        format!("{}/payment-success.html?reference={reference}", self.base)
    }

    /// Browser return target after paying an invoice. Invoice payments have
    /// no registration transaction, so they settle through the callback
    /// rather than `/verify`.
    pub fn invoice_return_url(&self, reference: &str) -> String {
        format!("{}/invoice-status.html?reference={reference}", self.base)
    }

    /// Gateway webhook target
    pub fn result_url(&self) -> String {
        format!("{}/payment-callback", self.base)
    }

    pub fn dashboard_url(&self, role: Role) -> String {
        match role {
            Role::Customer => format!("{}/customer-dashboard.html", self.base),
            Role::Business => format!("{}/business-dashboard.html", self.base),
        }
    }
}
