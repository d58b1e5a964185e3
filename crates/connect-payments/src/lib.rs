//! # connect-payments
//!
//! Payment registration, verification and webhook reconciliation for
//! Helensvale Connect memberships.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────┐ register ┌─────────────┐ initiate ┌──────────────┐
//! │ Browser │─────────▶│ Registration│─────────▶│   Gateway    │
//! └─────────┘          └─────────────┘          │ (hosted page)│
//!      ▲  │                   │ pending row     └──────────────┘
//!      │  │ verify            ▼                     │      │
//!      │  │            ┌─────────────┐    poll      │      │ status update
//!      │  └───────────▶│ Verification│◀─────────────┘      ▼
//!      │               └─────────────┘              ┌──────────────┐
//!      └──── success ──────── │ paid                │   Callback   │
//!                             ▼                     └──────────────┘
//!                store · mailing list · invite        store · activation
//! ```
//!
//! The gateway's settlement status is the only authority on payment. Every
//! step after a confirmed payment is best-effort: failures are logged and
//! never reverse the caller-visible success.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use connect_payments::{
//!     MailerLiteClient, PaynowClient, RegisterRequest, RegistrationService, SiteUrls,
//!     SupabaseStore,
//! };
//!
//! let service = RegistrationService::new(
//!     Arc::new(PaynowClient::from_env()?),
//!     Arc::new(SupabaseStore::from_env()?),
//!     SiteUrls::from_env(),
//! );
//!
//! let response = service.register(request.validate()?).await?;
//! // Redirect user to: response.authorization_url
//! ```

mod callback;
mod config;
mod error;
pub mod gateway;
pub mod mailing;
pub mod model;
mod process;
mod register;
mod request;
pub mod store;
mod subscribe;
mod verify;

pub use callback::CallbackService;
pub use config::{DEFAULT_SITE_URL, SiteUrls};
pub use error::{PaymentError, Result};
pub use gateway::{MockGateway, PaymentGateway, PaynowClient};
pub use mailing::{MailerLiteClient, MailingGroup, MailingList, RecordingMailingList};
pub use model::{Reference, Role, Transaction, TransactionStatus};
pub use process::PaymentService;
pub use register::RegistrationService;
pub use request::{
    CallbackNotice, CallbackResponse, LeadSignup, PaymentOrder, ProcessPaymentRequest,
    ProcessPaymentResponse, RegisterRequest, RegisterResponse, Registration, SubscribeRequest,
    SubscribeResponse, VerifyRequest, VerifyResponse,
};
pub use store::{MemoryStore, Store, SupabaseStore};
pub use subscribe::LeadCaptureService;
pub use verify::{VERIFIED_MESSAGE, VerificationService};
