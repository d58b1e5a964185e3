//! HTTP Handlers

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use connect_payments::{
    CallbackNotice, CallbackResponse, CallbackService, LeadCaptureService, PaymentError,
    PaymentService, ProcessPaymentRequest, ProcessPaymentResponse, RegisterRequest,
    RegisterResponse, RegistrationService, SubscribeRequest, SubscribeResponse,
    VerificationService, VerifyRequest, VerifyResponse,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway_configured: bool,
    pub store_configured: bool,
    pub mailing_list_configured: bool,
}

type ApiResult<T> = Result<Json<T>, PaymentError>;

fn bad_body(rejection: &JsonRejection) -> PaymentError {
    PaymentError::invalid(rejection.body_text())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway_configured: state.gateway.is_some(),
        store_configured: state.store.is_some(),
        mailing_list_configured: state.mailing.is_some(),
    })
}

/// Any non-POST request on a payment endpoint
pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
}

/// Start a membership checkout
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<RegisterResponse> {
    let Json(request) = payload.map_err(|e| bad_body(&e))?;
    let registration = request.validate()?;

    let service = RegistrationService::new(state.gateway()?, state.store()?, state.urls.clone());
    Ok(Json(service.register(registration).await?))
}

/// Confirm a checkout after the browser returns from the gateway
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<VerifyResponse> {
    let Json(request) = payload.map_err(|e| bad_body(&e))?;
    let reference = request.validate()?;

    let service = VerificationService::new(
        state.gateway()?,
        state.store()?,
        state.mailing()?,
        state.urls.clone(),
    );
    Ok(Json(service.verify(&reference).await?))
}

/// Gateway status update (form-encoded)
pub async fn payment_callback(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<CallbackResponse> {
    let notice = CallbackNotice::from_form(&body)?;

    let service = CallbackService::new(state.store()?, state.gateway.clone());
    Ok(Json(service.handle(notice).await?))
}

/// Open a gateway transaction for an existing invoice
pub async fn process_payment(
    State(state): State<AppState>,
    payload: Result<Json<ProcessPaymentRequest>, JsonRejection>,
) -> ApiResult<ProcessPaymentResponse> {
    let Json(request) = payload.map_err(|e| bad_body(&e))?;
    let order = request.validate()?;

    let service = PaymentService::new(state.gateway()?, state.store()?, state.urls.clone());
    Ok(Json(service.process(order).await?))
}

/// Landing-page signup
pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> ApiResult<SubscribeResponse> {
    let Json(request) = payload.map_err(|e| bad_body(&e))?;
    let signup = request.validate()?;

    let service = LeadCaptureService::new(state.mailing()?, state.store.clone());
    Ok(Json(service.subscribe(signup).await?))
}
