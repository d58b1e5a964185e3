//! Router

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    health_check, method_not_allowed, payment_callback, process_payment, register, subscribe,
    verify,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Payments
        .route("/register", post(register).fallback(method_not_allowed))
        .route("/verify", post(verify).fallback(method_not_allowed))
        .route(
            "/payment-callback",
            post(payment_callback).fallback(method_not_allowed),
        )
        .route(
            "/process-payment",
            post(process_payment).fallback(method_not_allowed),
        )
        // Lead capture
        .route("/subscribe", post(subscribe).fallback(method_not_allowed))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
