// API module for the referral node
//
// This module implements the HTTP API for the referral node. The routes are
// thin plumbing over the referral service; the claim protocol itself lives in
// `crate::referral`.

use crate::error::{ReferralNodeError, Result};
use crate::referral::ReferralService;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

mod handlers;

pub use handlers::*;

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    /// Referral service handling claims, user info, and diagnostics
    pub referral: Arc<ReferralService>,
}

/// API Error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
    /// Optional additional details
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "INVALID_INPUT" => StatusCode::BAD_REQUEST,
            "ALREADY_REFERRED" => StatusCode::BAD_REQUEST,
            "AUTHENTICATION_ERROR" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(self);

        (status, body).into_response()
    }
}

/// Convert ReferralNodeError to an API error
impl From<ReferralNodeError> for ApiError {
    fn from(err: ReferralNodeError) -> Self {
        let (code, message) = match err {
            ReferralNodeError::InvalidInput(msg) => ("INVALID_INPUT", msg),
            ReferralNodeError::Authentication(msg) => ("AUTHENTICATION_ERROR", msg),
            ReferralNodeError::AlreadyReferred(msg) => ("ALREADY_REFERRED", msg),
            ReferralNodeError::Storage(msg) => ("STORAGE_ERROR", msg),
            ReferralNodeError::Config(msg) => ("CONFIG_ERROR", msg),
            ReferralNodeError::Serialization(msg) => ("SERIALIZATION_ERROR", msg),
            ReferralNodeError::IO(msg) => ("IO_ERROR", msg),
            ReferralNodeError::Internal => ("INTERNAL_ERROR", "Internal server error".to_string()),
        };

        Self {
            message,
            code: code.to_string(),
            details: None,
        }
    }
}

/// API Server
pub struct ApiServer {
    /// Application state shared with all request handlers
    app_state: Arc<AppState>,
    /// Server bind address in the format "IP:port"
    bind_address: String,
    /// Whether the debug state-dump route is registered
    enable_debug_endpoint: bool,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        referral: Arc<ReferralService>,
        bind_address: String,
        enable_debug_endpoint: bool,
    ) -> Self {
        let app_state = Arc::new(AppState { referral });

        Self {
            app_state,
            bind_address,
            enable_debug_endpoint,
        }
    }

    /// Start the API server
    pub async fn start(&self) -> Result<()> {
        // Create router with routes
        let app = self.create_router().layer(TraceLayer::new_for_http());

        // Parse the bind address
        let addr = self
            .bind_address
            .parse()
            .map_err(|e| ReferralNodeError::Config(format!("Invalid bind address: {}", e)))?;

        info!("Starting API server on {}", self.bind_address);

        // Start the server
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await
            .map_err(|e| ReferralNodeError::Config(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Create the API router
    pub fn create_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/api", get(handlers::api_root))
            .route("/api/hello", get(handlers::api_hello))
            .route("/api/user/:public_key", get(handlers::get_user))
            .route(
                "/api/claim-referral/:ref_code/:public_key",
                post(handlers::claim_referral),
            );

        if self.enable_debug_endpoint {
            router = router.route("/api/debug/referrals", get(handlers::debug_referrals));
        }

        router.with_state(self.app_state.clone())
    }
}
