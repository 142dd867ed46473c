// API handlers for the referral node
//
// This module implements the API route handlers. Each handler decodes the
// transport payload into typed input, delegates to the referral service, and
// renders the wire JSON.

use crate::api::AppState;
use crate::error::{ReferralNodeError, Result};
use crate::types::SignedClaim;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Claim request body.
///
/// Fields are optional so that a missing field surfaces as a client-input
/// error rather than a transport-level decode rejection.
#[derive(Debug, Deserialize)]
pub struct ClaimBody {
    /// Base58 detached signature over `message`
    pub signature: Option<String>,
    /// Plain-text message the wallet signed
    pub message: Option<String>,
}

/// Get user info handler
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(public_key): Path<String>,
) -> Result<impl IntoResponse> {
    debug!("Fetching user info for key: {}", public_key);

    let info = state.referral.user_info(&public_key).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "publicKey": info.public_key,
            "refCode": info.ref_code,
            "points": info.points,
        })),
    ))
}

/// Claim referral handler
#[axum::debug_handler]
pub async fn claim_referral(
    State(state): State<Arc<AppState>>,
    Path((ref_code, public_key)): Path<(String, String)>,
    Json(body): Json<ClaimBody>,
) -> Result<impl IntoResponse> {
    info!("Claim attempt for code {} by key {}", ref_code, public_key);

    let signature = body.signature.ok_or_else(|| {
        ReferralNodeError::InvalidInput("Request body must carry a signature".into())
    })?;
    let message = body.message.ok_or_else(|| {
        ReferralNodeError::InvalidInput("Request body must carry a message".into())
    })?;

    let receipt = state
        .referral
        .claim(SignedClaim {
            public_key,
            ref_code,
            message,
            signature,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "publicKey": receipt.public_key,
            "refCode": receipt.ref_code,
            "storage": receipt.storage,
        })),
    ))
}

/// Debug referral state dump handler
#[axum::debug_handler]
pub async fn debug_referrals(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    debug!("Dumping referral state");

    let dump = state.referral.dump_state().await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "backend": dump.backend,
            "bindingCount": dump.binding_count,
            "bindings": dump.bindings,
            "codes": dump.codes,
        })),
    ))
}

/// API root greeting handler
pub async fn api_root() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Referral node API",
        })),
    )
}

/// API hello handler
pub async fn api_hello() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Hello from the referral node!",
        })),
    )
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "timestamp": std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        })),
    )
}
