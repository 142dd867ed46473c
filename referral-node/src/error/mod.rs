// Error handling module for the referral node
//
// This module defines error types and utility functions for error handling

use axum::response::{IntoResponse, Response};
use std::io;
use std::result;
use thiserror::Error;

/// Result type for referral node operations
pub type Result<T> = result::Result<T, ReferralNodeError>;

/// Error type for referral node operations
#[derive(Debug, Error, Clone)]
pub enum ReferralNodeError {
    /// Malformed or missing client input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Signature failed verification against the claimed public key
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The public key already holds a referral binding
    #[error("Already referred: {0}")]
    AlreadyReferred(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization-related errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    IO(String),

    /// Internal error
    #[error("Internal error")]
    Internal,
}

/// Implement IntoResponse for ReferralNodeError so it can be returned directly
/// from handlers.
///
/// Rendering goes through the API error envelope so the wire carries the
/// machine-readable code: "already referred" and "invalid input" share the
/// 400 status and are told apart by the `code` field.
impl IntoResponse for ReferralNodeError {
    fn into_response(self) -> Response {
        crate::api::ApiError::from(self).into_response()
    }
}

// Implement conversion from rusqlite error to ReferralNodeError
impl From<rusqlite::Error> for ReferralNodeError {
    fn from(err: rusqlite::Error) -> Self {
        ReferralNodeError::Storage(err.to_string())
    }
}

// Implement conversion from io::Error to ReferralNodeError
impl From<io::Error> for ReferralNodeError {
    fn from(err: io::Error) -> Self {
        ReferralNodeError::IO(err.to_string())
    }
}

// Implement conversion from serde_json::Error to ReferralNodeError
impl From<serde_json::Error> for ReferralNodeError {
    fn from(err: serde_json::Error) -> Self {
        ReferralNodeError::Serialization(err.to_string())
    }
}

// Implement conversion from toml deserialization error to ReferralNodeError
impl From<toml::de::Error> for ReferralNodeError {
    fn from(err: toml::de::Error) -> Self {
        ReferralNodeError::Config(err.to_string())
    }
}

// Implement conversion from toml serialization error to ReferralNodeError
impl From<toml::ser::Error> for ReferralNodeError {
    fn from(err: toml::ser::Error) -> Self {
        ReferralNodeError::Config(err.to_string())
    }
}
