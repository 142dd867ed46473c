// Types module for the referral node
//
// This module defines common types used throughout the referral node.

use serde::{Deserialize, Serialize};

/// Minimum accepted length of a Base58 public key string.
///
/// This is a coarse validity heuristic only; real ownership is established by
/// signature verification, not by inspecting the key string.
pub const MIN_PUBLIC_KEY_LEN: usize = 32;

/// A single claim request, decoded once at the transport boundary.
///
/// The tuple is ephemeral: it exists only for the duration of one claim
/// operation and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedClaim {
    /// Base58 public key of the wallet being referred
    pub public_key: String,

    /// Referral code presented in the request
    pub ref_code: String,

    /// Plain-text message the wallet signed; must contain `ref_code`
    pub message: String,

    /// Base58 detached ed25519 signature over `message`
    pub signature: String,
}

/// A durable referral binding: `referred key -> referring code`.
///
/// Created exactly once per key; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralBinding {
    /// Base58 public key that was referred
    pub public_key: String,

    /// Referral code the key was bound to
    pub ref_code: String,
}

/// Per-code referral tally from the reverse index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CodeReferrals {
    /// Referral code
    pub ref_code: String,

    /// Number of keys referred by this code
    pub referred_count: usize,
}

/// Full referral state as seen by a single store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralSnapshot {
    /// All bindings, referred key first
    pub bindings: Vec<ReferralBinding>,

    /// Per-code referred counts
    pub codes: Vec<CodeReferrals>,
}

/// Outcome of a successful claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// Public key that was bound
    pub public_key: String,

    /// Referral code it was bound to
    pub ref_code: String,

    /// Backend that served the write (diagnostic only)
    pub storage: String,
}

/// User info response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Base58 public key
    pub public_key: String,

    /// Referral code derived from the key
    pub ref_code: String,

    /// Placeholder points balance; the points subsystem is out of scope
    pub points: u64,
}
