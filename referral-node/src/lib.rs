// Referral Node Library
//
// This library implements a small referral-claim service: a wallet proves
// ownership of its public key with a detached ed25519 signature and is bound,
// at most once, to the referral code that brought it in.

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod referral;
pub mod storage;
pub mod types;
