// Crypto module for the referral node
//
// Decodes wallet keys and signatures from their Base58 wire form, verifies
// detached ed25519 signatures, and derives referral codes from public keys.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Length of the derived referral code in hex characters
pub const REF_CODE_LEN: usize = 8;

/// Decode a Base58 public key string into raw ed25519 key bytes.
///
/// Returns `None` for malformed Base58 or any byte length other than 32.
pub fn decode_public_key(public_key: &str) -> Option<[u8; 32]> {
    let bytes = bs58::decode(public_key).into_vec().ok()?;
    bytes.try_into().ok()
}

/// Decode a Base58 signature string into raw detached-signature bytes.
///
/// Returns `None` for malformed Base58 or any byte length other than 64.
pub fn decode_signature(signature: &str) -> Option<[u8; 64]> {
    let bytes = bs58::decode(signature).into_vec().ok()?;
    bytes.try_into().ok()
}

/// Verify a detached ed25519 signature over `message` against `public_key`.
///
/// Fail-closed: malformed keys, malformed signatures, and verification
/// mismatches all return `false`. Malformed input must never be treated as
/// "verification skipped".
pub fn verify_wallet_signature(public_key: &str, message: &str, signature: &str) -> bool {
    let key_bytes = match decode_public_key(public_key) {
        Some(bytes) => bytes,
        None => {
            debug!("Rejecting malformed public key encoding");
            return false;
        }
    };

    let sig_bytes = match decode_signature(signature) {
        Some(bytes) => bytes,
        None => {
            debug!("Rejecting malformed signature encoding");
            return false;
        }
    };

    let verifying_key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(key) => key,
        Err(_) => {
            debug!("Rejecting public key that is not a valid curve point");
            return false;
        }
    };

    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}

/// Derive the referral code for a public key.
///
/// The code is the first 8 hex characters of sha256 over the key string,
/// uppercased. Deriving codes from keys means any public key is automatically
/// a valid referral source; codes are never allocated or stored.
pub fn derive_ref_code(public_key: &str) -> String {
    let digest = Sha256::digest(public_key.as_bytes());
    hex::encode(digest)[..REF_CODE_LEN].to_uppercase()
}
