// Referral module for the referral node
//
// This module implements the claim protocol: input validation, signature
// proof-of-ownership, the binding-confusion guard, and at-most-once
// registration against the referral store. It also serves user info and the
// diagnostic state dump.

use crate::crypto;
use crate::error::{ReferralNodeError, Result};
use crate::storage::ReferralStore;
use crate::types::{
    ClaimReceipt, CodeReferrals, ReferralSnapshot, SignedClaim, UserInfo, MIN_PUBLIC_KEY_LEN,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A binding entry as rendered in the diagnostic dump, with the referred key
/// partially redacted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedBinding {
    /// Redacted referred key, e.g. `FCbpZ2...A7UY`
    pub public_key: String,
    /// Referral code the key is bound to
    pub ref_code: String,
}

/// Full referral state for operational diagnosis.
///
/// Discloses the referral graph; production deployments should gate or remove
/// the surface that serves it.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralStateDump {
    /// Backend label serving the dump
    pub backend: String,
    /// Number of bindings
    pub binding_count: usize,
    /// All bindings with redacted keys
    pub bindings: Vec<RedactedBinding>,
    /// Per-code referred counts
    pub codes: Vec<CodeReferrals>,
}

/// Referral service orchestrating claims against an injected store.
pub struct ReferralService {
    store: Arc<dyn ReferralStore>,
}

impl ReferralService {
    /// Create a new referral service over the given store.
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        Self { store }
    }

    /// Claim a referral binding for a public key, exactly once.
    ///
    /// The claim is terminal on first rejection; no partial state persists.
    /// Steps, in order: input validation, signature verification, the
    /// binding-confusion guard, the at-most-once check, then the conditional
    /// commit.
    pub async fn claim(&self, claim: SignedClaim) -> Result<ClaimReceipt> {
        validate_public_key(&claim.public_key)?;

        if claim.ref_code.is_empty() {
            return Err(ReferralNodeError::InvalidInput(
                "Referral code cannot be empty".into(),
            ));
        }
        if claim.signature.is_empty() || claim.message.is_empty() {
            return Err(ReferralNodeError::InvalidInput(
                "Request must carry signature and message".into(),
            ));
        }

        // Ownership proof: without this, any caller could bind an arbitrary
        // key to a code without ever holding its private material.
        if !crypto::verify_wallet_signature(&claim.public_key, &claim.message, &claim.signature) {
            warn!(
                public_key = %claim.public_key,
                "Claim rejected: signature verification failed"
            );
            return Err(ReferralNodeError::Authentication(
                "Signature verification failed".into(),
            ));
        }

        // The signed payload is the only thing cryptographically tied to
        // intent, so the presented code must appear in it. A signature over
        // "claiming code X" must not be replayable for code Y.
        if !claim.message.contains(&claim.ref_code) {
            debug!(
                public_key = %claim.public_key,
                ref_code = %claim.ref_code,
                "Claim rejected: signed message does not contain the presented code"
            );
            return Err(ReferralNodeError::InvalidInput(
                "Signed message does not contain the referral code".into(),
            ));
        }

        // At-most-once: an existing binding rejects the claim regardless of
        // whether the codes match.
        if self.store.get_binding(&claim.public_key).await?.is_some() {
            return Err(ReferralNodeError::AlreadyReferred(
                "Public key has already been referred".into(),
            ));
        }

        // The read above can race a concurrent claim for the same key; the
        // store's conditional put decides the single winner and commits the
        // binding together with its reverse-index entry.
        let newly_set = self
            .store
            .set_binding_if_absent(&claim.public_key, &claim.ref_code)
            .await?;
        if !newly_set {
            return Err(ReferralNodeError::AlreadyReferred(
                "Public key has already been referred".into(),
            ));
        }

        info!(
            public_key = %claim.public_key,
            ref_code = %claim.ref_code,
            backend = self.store.backend_name(),
            "Referral claimed"
        );

        Ok(ClaimReceipt {
            public_key: claim.public_key,
            ref_code: claim.ref_code,
            storage: self.store.backend_name().to_string(),
        })
    }

    /// Return a public key's derived referral code and points balance.
    pub async fn user_info(&self, public_key: &str) -> Result<UserInfo> {
        validate_public_key(public_key)?;

        Ok(UserInfo {
            public_key: public_key.to_string(),
            ref_code: crypto::derive_ref_code(public_key),
            // Placeholder until a points/volume subsystem exists
            points: 0,
        })
    }

    /// Dump the full referral state for diagnostics. Read-only.
    pub async fn dump_state(&self) -> Result<ReferralStateDump> {
        let ReferralSnapshot { bindings, codes } = self.store.list_all().await?;

        let bindings = bindings
            .into_iter()
            .map(|binding| RedactedBinding {
                public_key: redact_key(&binding.public_key),
                ref_code: binding.ref_code,
            })
            .collect::<Vec<_>>();

        Ok(ReferralStateDump {
            backend: self.store.backend_name().to_string(),
            binding_count: bindings.len(),
            bindings,
            codes,
        })
    }
}

fn validate_public_key(public_key: &str) -> Result<()> {
    if public_key.len() < MIN_PUBLIC_KEY_LEN {
        return Err(ReferralNodeError::InvalidInput(format!(
            "Public key must be at least {} characters",
            MIN_PUBLIC_KEY_LEN
        )));
    }
    Ok(())
}

/// Keep the first and last few characters of a key for display.
fn redact_key(public_key: &str) -> String {
    if public_key.len() <= 10 {
        return public_key.to_string();
    }
    format!(
        "{}...{}",
        &public_key[..6],
        &public_key[public_key.len() - 4..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryReferralStore;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    struct Wallet {
        signing_key: SigningKey,
        public_key: String,
    }

    impl Wallet {
        fn generate() -> Self {
            let signing_key = SigningKey::generate(&mut OsRng);
            let public_key = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
            Self {
                signing_key,
                public_key,
            }
        }

        fn sign(&self, message: &str) -> String {
            bs58::encode(self.signing_key.sign(message.as_bytes()).to_bytes()).into_string()
        }

        fn claim_for(&self, ref_code: &str) -> SignedClaim {
            let message = format!("Claiming referral with code: {}", ref_code);
            let signature = self.sign(&message);
            SignedClaim {
                public_key: self.public_key.clone(),
                ref_code: ref_code.to_string(),
                message,
                signature,
            }
        }
    }

    fn service() -> ReferralService {
        ReferralService::new(Arc::new(MemoryReferralStore::new()))
    }

    #[tokio::test]
    async fn valid_claim_binds_key_to_code() {
        let service = service();
        let wallet = Wallet::generate();

        let receipt = service.claim(wallet.claim_for("AB12CD34")).await.unwrap();
        assert_eq!(receipt.public_key, wallet.public_key);
        assert_eq!(receipt.ref_code, "AB12CD34");
        assert_eq!(receipt.storage, "memory");

        let dump = service.dump_state().await.unwrap();
        assert_eq!(dump.binding_count, 1);
        assert_eq!(dump.codes[0].ref_code, "AB12CD34");
        assert_eq!(dump.codes[0].referred_count, 1);
    }

    #[tokio::test]
    async fn short_public_key_is_rejected_before_anything_else() {
        let service = service();
        let claim = SignedClaim {
            public_key: "tooShort12".to_string(),
            ref_code: "AB12CD34".to_string(),
            message: "Claiming referral with code: AB12CD34".to_string(),
            signature: "irrelevant".to_string(),
        };

        let err = service.claim(claim).await.unwrap_err();
        assert!(matches!(err, ReferralNodeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn bad_signature_is_an_authentication_error() {
        let service = service();
        let wallet = Wallet::generate();
        let impostor = Wallet::generate();

        let message = "Claiming referral with code: AB12CD34".to_string();
        let claim = SignedClaim {
            public_key: wallet.public_key.clone(),
            ref_code: "AB12CD34".to_string(),
            signature: impostor.sign(&message),
            message,
        };

        let err = service.claim(claim).await.unwrap_err();
        assert!(matches!(err, ReferralNodeError::Authentication(_)));
    }

    #[tokio::test]
    async fn signed_message_must_contain_the_presented_code() {
        let service = service();
        let wallet = Wallet::generate();

        // Valid signature over a message about a different code
        let mut claim = wallet.claim_for("AB12CD34");
        claim.ref_code = "ZZ99ZZ99".to_string();

        let err = service.claim(claim).await.unwrap_err();
        assert!(matches!(err, ReferralNodeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn second_claim_conflicts_and_keeps_the_original_binding() {
        let service = service();
        let wallet = Wallet::generate();

        service.claim(wallet.claim_for("AB12CD34")).await.unwrap();

        // Same code again
        let err = service.claim(wallet.claim_for("AB12CD34")).await.unwrap_err();
        assert!(matches!(err, ReferralNodeError::AlreadyReferred(_)));

        // Different code, fresh valid signature
        let err = service.claim(wallet.claim_for("EE55FF66")).await.unwrap_err();
        assert!(matches!(err, ReferralNodeError::AlreadyReferred(_)));

        let dump = service.dump_state().await.unwrap();
        assert_eq!(dump.binding_count, 1);
        assert_eq!(dump.bindings[0].ref_code, "AB12CD34");
    }

    #[tokio::test]
    async fn self_referral_is_not_specially_disallowed() {
        let service = service();
        let wallet = Wallet::generate();
        let own_code = crypto::derive_ref_code(&wallet.public_key);

        let receipt = service.claim(wallet.claim_for(&own_code)).await.unwrap();
        assert_eq!(receipt.ref_code, own_code);
    }

    #[tokio::test]
    async fn user_info_derives_code_and_reports_zero_points() {
        let service = service();
        let wallet = Wallet::generate();

        let info = service.user_info(&wallet.public_key).await.unwrap();
        assert_eq!(info.ref_code, crypto::derive_ref_code(&wallet.public_key));
        assert_eq!(info.points, 0);

        let err = service.user_info("tooShort12").await.unwrap_err();
        assert!(matches!(err, ReferralNodeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn dump_redacts_referred_keys() {
        let service = service();
        let wallet = Wallet::generate();

        service.claim(wallet.claim_for("AB12CD34")).await.unwrap();

        let dump = service.dump_state().await.unwrap();
        let shown = &dump.bindings[0].public_key;
        assert_ne!(shown, &wallet.public_key);
        assert!(shown.contains("..."));
        assert!(wallet.public_key.starts_with(&shown[..6]));
    }

    /// Store whose binding commit fails once before recovering.
    struct FlakyStore {
        inner: MemoryReferralStore,
        fail_next_commit: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl ReferralStore for FlakyStore {
        async fn get_binding(&self, public_key: &str) -> crate::error::Result<Option<String>> {
            self.inner.get_binding(public_key).await
        }

        async fn set_binding_if_absent(
            &self,
            public_key: &str,
            ref_code: &str,
        ) -> crate::error::Result<bool> {
            if self
                .fail_next_commit
                .swap(false, std::sync::atomic::Ordering::SeqCst)
            {
                return Err(ReferralNodeError::Storage("disk full".into()));
            }
            self.inner.set_binding_if_absent(public_key, ref_code).await
        }

        async fn add_to_reverse_index(
            &self,
            ref_code: &str,
            public_key: &str,
        ) -> crate::error::Result<()> {
            self.inner.add_to_reverse_index(ref_code, public_key).await
        }

        async fn list_all(&self) -> crate::error::Result<ReferralSnapshot> {
            self.inner.list_all().await
        }

        fn backend_name(&self) -> &'static str {
            self.inner.backend_name()
        }
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_partial_state_and_a_retry_succeeds() {
        let service = ReferralService::new(Arc::new(FlakyStore {
            inner: MemoryReferralStore::new(),
            fail_next_commit: std::sync::atomic::AtomicBool::new(true),
        }));
        let wallet = Wallet::generate();

        let err = service.claim(wallet.claim_for("AB12CD34")).await.unwrap_err();
        assert!(matches!(err, ReferralNodeError::Storage(_)));

        // Nothing landed: no binding, no reverse-index entry
        let dump = service.dump_state().await.unwrap();
        assert_eq!(dump.binding_count, 0);
        assert!(dump.codes.is_empty());

        // The same claim goes through once the store recovers
        let receipt = service.claim(wallet.claim_for("AB12CD34")).await.unwrap();
        assert_eq!(receipt.ref_code, "AB12CD34");

        let dump = service.dump_state().await.unwrap();
        assert_eq!(dump.binding_count, 1);
        assert_eq!(dump.codes[0].referred_count, 1);
    }

    #[tokio::test]
    async fn concurrent_claims_for_one_key_have_a_single_winner() {
        let service = Arc::new(service());
        let wallet = Wallet::generate();

        let codes = ["AA000011", "BB000022", "CC000033", "DD000044", "EE000055"];
        let mut handles = Vec::new();
        for code in codes {
            let service = service.clone();
            let claim = wallet.claim_for(code);
            handles.push(tokio::spawn(async move { service.claim(claim).await }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ReferralNodeError::AlreadyReferred(_)) => conflicts += 1,
                Err(other) => panic!("unexpected claim outcome: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(conflicts, codes.len() - 1);

        let dump = service.dump_state().await.unwrap();
        assert_eq!(dump.binding_count, 1);
    }
}
