use crate::error::Result;
use crate::types::{CodeReferrals, ReferralBinding, ReferralSnapshot};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory referral store.
///
/// Backed by concurrent maps; operations cannot fail and nothing survives a
/// process restart. The conditional binding write goes through the map's
/// entry API, which holds the shard lock across the occupancy check and the
/// insert, so concurrent claims for one key still see exactly one winner.
#[derive(Clone, Default)]
pub struct MemoryReferralStore {
    /// referred key -> referring code
    bindings: Arc<DashMap<String, String>>,
    /// referring code -> referred keys
    referrals: Arc<DashMap<String, Vec<String>>>,
}

impl MemoryReferralStore {
    pub fn new() -> Self {
        Self {
            bindings: Arc::new(DashMap::new()),
            referrals: Arc::new(DashMap::new()),
        }
    }

    /// Idempotent reverse-index insert.
    fn index_key(&self, ref_code: &str, public_key: &str) {
        let mut referred = self.referrals.entry(ref_code.to_string()).or_default();
        if !referred.iter().any(|key| key == public_key) {
            referred.push(public_key.to_string());
        }
    }
}

#[async_trait]
impl super::ReferralStore for MemoryReferralStore {
    async fn get_binding(&self, public_key: &str) -> Result<Option<String>> {
        Ok(self
            .bindings
            .get(public_key)
            .map(|code| code.value().clone()))
    }

    async fn set_binding_if_absent(&self, public_key: &str, ref_code: &str) -> Result<bool> {
        match self.bindings.entry(public_key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(ref_code.to_string());
                // The winning write maintains the reverse index itself
                self.index_key(ref_code, public_key);
                Ok(true)
            }
        }
    }

    async fn add_to_reverse_index(&self, ref_code: &str, public_key: &str) -> Result<()> {
        self.index_key(ref_code, public_key);
        Ok(())
    }

    async fn list_all(&self) -> Result<ReferralSnapshot> {
        let mut bindings: Vec<ReferralBinding> = self
            .bindings
            .iter()
            .map(|entry| ReferralBinding {
                public_key: entry.key().clone(),
                ref_code: entry.value().clone(),
            })
            .collect();
        bindings.sort_by(|a, b| a.public_key.cmp(&b.public_key));

        let mut codes: Vec<CodeReferrals> = self
            .referrals
            .iter()
            .map(|entry| CodeReferrals {
                ref_code: entry.key().clone(),
                referred_count: entry.value().len(),
            })
            .collect();
        codes.sort_by(|a, b| a.ref_code.cmp(&b.ref_code));

        Ok(ReferralSnapshot { bindings, codes })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
