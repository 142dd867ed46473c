use crate::error::{ReferralNodeError, Result};
use crate::types::{CodeReferrals, ReferralBinding, ReferralSnapshot};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Durable SQLite-backed referral store.
///
/// Two independent namespaces: the binding table keyed by referred public key,
/// and the reverse-index table keyed by (code, key). The binding write uses
/// `INSERT OR IGNORE` and inspects the changed-row count, which is the atomic
/// conditional put the claim protocol requires; SQLite serializes writers, so
/// concurrent claims for one key cannot both observe a successful insert. The
/// winning write carries the reverse-index row in the same transaction, so a
/// half-written claim cannot survive a failure between the two tables.
///
/// Database work runs on the blocking thread pool; a stalled call stalls only
/// its own task.
pub struct SqliteReferralStore {
    db_path: PathBuf,
}

impl SqliteReferralStore {
    /// Open the store and initialize the schema.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            db_path: db_path.into(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        debug!("Initializing referral schema at {:?}", self.db_path);

        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ReferralNodeError::Storage(format!("Failed to create data directory: {}", e))
                })?;
            }
        }

        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS referral_bindings (
                public_key TEXT PRIMARY KEY,
                ref_code TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS referral_referrals (
                ref_code TEXT NOT NULL,
                public_key TEXT NOT NULL,
                PRIMARY KEY (ref_code, public_key)
            )",
            [],
        )?;

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| ReferralNodeError::Storage(format!("Failed to open database: {}", e)))?;
        // Writers are serialized; wait instead of failing with SQLITE_BUSY
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Run a closure against a fresh connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).map_err(|e| {
                ReferralNodeError::Storage(format!("Failed to open database: {}", e))
            })?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            op(conn)
        })
        .await
        .map_err(|e| ReferralNodeError::Storage(format!("Storage task panicked: {}", e)))?
    }
}

#[async_trait]
impl super::ReferralStore for SqliteReferralStore {
    async fn get_binding(&self, public_key: &str) -> Result<Option<String>> {
        let public_key = public_key.to_string();
        self.with_conn(move |conn| {
            let code = conn
                .query_row(
                    "SELECT ref_code FROM referral_bindings WHERE public_key = ?",
                    params![public_key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(code)
        })
        .await
    }

    async fn set_binding_if_absent(&self, public_key: &str, ref_code: &str) -> Result<bool> {
        let public_key = public_key.to_string();
        let ref_code = ref_code.to_string();
        self.with_conn(move |mut conn| {
            let created_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());

            // Binding and reverse-index rows commit together; a binding must
            // never become visible without its index entry.
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "INSERT OR IGNORE INTO referral_bindings (public_key, ref_code, created_at)
                 VALUES (?, ?, ?)",
                params![public_key, ref_code, created_at],
            )?;

            if changed == 1 {
                tx.execute(
                    "INSERT OR IGNORE INTO referral_referrals (ref_code, public_key)
                     VALUES (?, ?)",
                    params![ref_code, public_key],
                )?;
            }

            tx.commit()?;
            Ok(changed == 1)
        })
        .await
    }

    async fn add_to_reverse_index(&self, ref_code: &str, public_key: &str) -> Result<()> {
        let public_key = public_key.to_string();
        let ref_code = ref_code.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO referral_referrals (ref_code, public_key) VALUES (?, ?)",
                params![ref_code, public_key],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_all(&self) -> Result<ReferralSnapshot> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT public_key, ref_code FROM referral_bindings ORDER BY public_key",
            )?;
            let bindings = stmt
                .query_map([], |row| {
                    Ok(ReferralBinding {
                        public_key: row.get(0)?,
                        ref_code: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT ref_code, COUNT(*) FROM referral_referrals
                 GROUP BY ref_code ORDER BY ref_code",
            )?;
            let codes = stmt
                .query_map([], |row| {
                    Ok(CodeReferrals {
                        ref_code: row.get(0)?,
                        referred_count: row.get::<_, i64>(1)? as usize,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(ReferralSnapshot { bindings, codes })
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
