//! SQLite persistence: users, sessions, saved configs, probe histories.
//!
//! Session tokens are random 256-bit values handed to the browser; only
//! their SHA-256 hash is stored, so a leaked database cannot be replayed
//! into live sessions.

use {
    argon2::{
        Argon2,
        password_hash::{
            PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
        },
    },
    serde::Serialize,
    sha2::{Digest, Sha256},
    sqlx::SqlitePool,
};

use modelprobe_oauth::OAuthUserInfo;

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub username: Option<String>,
    pub oauth_provider: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavedConfig {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub base_url: String,
    /// Vault blob, never plaintext.
    pub api_key_enc: String,
    pub provider: String,
    pub created_at: String,
    pub updated_at: String,
}

/// History row without the per-model results payload; what listings return.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub id: i64,
    pub config_id: Option<i64>,
    pub config_name: String,
    pub base_url: String,
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub config_id: Option<i64>,
    pub config_name: String,
    pub base_url: String,
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub results_json: String,
    pub created_at: String,
}

/// Partial update for a saved config. `None` leaves the column alone.
#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub api_key_enc: Option<String>,
    pub provider: Option<String>,
}

impl ConfigUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.base_url.is_none()
            && self.api_key_enc.is_none()
            && self.provider.is_none()
    }
}

pub struct NewHistory<'a> {
    pub config_id: Option<i64>,
    pub config_name: &'a str,
    pub base_url: &'a str,
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub results_json: &'a str,
}

// ── Store ────────────────────────────────────────────────────────────────────

/// Multi-user application store backed by SQLite.
pub struct Store {
    pool: SqlitePool,
}

const USER_COLUMNS: &str = "id, email, username, oauth_provider, avatar_url, created_at";

impl Store {
    /// Create the store and initialize tables.
    pub async fn new(pool: SqlitePool) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE,
                username TEXT,
                password_hash TEXT,
                oauth_provider TEXT,
                oauth_id TEXT,
                avatar_url TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (oauth_provider, oauth_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS auth_sessions (
                token_hash TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS saved_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                base_url TEXT NOT NULL DEFAULT '',
                api_key_enc TEXT NOT NULL,
                provider TEXT NOT NULL DEFAULT 'openai',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS check_histories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                config_id INTEGER REFERENCES saved_configs(id),
                config_name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                total INTEGER NOT NULL,
                success INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                results_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────

    pub async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn user_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    /// Create a password-based user. Caller checks email uniqueness first
    /// for a clean 409; the UNIQUE constraint still backstops races.
    pub async fn create_user(&self, email: &str, password: &str) -> anyhow::Result<User> {
        let hash = hash_password(password)?;
        let id: i64 =
            sqlx::query_scalar("INSERT INTO users (email, password_hash) VALUES (?, ?) RETURNING id")
                .bind(email)
                .bind(&hash)
                .fetch_one(&self.pool)
                .await?;
        self.user_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {id} vanished after insert"))
    }

    /// Verify email + password, returning the user on success.
    pub async fn verify_login(&self, email: &str, password: &str) -> anyhow::Result<Option<User>> {
        let row: Option<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        let Some((id, Some(hash))) = row else {
            return Ok(None);
        };
        if !verify_password(password, &hash) {
            return Ok(None);
        }
        self.user_by_id(id).await
    }

    /// Find the user for an OAuth identity, creating it on first login and
    /// refreshing profile fields on every later one.
    pub async fn upsert_oauth_user(&self, info: &OAuthUserInfo) -> anyhow::Result<User> {
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE oauth_provider = ? AND oauth_id = ?")
                .bind(info.provider)
                .bind(&info.oauth_id)
                .fetch_optional(&self.pool)
                .await?;

        let id = match existing {
            Some((id,)) => {
                sqlx::query(
                    "UPDATE users SET username = ?, avatar_url = ?, email = COALESCE(?, email)
                     WHERE id = ?",
                )
                .bind(&info.username)
                .bind(&info.avatar_url)
                .bind(&info.email)
                .bind(id)
                .execute(&self.pool)
                .await?;
                id
            },
            None => {
                sqlx::query_scalar(
                    "INSERT INTO users (email, username, oauth_provider, oauth_id, avatar_url)
                     VALUES (?, ?, ?, ?, ?) RETURNING id",
                )
                .bind(&info.email)
                .bind(&info.username)
                .bind(info.provider)
                .bind(&info.oauth_id)
                .bind(&info.avatar_url)
                .fetch_one(&self.pool)
                .await?
            },
        };
        self.user_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("oauth user {id} vanished"))
    }

    // ── Sessions ─────────────────────────────────────────────────────────

    /// Create a session for the user; returns the raw token for the cookie.
    pub async fn create_session(&self, user_id: i64, ttl_days: i64) -> anyhow::Result<String> {
        let token = generate_token();
        sqlx::query(
            "INSERT INTO auth_sessions (token_hash, user_id, expires_at)
             VALUES (?, ?, datetime('now', ?))",
        )
        .bind(sha256_hex(&token))
        .bind(user_id)
        .bind(format!("+{ttl_days} days"))
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    /// Resolve a raw session token to its user, if valid and unexpired.
    pub async fn session_user(&self, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.email, u.username, u.oauth_provider, u.avatar_url, u.created_at
             FROM auth_sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ? AND s.expires_at > datetime('now')",
        )
        .bind(sha256_hex(token))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn delete_session(&self, token: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
            .bind(sha256_hex(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clean up expired sessions.
    pub async fn cleanup_expired_sessions(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ── Saved configs ────────────────────────────────────────────────────

    pub async fn list_configs(&self, user_id: i64) -> anyhow::Result<Vec<SavedConfig>> {
        let rows = sqlx::query_as::<_, SavedConfig>(
            "SELECT * FROM saved_configs WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Fetch by id alone; ownership is the caller's check so that a foreign
    /// config can answer 403 instead of 404.
    pub async fn get_config(&self, id: i64) -> anyhow::Result<Option<SavedConfig>> {
        let row = sqlx::query_as::<_, SavedConfig>("SELECT * FROM saved_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn create_config(
        &self,
        user_id: i64,
        name: &str,
        base_url: &str,
        api_key_enc: &str,
        provider: &str,
    ) -> anyhow::Result<SavedConfig> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO saved_configs (user_id, name, base_url, api_key_enc, provider)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(name)
        .bind(base_url)
        .bind(api_key_enc)
        .bind(provider)
        .fetch_one(&self.pool)
        .await?;
        self.get_config(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("config {id} vanished after insert"))
    }

    pub async fn update_config(
        &self,
        id: i64,
        user_id: i64,
        update: &ConfigUpdate,
    ) -> anyhow::Result<Option<SavedConfig>> {
        sqlx::query(
            "UPDATE saved_configs SET
                name        = COALESCE(?, name),
                base_url    = COALESCE(?, base_url),
                api_key_enc = COALESCE(?, api_key_enc),
                provider    = COALESCE(?, provider),
                updated_at  = datetime('now')
             WHERE id = ? AND user_id = ?",
        )
        .bind(&update.name)
        .bind(&update.base_url)
        .bind(&update.api_key_enc)
        .bind(&update.provider)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        self.get_config(id).await
    }

    pub async fn delete_config(&self, id: i64, user_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM saved_configs WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Probe histories ──────────────────────────────────────────────────

    pub async fn insert_history(
        &self,
        user_id: i64,
        new: &NewHistory<'_>,
    ) -> anyhow::Result<HistorySummary> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO check_histories
                (user_id, config_id, config_name, base_url, total, success, failed, results_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(new.config_id)
        .bind(new.config_name)
        .bind(new.base_url)
        .bind(new.total)
        .bind(new.success)
        .bind(new.failed)
        .bind(new.results_json)
        .fetch_one(&self.pool)
        .await?;

        let summary = sqlx::query_as::<_, HistorySummary>(
            "SELECT id, config_id, config_name, base_url, total, success, failed, created_at
             FROM check_histories WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    /// Newest-first page of the user's history, without results payloads.
    /// Returns the page plus the total row count for the filter.
    pub async fn list_histories(
        &self,
        user_id: i64,
        page: i64,
        limit: i64,
        search: Option<&str>,
    ) -> anyhow::Result<(Vec<HistorySummary>, i64)> {
        let pattern = search.map(|s| format!("%{s}%"));
        let offset = (page - 1) * limit;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM check_histories
             WHERE user_id = ? AND (? IS NULL OR config_name LIKE ?)",
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, HistorySummary>(
            "SELECT id, config_id, config_name, base_url, total, success, failed, created_at
             FROM check_histories
             WHERE user_id = ? AND (? IS NULL OR config_name LIKE ?)
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    pub async fn get_history(&self, id: i64) -> anyhow::Result<Option<(i64, HistoryRecord)>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            user_id: i64,
            #[sqlx(flatten)]
            record: HistoryRecord,
        }

        let row = sqlx::query_as::<_, Row>(
            "SELECT user_id, id, config_id, config_name, base_url, total, success, failed,
                    results_json, created_at
             FROM check_histories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| (r.user_id, r.record)))
    }

    pub async fn delete_history(&self, id: i64, user_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM check_histories WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash_str: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash_str) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn generate_token() -> String {
    use {base64::Engine, rand::RngCore};

    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        Store::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn register_and_login_round_trip() {
        let store = memory_store().await;
        let user = store.create_user("a@example.com", "hunter22").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@example.com"));

        let ok = store.verify_login("a@example.com", "hunter22").await.unwrap();
        assert_eq!(ok.unwrap().id, user.id);

        let bad = store.verify_login("a@example.com", "wrong").await.unwrap();
        assert!(bad.is_none());
        let unknown = store.verify_login("b@example.com", "hunter22").await.unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn sessions_validate_and_expire_on_delete() {
        let store = memory_store().await;
        let user = store.create_user("a@example.com", "hunter22").await.unwrap();

        let token = store.create_session(user.id, 7).await.unwrap();
        assert_eq!(store.session_user(&token).await.unwrap().unwrap().id, user.id);
        assert!(store.session_user("bogus").await.unwrap().is_none());

        store.delete_session(&token).await.unwrap();
        assert!(store.session_user(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_table_stores_hashes_not_tokens() {
        let store = memory_store().await;
        let user = store.create_user("a@example.com", "hunter22").await.unwrap();
        let token = store.create_session(user.id, 7).await.unwrap();

        let raw_hit: Option<(String,)> =
            sqlx::query_as("SELECT token_hash FROM auth_sessions WHERE token_hash = ?")
                .bind(&token)
                .fetch_optional(&store.pool)
                .await
                .unwrap();
        assert!(raw_hit.is_none(), "raw token must not be stored");
    }

    #[tokio::test]
    async fn oauth_upsert_is_stable_across_logins() {
        let store = memory_store().await;
        let info = OAuthUserInfo {
            provider: "github",
            oauth_id: "42".into(),
            username: "alice".into(),
            email: Some("alice@example.com".into()),
            avatar_url: None,
        };

        let first = store.upsert_oauth_user(&info).await.unwrap();
        let again = store
            .upsert_oauth_user(&OAuthUserInfo {
                username: "alice-renamed".into(),
                ..info
            })
            .await
            .unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.username.as_deref(), Some("alice-renamed"));
    }

    #[tokio::test]
    async fn config_crud_is_scoped_to_the_owner() {
        let store = memory_store().await;
        let alice = store.create_user("a@example.com", "hunter22").await.unwrap();
        let bob = store.create_user("b@example.com", "hunter22").await.unwrap();

        let cfg = store
            .create_config(alice.id, "prod", "https://api.example.com", "blob", "openai")
            .await
            .unwrap();

        assert_eq!(store.list_configs(alice.id).await.unwrap().len(), 1);
        assert!(store.list_configs(bob.id).await.unwrap().is_empty());

        // Bob cannot delete Alice's config.
        assert!(!store.delete_config(cfg.id, bob.id).await.unwrap());
        assert!(store.delete_config(cfg.id, alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn partial_config_update_keeps_other_columns() {
        let store = memory_store().await;
        let user = store.create_user("a@example.com", "hunter22").await.unwrap();
        let cfg = store
            .create_config(user.id, "prod", "https://api.example.com", "blob1", "openai")
            .await
            .unwrap();

        let updated = store
            .update_config(
                cfg.id,
                user.id,
                &ConfigUpdate {
                    name: Some("staging".into()),
                    ..ConfigUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "staging");
        assert_eq!(updated.base_url, "https://api.example.com");
        assert_eq!(updated.api_key_enc, "blob1");
    }

    #[tokio::test]
    async fn history_pagination_and_search() {
        let store = memory_store().await;
        let user = store.create_user("a@example.com", "hunter22").await.unwrap();

        for i in 0..5 {
            store
                .insert_history(
                    user.id,
                    &NewHistory {
                        config_id: None,
                        config_name: if i % 2 == 0 { "prod run" } else { "dev run" },
                        base_url: "https://api.example.com",
                        total: 3,
                        success: 2,
                        failed: 1,
                        results_json: "[]",
                    },
                )
                .await
                .unwrap();
        }

        let (page, total) = store.list_histories(user.id, 1, 2, None).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        // Newest first.
        assert!(page[0].id > page[1].id);

        let (hits, hit_total) = store
            .list_histories(user.id, 1, 10, Some("prod"))
            .await
            .unwrap();
        assert_eq!(hit_total, 3);
        assert!(hits.iter().all(|h| h.config_name.contains("prod")));
    }
}
