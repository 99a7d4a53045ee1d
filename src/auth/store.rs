use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Connection, SqlitePool,
};
use std::{str::FromStr, sync::Arc};
use tokio::task::{self, JoinError};
use tracing::{debug, info, instrument, warn};

use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::db::repo;

// Verified against when the username is unknown, so both login failures cost a hash.
const DUMMY_PASSWORD: &str = "formauth-unknown-user";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("password worker failed: {0}")]
    Worker(#[from] JoinError),
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreOptions {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// Handle to the `users` table. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
    dummy_hash: Arc<str>,
}

impl CredentialStore {
    /// Connects to the database and creates the `users` table if needed.
    ///
    /// An in-memory database only lives as long as its connection, so it gets
    /// exactly one connection that is never recycled.
    #[instrument(skip_all, fields(url = %options.database_url))]
    pub async fn open(options: &StoreOptions) -> Result<Self, StoreError> {
        let connect =
            SqliteConnectOptions::from_str(&options.database_url)?.create_if_missing(true);

        let pool_options = if options.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections.max(1))
        };

        let pool = pool_options.connect_with(connect).await?;
        repo::create_user_table(&pool).await?;

        let dummy_hash = task::spawn_blocking(|| hash_password(DUMMY_PASSWORD)).await??;

        info!("credential store ready");

        Ok(Self {
            pool,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Stores a new user with a salted hash of `password`.
    ///
    /// Duplicates are detected from the `UNIQUE` constraint on insert, so two
    /// concurrent registrations of one name cannot both succeed.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let plaintext = password.to_owned();
        let hash = task::spawn_blocking(move || hash_password(&plaintext)).await??;

        match repo::insert_user(&self.pool, username, &hash).await {
            Ok(id) => {
                info!(user_id = id, "user registered");
                Ok(())
            }
            Err(err) if repo::is_username_unique_violation(&err) => {
                debug!("username already taken");
                Err(StoreError::DuplicateUsername)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns whether `password` matches the stored hash for `username`.
    ///
    /// An unknown username yields `Ok(false)`, same as a wrong password.
    #[instrument(skip(self, password))]
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let user = repo::find_user_by_username(&self.pool, username).await?;

        let (stored_hash, known) = match user {
            Some(user) => {
                debug!(user_id = user.id, "user found");
                (user.password_hash, true)
            }
            None => (self.dummy_hash.to_string(), false),
        };

        let plaintext = password.to_owned();
        let matches =
            task::spawn_blocking(move || verify_password(&plaintext, &stored_hash))
                .await??;

        if !known {
            debug!("login for unknown username");
            return Ok(false);
        }
        if !matches {
            warn!("password mismatch");
        }

        Ok(matches)
    }

    /// Checks that a connection can be acquired and answers a ping.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::find_user_by_username;

    async fn memory_store() -> CredentialStore {
        CredentialStore::open(&StoreOptions::new("sqlite::memory:"))
            .await
            .expect("in-memory store")
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let store = memory_store().await;

        store.register("a@x.com", "pw123456").await.unwrap();

        assert!(store.verify("a@x.com", "pw123456").await.unwrap());
        assert!(!store.verify("a@x.com", "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first_user() {
        let store = memory_store().await;
        store.register("a@x.com", "pw123456").await.unwrap();

        let result = store.register("a@x.com", "other").await;

        assert!(matches!(result, Err(StoreError::DuplicateUsername)));
        assert!(store.verify("a@x.com", "pw123456").await.unwrap());
        assert!(!store.verify("a@x.com", "other").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_username_is_not_an_error() {
        let store = memory_store().await;

        assert!(!store.verify("nobody@x.com", "pw123456").await.unwrap());
        // the dummy password must not open an unknown account either
        assert!(!store.verify("nobody@x.com", DUMMY_PASSWORD).await.unwrap());
    }

    #[tokio::test]
    async fn test_plaintext_is_never_stored() {
        let store = memory_store().await;
        store.register("a@x.com", "pw123456").await.unwrap();

        let user = find_user_by_username(store.pool(), "a@x.com")
            .await
            .unwrap()
            .unwrap();

        assert_ne!(user.password_hash, "pw123456");
        assert!(!user.password_hash.contains("pw123456"));
    }

    #[tokio::test]
    async fn test_usernames_are_case_sensitive() {
        let store = memory_store().await;
        store.register("A@x.com", "pw123456").await.unwrap();

        store.register("a@x.com", "pw123456").await.unwrap();
        assert!(!store.verify("a@X.com", "pw123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_registration_has_one_winner() {
        let store = memory_store().await;

        let attempts: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.register("race@x.com", &format!("pw{i}")).await })
            })
            .collect();

        let mut successes = 0;
        let mut duplicates = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(()) => successes += 1,
                Err(StoreError::DuplicateUsername) => duplicates += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 3);
    }

    #[tokio::test]
    async fn test_malformed_stored_hash_is_an_error() {
        let store = memory_store().await;
        repo::insert_user(store.pool(), "legacy", "plaintext")
            .await
            .unwrap();

        let result = store.verify("legacy", "plaintext").await;

        assert!(matches!(result, Err(StoreError::Password(_))));
    }

    #[tokio::test]
    async fn test_closed_pool_is_a_storage_error() {
        let store = memory_store().await;
        store.pool().close().await;

        assert!(matches!(
            store.verify("a@x.com", "pw123456").await,
            Err(StoreError::Storage(_))
        ));
        assert!(store.ping().await.is_err());
    }
    fn file_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite://{}", dir.path().join("auth.db").display())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions::new(file_url(&dir)).with_max_connections(8);
        let store = CredentialStore::open(&options).await.unwrap();

        let attempts: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.register("race@x.com", &format!("pw{i}")).await })
            })
            .collect();

        let mut successes = 0;
        let mut duplicates = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(()) => successes += 1,
                Err(StoreError::DuplicateUsername) => duplicates += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 7);
    }

    #[tokio::test]
    async fn test_open_fails_when_database_cannot_be_created() {
        let result =
            CredentialStore::open(&StoreOptions::new("sqlite:///nonexistent-dir/a.db")).await;

        assert!(matches!(result, Err(StoreError::Storage(_))));
    }

    #[tokio::test]
    async fn test_users_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions::new(file_url(&dir)).with_max_connections(2);

        let store = CredentialStore::open(&options).await.unwrap();
        store.register("a@x.com", "pw123456").await.unwrap();
        store.pool().close().await;

        assert!(dir.path().join("auth.db").exists());

        let reopened = CredentialStore::open(&options).await.unwrap();
        assert!(reopened.verify("a@x.com", "pw123456").await.unwrap());
        assert!(matches!(
            reopened.register("a@x.com", "other").await,
            Err(StoreError::DuplicateUsername)
        ));
    }
}
