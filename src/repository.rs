use crate::models::User;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Abstract contract for user persistence, keeping handlers independent of
/// the concrete backend (Postgres in production, in-memory mocks in tests).
///
/// `Send + Sync + async_trait` make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Resolves a user by primary key. Used by the token filter to confirm
    /// that a token's subject still maps to a live account.
    async fn get_user(&self, id: Uuid) -> Option<User>;

    /// Creates or refreshes a user from a successful OAuth2 login, keyed on
    /// the unique `(provider, subject)` pair. On conflict the profile fields
    /// and `last_login` are updated. Returns `None` on database failure.
    async fn upsert_oauth_user(
        &self,
        provider: &str,
        subject: &str,
        email: &str,
        display_name: Option<String>,
    ) -> Option<User>;
}

/// RepositoryState
///
/// The concrete type used to share persistence access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, provider, subject, email, display_name, created_at, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user error: {:?}", e);
            None
        })
    }

    /// upsert_oauth_user
    ///
    /// Single round trip: insert the row or, when the `(provider, subject)`
    /// identity already exists, refresh its profile and stamp `last_login`.
    async fn upsert_oauth_user(
        &self,
        provider: &str,
        subject: &str,
        email: &str,
        display_name: Option<String>,
    ) -> Option<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, provider, subject, email, display_name, created_at, last_login)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (provider, subject) DO UPDATE
                SET email = EXCLUDED.email,
                    display_name = COALESCE(EXCLUDED.display_name, users.display_name),
                    last_login = NOW()
            RETURNING id, provider, subject, email, display_name, created_at, last_login
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(provider)
        .bind(subject)
        .bind(email)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("upsert_oauth_user error: {:?}", e);
            None
        })
    }
}
