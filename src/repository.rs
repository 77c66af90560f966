use crate::{
    error::AppError,
    models::{Attachment, NewAttachment, Role, User},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so services
/// and handlers never see SQL. Every method returns a typed `Result`; a
/// missing row is `Ok(None)`, only genuine database faults are `Err`.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn get_all_users(&self) -> Result<Vec<User>, AppError>;
    // Derived query: users holding `role` whose active flag equals `active`.
    async fn get_users_by_role(&self, role: &str, active: bool) -> Result<Vec<User>, AppError>;
    async fn create_user(&self, user: &User) -> Result<User, AppError>;
    // Overwrites every mutable column of the row identified by `user.id`.
    async fn update_user(&self, user: &User) -> Result<User, AppError>;

    // --- Roles ---
    async fn get_roles(&self) -> Result<Vec<Role>, AppError>;
    async fn get_role(&self, name: &str) -> Result<Option<Role>, AppError>;

    // --- Attachments ---
    async fn create_attachment(&self, attachment: &NewAttachment) -> Result<Attachment, AppError>;
    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>, AppError>;
    // Returns true only if a row was removed.
    async fn delete_attachment(&self, id: Uuid) -> Result<bool, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
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
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, first_name, last_name, user_role, active, password_hash, created_at, updated_at
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// get_user_by_email
    ///
    /// Case-insensitive, since the uniqueness check in the service relies on it.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, first_name, last_name, user_role, active, password_hash, created_at, updated_at
               FROM users WHERE LOWER(email) = LOWER($1)"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_all_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, email, first_name, last_name, user_role, active, password_hash, created_at, updated_at
               FROM users ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn get_users_by_role(&self, role: &str, active: bool) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, email, first_name, last_name, user_role, active, password_hash, created_at, updated_at
               FROM users WHERE user_role = $1 AND active = $2 ORDER BY created_at ASC"#,
        )
        .bind(role)
        .bind(active)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let created = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, first_name, last_name, user_role, active, password_hash, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
               RETURNING id, email, first_name, last_name, user_role, active, password_hash, created_at, updated_at"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.user_role)
        .bind(user.active)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_user(&self, user: &User) -> Result<User, AppError> {
        let updated = sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET email = $2, first_name = $3, last_name = $4, user_role = $5,
                   active = $6, password_hash = $7, updated_at = NOW()
               WHERE id = $1
               RETURNING id, email, first_name, last_name, user_role, active, password_hash, created_at, updated_at"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.user_role)
        .bind(user.active)
        .bind(&user.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        // The service checks existence first; a vanished row means it was
        // deleted between the two statements.
        updated.ok_or_else(|| AppError::NotFound("user does not exist".to_string()))
    }

    async fn get_roles(&self) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>("SELECT name, label FROM roles ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn get_role(&self, name: &str) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT name, label FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn create_attachment(&self, attachment: &NewAttachment) -> Result<Attachment, AppError> {
        let created = sqlx::query_as::<_, Attachment>(
            r#"INSERT INTO attachments (id, file_name, file_size, file_type, checksum, created_at)
               VALUES ($1, $2, $3, $4, $5, NOW())
               RETURNING id, file_name, file_size, file_type, checksum, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&attachment.file_name)
        .bind(attachment.file_size)
        .bind(&attachment.file_type)
        .bind(&attachment.checksum)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>, AppError> {
        let attachment = sqlx::query_as::<_, Attachment>(
            "SELECT id, file_name, file_size, file_type, checksum, created_at FROM attachments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attachment)
    }

    async fn delete_attachment(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
