/// User model and database operations
///
/// A user signs up either with email and password or with a Facebook access
/// token. Social-only accounts have no `password_hash`. Every account gets a
/// TOTP secret at creation so 2FA can be switched on later without a schema
/// change.
///
/// # Example
///
/// ```no_run
/// use estatehub_shared::models::user::{CreateUser, User};
/// use estatehub_shared::auth::totp::TotpSecret;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "testq@gmail.com".to_string(),
///     first_name: "Staszek".to_string(),
///     last_name: "Kowalski".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     totp_secret: TotpSecret::generate().as_base32().to_string(),
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::email_token::TokenSubject;
use crate::auth::totp::{TotpError, TotpSecret};

const USER_COLUMNS: &str = r#"
    id, email, username, first_name, last_name, password_hash, date_of_birth,
    is_industry_professional, is_email_verified, is_2fa_enabled, is_active,
    totp_secret, fb_user_id, google_user_id, linkedin_user_id, agency_id,
    created_at, updated_at, last_login_at
"#;

/// User account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,

    /// Argon2id PHC string; `None` for social-only accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub date_of_birth: Option<DateTime<Utc>>,
    pub is_industry_professional: bool,
    pub is_email_verified: bool,
    pub is_2fa_enabled: bool,
    pub is_active: bool,

    /// Base32 TOTP secret
    #[serde(skip_serializing)]
    pub totp_secret: String,

    pub fb_user_id: Option<String>,
    pub google_user_id: Option<String>,
    pub linkedin_user_id: Option<String>,

    /// Agent (agency) this user acts for
    pub agency_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: Option<String>,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub is_industry_professional: bool,
    pub totp_secret: String,
    pub fb_user_id: Option<String>,
}

impl User {
    /// State an email verification token is bound to
    pub fn token_subject(&self) -> TokenSubject<'_> {
        TokenSubject {
            user_id: self.id,
            email_verified: self.is_email_verified,
            password_hash: self.password_hash.as_deref(),
        }
    }

    pub fn totp(&self) -> Result<TotpSecret, TotpError> {
        TotpSecret::from_base32(self.totp_secret.clone())
    }

    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` when the email is
    /// taken (case-insensitively), or on `users_fb_user_id_key` when the
    /// Facebook account is already linked.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password_hash,
                               date_of_birth, is_industry_professional, totp_secret, fb_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.email)
        .bind(data.username)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.password_hash)
        .bind(data.date_of_birth)
        .bind(data.is_industry_professional)
        .bind(data.totp_secret)
        .bind(data.fb_user_id)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_fb_user_id(
        pool: &PgPool,
        fb_user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE fb_user_id = $1"
        ))
        .bind(fb_user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1))")
                .bind(email)
                .fetch_one(pool)
                .await?;

        Ok(exists)
    }

    /// Marks the email verified. Returns false if the user doesn't exist.
    pub async fn mark_email_verified(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_email_verified = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Turns 2FA on with a fresh secret
    pub async fn enable_two_factor(
        pool: &PgPool,
        id: Uuid,
        secret: &TotpSecret,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_2fa_enabled = TRUE, totp_secret = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(secret.as_base32())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn disable_two_factor(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_2fa_enabled = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_agency(
        pool: &PgPool,
        id: Uuid,
        agency_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET agency_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(agency_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
