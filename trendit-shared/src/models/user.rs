//! User model, roles and account settings
//!
//! A user registers once and immediately owns a wallet (balance 0) and the `customer`
//! role. `advertiser` is granted the first time they create a task; `admin` is granted
//! out of band.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE user_role AS ENUM ('customer', 'advertiser', 'admin');
//!
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     email CITEXT NOT NULL UNIQUE,
//!     username CITEXT NOT NULL UNIQUE,
//!     password_hash VARCHAR(255) NOT NULL,
//!     name VARCHAR(255),
//!     gender VARCHAR(20),
//!     country VARCHAR(100),
//!     state VARCHAR(100),
//!     two_fa_method VARCHAR(20),
//!     membership_fee_paid BOOLEAN NOT NULL DEFAULT FALSE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     last_login_at TIMESTAMPTZ
//! );
//!
//! CREATE TABLE user_roles (
//!     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     role user_role NOT NULL,
//!     granted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (user_id, role)
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::models::user::{User, CreateUser};
//! use trendit_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//!
//! let user = User::register(&pool, CreateUser {
//!     email: "ada@example.com".to_string(),
//!     username: "ada".to_string(),
//!     password_hash: "$argon2id$...".to_string(),
//!     name: Some("Ada Obi".to_string()),
//! }).await?;
//!
//! let found = User::find_by_login(&pool, "ada").await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, password_hash, name, gender, country, state, \
     two_fa_method, membership_fee_paid, created_at, updated_at, last_login_at";

/// Role held by a user. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Advertiser,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Advertiser => "advertiser",
            UserRole::Admin => "admin",
        }
    }
}

/// Error type for account settings changes
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid two-factor method")]
    InvalidTwoFactorMethod,

    #[error("Appearance must be light, dark or system")]
    InvalidAppearance,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Supported second factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorMethod {
    Email,
    GoogleAuth,
    Phone,
}

impl TwoFactorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoFactorMethod::Email => "email",
            TwoFactorMethod::GoogleAuth => "google_auth",
            TwoFactorMethod::Phone => "phone",
        }
    }

    /// Parses a client-supplied method. `None` (or an empty string) disables 2FA.
    pub fn parse(value: Option<&str>) -> Result<Option<Self>, SettingsError> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some("email") => Ok(Some(TwoFactorMethod::Email)),
            Some("google_auth") => Ok(Some(TwoFactorMethod::GoogleAuth)),
            Some("phone") => Ok(Some(TwoFactorMethod::Phone)),
            Some(_) => Err(SettingsError::InvalidTwoFactorMethod),
        }
    }
}

/// A registered user
///
/// `password_hash` is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Case-insensitive (CITEXT)
    pub email: String,

    /// Case-insensitive (CITEXT)
    pub username: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,

    /// `email`, `google_auth`, `phone` or `None` when disabled
    pub two_fa_method: Option<String>,

    pub membership_fee_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for registering a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub username: String,

    /// Argon2id hash, never the plaintext password
    pub password_hash: String,

    pub name: Option<String>,
}

/// Profile fields a user may change. Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
}

impl User {
    /// Registers a user together with their wallet and the `customer` role
    ///
    /// Runs in one transaction so a user never exists without a wallet.
    ///
    /// # Errors
    ///
    /// Unique violations on `users_email_key` / `users_username_key` surface as
    /// `sqlx::Error::Database`.
    pub async fn register(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash, name)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.email)
        .bind(data.username)
        .bind(data.password_hash)
        .bind(data.name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        Self::grant_role(&mut *tx, user.id, UserRole::Customer).await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "registered user");
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email or username (both case-insensitive)
    pub async fn find_by_login(pool: &PgPool, login: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $1 LIMIT 1"
        ))
        .bind(login)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Updates profile fields, leaving `None` fields untouched
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        for (column, value) in [
            ("name", &data.name),
            ("gender", &data.gender),
            ("country", &data.country),
            ("state", &data.state),
        ] {
            if value.is_some() {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);
        for value in [data.name, data.gender, data.country, data.state]
            .into_iter()
            .flatten()
        {
            q = q.bind(value);
        }

        q.fetch_optional(pool).await
    }

    /// Sets or clears the second factor
    pub async fn set_two_fa_method(
        pool: &PgPool,
        id: Uuid,
        method: Option<TwoFactorMethod>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET two_fa_method = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(method.map(|m| m.as_str()))
        .fetch_optional(pool)
        .await
    }

    /// Marks the membership fee as paid. Returns false if it already was.
    pub async fn mark_membership_paid<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET membership_fee_paid = TRUE, updated_at = NOW()
            WHERE id = $1 AND membership_fee_paid = FALSE
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Grants a role; granting a role already held is a no-op
    pub async fn grant_role<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role) VALUES ($1, $2)
            ON CONFLICT (user_id, role) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn roles(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserRole>, sqlx::Error> {
        sqlx::query_scalar::<_, UserRole>(
            "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn has_role(
        pool: &PgPool,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(pool)
        .await
    }

    /// Lists users, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_as_str() {
        assert_eq!(UserRole::Customer.as_str(), "customer");
        assert_eq!(UserRole::Advertiser.as_str(), "advertiser");
        assert_eq!(UserRole::Admin.as_str(), "admin");
    }

    #[test]
    fn test_two_factor_parse() {
        assert_eq!(TwoFactorMethod::parse(None).unwrap(), None);
        assert_eq!(TwoFactorMethod::parse(Some("")).unwrap(), None);
        assert_eq!(
            TwoFactorMethod::parse(Some("google_auth")).unwrap(),
            Some(TwoFactorMethod::GoogleAuth)
        );
        assert_eq!(
            TwoFactorMethod::parse(Some("phone")).unwrap(),
            Some(TwoFactorMethod::Phone)
        );
        assert!(matches!(
            TwoFactorMethod::parse(Some("sms")),
            Err(SettingsError::InvalidTwoFactorMethod)
        ));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: None,
            gender: None,
            country: None,
            state: None,
            two_fa_method: None,
            membership_fee_paid: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ada");
    }
}
