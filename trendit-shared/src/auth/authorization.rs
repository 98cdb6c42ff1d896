//! Role and ownership checks
//!
//! Roles are read from `user_roles` on every check rather than trusted from the token,
//! so revoking `admin` takes effect immediately.
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::auth::authorization::require_admin;
//! use trendit_shared::auth::middleware::AuthContext;
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool, auth: AuthContext) -> Result<(), Box<dyn std::error::Error>> {
//! require_admin(&pool, &auth).await?;
//! # Ok(())
//! # }
//! ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::{User, UserRole};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Requires the {} role", .0.as_str())]
    MissingRole(UserRole),

    /// The caller does not own the resource
    #[error("Not authorized to access this resource")]
    NotAuthorized,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Fails unless the caller holds `role`
pub async fn require_role(
    pool: &PgPool,
    auth: &AuthContext,
    role: UserRole,
) -> Result<(), AuthzError> {
    if User::has_role(pool, auth.user_id, role).await? {
        Ok(())
    } else {
        tracing::debug!(user_id = %auth.user_id, role = role.as_str(), "role check failed");
        Err(AuthzError::MissingRole(role))
    }
}

/// Fails unless the caller is an admin
pub async fn require_admin(pool: &PgPool, auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(pool, auth, UserRole::Admin).await
}

/// Fails unless the caller owns the resource
pub fn require_owner(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner_id {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_owner() {
        let user_id = Uuid::new_v4();
        let auth = AuthContext::new(user_id);

        assert!(require_owner(&auth, user_id).is_ok());
        assert!(matches!(
            require_owner(&auth, Uuid::new_v4()),
            Err(AuthzError::NotAuthorized)
        ));
    }

    #[test]
    fn test_missing_role_message() {
        assert_eq!(
            AuthzError::MissingRole(UserRole::Admin).to_string(),
            "Requires the admin role"
        );
    }
}
