//! Authentication and authorization utilities
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and strength rules
//! - [`jwt`]: Access/refresh token issuing and validation
//! - [`middleware`]: Bearer token extraction into an [`middleware::AuthContext`]
//! - [`authorization`]: Role checks (`customer`, `advertiser`, `admin`)
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::auth::password::{hash_password, verify_password};
//! use trendit_shared::auth::jwt::{issue_token_pair, validate_access_token};
//! use uuid::Uuid;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("Tr3ndit!pass")?;
//! assert!(verify_password("Tr3ndit!pass", &hash)?);
//!
//! let pair = issue_token_pair(Uuid::new_v4(), "secret-key-at-least-32-bytes-long!!")?;
//! let claims = validate_access_token(&pair.access_token, "secret-key-at-least-32-bytes-long!!")?;
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
