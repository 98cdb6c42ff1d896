//! Linked social media accounts and their verification requests
//!
//! A user links at most one account per platform. Linking opens a
//! [`SocialVerification`] that an admin approves or rejects; the decision is copied onto
//! the profile's status.
//!
//! ```text
//! profile:      pending ──approve──> verified
//!                  └─────reject────> rejected
//! verification: pending ──> approved | rejected
//! ```

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "id, user_id, platform, link, status, created_at, updated_at";

const VERIFICATION_COLUMNS: &str =
    "id, profile_id, user_id, platform, link, status, reviewed_by, created_at, reviewed_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "social_platform", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Facebook,
    Tiktok,
    Instagram,
    X,
    Threads,
}

impl SocialPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::Facebook => "facebook",
            SocialPlatform::Tiktok => "tiktok",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::X => "x",
            SocialPlatform::Threads => "threads",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "facebook" => Some(SocialPlatform::Facebook),
            "tiktok" => Some(SocialPlatform::Tiktok),
            "instagram" => Some(SocialPlatform::Instagram),
            "x" | "twitter" => Some(SocialPlatform::X),
            "threads" => Some(SocialPlatform::Threads),
            _ => None,
        }
    }

    /// Whether `link` is an http(s) profile URL on this platform
    ///
    /// TikTok profile paths start with `@`; the others only need a non-empty path.
    pub fn accepts_link(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link.trim()) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") || url.path().len() <= 1 {
            return false;
        }

        let host = url.host_str().unwrap_or_default();
        let host = host.strip_prefix("www.").unwrap_or(host);

        match self {
            SocialPlatform::Facebook => host == "facebook.com",
            SocialPlatform::Tiktok => host == "tiktok.com" && url.path().starts_with("/@"),
            SocialPlatform::Instagram => host == "instagram.com",
            SocialPlatform::X => host == "x.com" || host == "twitter.com",
            SocialPlatform::Threads => host == "threads.net",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "social_profile_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SocialProfileStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(VerificationStatus::Pending),
            "approved" => Some(VerificationStatus::Approved),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }

    /// Profile status that mirrors this decision
    pub fn profile_status(&self) -> SocialProfileStatus {
        match self {
            VerificationStatus::Pending => SocialProfileStatus::Pending,
            VerificationStatus::Approved => SocialProfileStatus::Verified,
            VerificationStatus::Rejected => SocialProfileStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SocialProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: SocialPlatform,
    pub link: String,
    pub status: SocialProfileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialProfile {
    /// Inserts a pending profile; `None` if the user already linked this platform
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        platform: SocialPlatform,
        link: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SocialProfile>(&format!(
            r#"
            INSERT INTO social_profiles (user_id, platform, link)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, platform) DO NOTHING
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(platform)
        .bind(link)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SocialProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM social_profiles WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Unlinks a platform; its verification requests go with it
    pub async fn delete(pool: &PgPool, user_id: Uuid, platform: SocialPlatform) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM social_profiles WHERE user_id = $1 AND platform = $2")
            .bind(user_id)
            .bind(platform)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: SocialProfileStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SocialProfile>(&format!(
            r#"
            UPDATE social_profiles SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SocialVerification {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub user_id: Uuid,
    pub platform: SocialPlatform,
    pub link: String,
    pub status: VerificationStatus,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl SocialVerification {
    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, profile: &SocialProfile) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SocialVerification>(&format!(
            r#"
            INSERT INTO social_verifications (profile_id, user_id, platform, link)
            VALUES ($1, $2, $3, $4)
            RETURNING {VERIFICATION_COLUMNS}
            "#
        ))
        .bind(profile.id)
        .bind(profile.user_id)
        .bind(profile.platform)
        .bind(&profile.link)
        .fetch_one(executor)
        .await
    }

    pub async fn lock_by_id(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SocialVerification>(&format!(
            "SELECT {VERIFICATION_COLUMNS} FROM social_verifications WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Records an admin decision; `None` if the request was already decided
    pub async fn decide<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: VerificationStatus,
        reviewer: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SocialVerification>(&format!(
            r#"
            UPDATE social_verifications
            SET status = $2, reviewed_by = $3, reviewed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {VERIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .fetch_optional(executor)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        status: Option<VerificationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SocialVerification>(&format!(
            r#"
            SELECT {VERIFICATION_COLUMNS} FROM social_verifications
            WHERE ($1::verification_status IS NULL OR status = $1)
            ORDER BY created_at, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &PgPool, status: Option<VerificationStatus>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM social_verifications WHERE ($1::verification_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse() {
        assert_eq!(SocialPlatform::parse("TikTok"), Some(SocialPlatform::Tiktok));
        assert_eq!(SocialPlatform::parse("twitter"), Some(SocialPlatform::X));
        assert_eq!(SocialPlatform::parse("myspace"), None);
    }

    #[test]
    fn test_accepts_link() {
        assert!(SocialPlatform::Instagram.accepts_link("https://www.instagram.com/ada_obi"));
        assert!(SocialPlatform::Tiktok.accepts_link("https://tiktok.com/@ada"));
        assert!(SocialPlatform::X.accepts_link("https://twitter.com/ada"));
        assert!(SocialPlatform::X.accepts_link("https://x.com/ada"));

        assert!(!SocialPlatform::Tiktok.accepts_link("https://tiktok.com/ada"));
        assert!(!SocialPlatform::Facebook.accepts_link("https://facebook.com/"));
        assert!(!SocialPlatform::Facebook.accepts_link("https://facebook.com.evil.io/ada"));
        assert!(!SocialPlatform::Instagram.accepts_link("ftp://instagram.com/ada"));
        assert!(!SocialPlatform::Instagram.accepts_link("not a url"));
    }

    #[test]
    fn test_decision_maps_to_profile_status() {
        assert_eq!(VerificationStatus::Approved.profile_status(), SocialProfileStatus::Verified);
        assert_eq!(VerificationStatus::Rejected.profile_status(), SocialProfileStatus::Rejected);
    }
}
