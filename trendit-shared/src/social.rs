//! Linking social accounts and admin verification
//!
//! Linking a platform creates the profile, its verification request and an
//! acknowledgement notification in one transaction. Admin decisions lock the request
//! and apply only while it is still pending, like task reviews in [`crate::review`].

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::notification::{Notification, NotificationKind};
use crate::models::social::{SocialPlatform, SocialProfile, SocialVerification, VerificationStatus};

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("Invalid social media platform")]
    InvalidPlatform,

    #[error("Link is not a {0} profile URL")]
    InvalidLink(&'static str),

    #[error("A {0} profile is already linked")]
    AlreadyLinked(&'static str),

    #[error("No social media profile for {0}")]
    ProfileNotFound(&'static str),

    #[error("Social verification request not found")]
    VerificationNotFound,

    #[error("Verification request already {0}")]
    AlreadyDecided(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub fn parse_platform(value: &str) -> Result<SocialPlatform, SocialError> {
    SocialPlatform::parse(value).ok_or(SocialError::InvalidPlatform)
}

/// Links a platform and queues it for verification
pub async fn link_profile(
    pool: &PgPool,
    user_id: Uuid,
    platform: SocialPlatform,
    link: &str,
) -> Result<(SocialProfile, SocialVerification), SocialError> {
    let link = link.trim();
    if !platform.accepts_link(link) {
        return Err(SocialError::InvalidLink(platform.as_str()));
    }

    let mut tx = pool.begin().await?;

    let profile = SocialProfile::create(&mut *tx, user_id, platform, link)
        .await?
        .ok_or(SocialError::AlreadyLinked(platform.as_str()))?;

    let verification = SocialVerification::create(&mut *tx, &profile).await?;

    Notification::create(
        &mut *tx,
        user_id,
        None,
        NotificationKind::Notification,
        "Your social media verification request has been received and is pending approval.",
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, platform = platform.as_str(), "Social profile submitted for verification");

    Ok((profile, verification))
}

pub async fn unlink_profile(pool: &PgPool, user_id: Uuid, platform: SocialPlatform) -> Result<(), SocialError> {
    if !SocialProfile::delete(pool, user_id, platform).await? {
        return Err(SocialError::ProfileNotFound(platform.as_str()));
    }

    tracing::info!(user_id = %user_id, platform = platform.as_str(), "Social profile removed");
    Ok(())
}

/// Approves or rejects a pending verification request and updates the profile
pub async fn decide_verification(
    pool: &PgPool,
    verification_id: Uuid,
    decision: VerificationStatus,
    reviewer: Option<Uuid>,
) -> Result<SocialVerification, SocialError> {
    let mut tx = pool.begin().await?;

    let request = SocialVerification::lock_by_id(&mut tx, verification_id)
        .await?
        .ok_or(SocialError::VerificationNotFound)?;

    let decided = SocialVerification::decide(&mut *tx, request.id, decision, reviewer)
        .await?
        .ok_or(SocialError::AlreadyDecided(request.status.as_str()))?;

    SocialProfile::set_status(&mut *tx, decided.profile_id, decision.profile_status()).await?;

    Notification::create(
        &mut *tx,
        decided.user_id,
        reviewer,
        NotificationKind::Notification,
        &format!(
            "Your {} verification request has been {}.",
            decided.platform.as_str(),
            decision.as_str()
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        verification_id = %verification_id,
        platform = decided.platform.as_str(),
        decision = decision.as_str(),
        "Social verification decided"
    );

    Ok(decided)
}
