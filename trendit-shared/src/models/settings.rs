//! Notification and display preferences
//!
//! One `user_settings` row per user, created with defaults the first time it is read.
//! The two-factor method lives on the user row (see [`super::user::TwoFactorMethod`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::SettingsError;

const SETTINGS_COLUMNS: &str = "user_id, email_new_features, email_new_tasks, email_money_earned, \
     in_app_new_features, in_app_new_tasks, in_app_money_earned, \
     push_new_features, push_new_tasks, push_money_earned, appearance, updated_at";

/// UI theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    Light,
    Dark,
    System,
}

impl Appearance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Appearance::Light => "light",
            Appearance::Dark => "dark",
            Appearance::System => "system",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SettingsError> {
        match value.trim() {
            "light" => Ok(Appearance::Light),
            "dark" => Ok(Appearance::Dark),
            "system" => Ok(Appearance::System),
            _ => Err(SettingsError::InvalidAppearance),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub email_new_features: bool,
    pub email_new_tasks: bool,
    pub email_money_earned: bool,
    pub in_app_new_features: bool,
    pub in_app_new_tasks: bool,
    pub in_app_money_earned: bool,
    pub push_new_features: bool,
    pub push_new_tasks: bool,
    pub push_money_earned: bool,
    pub appearance: String,
    pub updated_at: DateTime<Utc>,
}

/// What a user wants to hear about on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPreferences {
    pub new_features: bool,
    pub new_tasks: bool,
    pub money_earned: bool,
}

/// Wire shape of the notification preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: ChannelPreferences,
    pub in_app: ChannelPreferences,
    pub push: ChannelPreferences,
}

/// Partial update for one channel; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChannelUpdate {
    pub new_features: Option<bool>,
    pub new_tasks: Option<bool>,
    pub money_earned: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NotificationPreferencesUpdate {
    #[serde(default)]
    pub email: ChannelUpdate,
    #[serde(default)]
    pub in_app: ChannelUpdate,
    #[serde(default)]
    pub push: ChannelUpdate,
}

impl UserSettings {
    pub fn notification_preferences(&self) -> NotificationPreferences {
        NotificationPreferences {
            email: ChannelPreferences {
                new_features: self.email_new_features,
                new_tasks: self.email_new_tasks,
                money_earned: self.email_money_earned,
            },
            in_app: ChannelPreferences {
                new_features: self.in_app_new_features,
                new_tasks: self.in_app_new_tasks,
                money_earned: self.in_app_money_earned,
            },
            push: ChannelPreferences {
                new_features: self.push_new_features,
                new_tasks: self.push_new_tasks,
                money_earned: self.push_money_earned,
            },
        }
    }

    pub fn appearance(&self) -> Appearance {
        Appearance::parse(&self.appearance).unwrap_or(Appearance::System)
    }

    /// Returns the user's settings, inserting the defaults on first access
    pub async fn get_or_create(pool: &PgPool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        // The no-op update makes RETURNING yield the existing row on conflict
        sqlx::query_as::<_, UserSettings>(&format!(
            r#"
            INSERT INTO user_settings (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn update_notifications(
        pool: &PgPool,
        user_id: Uuid,
        update: &NotificationPreferencesUpdate,
    ) -> Result<Self, sqlx::Error> {
        Self::get_or_create(pool, user_id).await?;

        sqlx::query_as::<_, UserSettings>(&format!(
            r#"
            UPDATE user_settings SET
                email_new_features = COALESCE($2, email_new_features),
                email_new_tasks = COALESCE($3, email_new_tasks),
                email_money_earned = COALESCE($4, email_money_earned),
                in_app_new_features = COALESCE($5, in_app_new_features),
                in_app_new_tasks = COALESCE($6, in_app_new_tasks),
                in_app_money_earned = COALESCE($7, in_app_money_earned),
                push_new_features = COALESCE($8, push_new_features),
                push_new_tasks = COALESCE($9, push_new_tasks),
                push_money_earned = COALESCE($10, push_money_earned),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(update.email.new_features)
        .bind(update.email.new_tasks)
        .bind(update.email.money_earned)
        .bind(update.in_app.new_features)
        .bind(update.in_app.new_tasks)
        .bind(update.in_app.money_earned)
        .bind(update.push.new_features)
        .bind(update.push.new_tasks)
        .bind(update.push.money_earned)
        .fetch_one(pool)
        .await
    }

    pub async fn set_appearance(
        pool: &PgPool,
        user_id: Uuid,
        appearance: Appearance,
    ) -> Result<Self, sqlx::Error> {
        Self::get_or_create(pool, user_id).await?;

        sqlx::query_as::<_, UserSettings>(&format!(
            r#"
            UPDATE user_settings SET appearance = $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(appearance.as_str())
        .fetch_one(pool)
        .await
    }
}
