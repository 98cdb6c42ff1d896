//! Dashboard figures for the caller
//!
//! `GET /v1/stats`

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use axum::extract::State;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde_json::{Map, Value as JsonValue};
use trendit_shared::{
    auth::middleware::AuthContext,
    models::{payment::Payment, performance::TaskPerformance},
    wallet,
};

/// Midnight UTC on the first day of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub async fn user_stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<ApiResponse> {
    let since = Some(month_start(Utc::now()));

    let balance = wallet::balance(&state.db, auth.user_id).await?;
    let total_spent = Payment::total_spent(&state.db, auth.user_id, None).await?;
    let spent_this_month = Payment::total_spent(&state.db, auth.user_id, since).await?;
    let total_earned = TaskPerformance::total_earned(&state.db, auth.user_id, None).await?;
    let earned_this_month = TaskPerformance::total_earned(&state.db, auth.user_id, since).await?;

    let performed: Map<String, JsonValue> = TaskPerformance::count_per_status(&state.db, auth.user_id)
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), JsonValue::from(count)))
        .collect();

    Ok(ApiResponse::ok("User stats fetched successfully")
        .with("wallet_balance", balance)
        .with("total_spent", total_spent)
        .with("spent_this_month", spent_this_month)
        .with("total_earned", total_earned)
        .with("earned_this_month", earned_this_month)
        .with("performed_tasks", performed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2024, 3, 17, 15, 4, 5).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(month_start(first), first);
    }
}
