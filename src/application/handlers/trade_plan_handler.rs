use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use super::AppState;
use crate::domain::entities::action_log::ActionLogEntry;
use crate::domain::entities::hop::Hop;
use crate::domain::entities::trade_plan::{AmountEntry, ExecutionMode, TaskState, TradePlan};

/// Audit view of one trade plan. The auth token is never exposed.
#[derive(Debug, Serialize)]
pub struct TradePlanResponse {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "loop")]
    pub loop_hops: Vec<Hop>,
    pub amount: Vec<AmountEntry>,
    pub exec_type: ExecutionMode,
    pub check_balance: bool,
    pub status: TaskState,
    pub created_at: DateTime<Utc>,
    pub action_logs: Vec<ActionLogEntry>,
}

impl TradePlanResponse {
    fn new(plan: TradePlan, action_logs: Vec<ActionLogEntry>) -> Self {
        Self {
            id: plan.id,
            user_id: plan.owner_id,
            loop_hops: plan.loop_hops,
            amount: plan.amounts,
            exec_type: plan.execution_mode,
            check_balance: plan.check_balance,
            status: plan.status,
            created_at: plan.created_at,
            action_logs,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn internal_error(e: impl std::fmt::Display) -> HandlerError {
    error!("Trade plan lookup failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Failed to load trade plan".to_string(),
        }),
    )
}

/// Get a trade plan with its action log
pub async fn get_trade_plan(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<TradePlanResponse>, HandlerError> {
    let store = state.session.store();

    let plan = store
        .get_trade_plan(id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Unknown trade plan: {}", id),
                }),
            )
        })?;

    let action_logs = store.action_logs(id).await.map_err(internal_error)?;

    Ok(Json(TradePlanResponse::new(plan, action_logs)))
}
