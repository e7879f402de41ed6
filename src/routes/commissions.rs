use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::{AdminOnly, Authenticated},
    error::AppResult,
    schemas::{
        clamp_limit_in_range, non_empty_opt, validate_input, CommissionPath, CommissionsQuery,
        PayFortnightInput, UpdateCommissionInput,
    },
    services::commissions,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/commissions", axum::routing::get(list_commissions))
        .route("/commissions/stats", axum::routing::get(commission_stats))
        .route(
            "/commissions/pay-fortnight",
            axum::routing::post(pay_fortnight),
        )
        .route(
            "/commissions/{commission_id}",
            axum::routing::put(update_commission).delete(delete_commission),
        )
        .route(
            "/commissions/{commission_id}/mark-paid",
            axum::routing::post(mark_paid),
        )
        .route(
            "/commissions/{commission_id}/mark-unpaid",
            axum::routing::post(mark_unpaid),
        )
}

async fn list_commissions(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Query(query): Query<CommissionsQuery>,
) -> AppResult<Json<Value>> {
    let rows = commissions::list_commissions(
        &state.store,
        non_empty_opt(query.user_id.as_deref()),
        query.paid,
        clamp_limit_in_range(query.limit, 1, 5000),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn commission_stats(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
) -> AppResult<Json<Value>> {
    let stats = commissions::commission_stats(&state.store).await?;
    Ok(Json(json!(stats)))
}

async fn update_commission(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<CommissionPath>,
    Json(payload): Json<UpdateCommissionInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let updated =
        commissions::update_commission(&state.store, &path.commission_id, payload).await?;
    Ok(Json(json!(updated)))
}

async fn mark_paid(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<CommissionPath>,
) -> AppResult<Json<Value>> {
    let updated = commissions::set_paid(&state.store, &path.commission_id, true).await?;
    Ok(Json(json!(updated)))
}

async fn mark_unpaid(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<CommissionPath>,
) -> AppResult<Json<Value>> {
    let updated = commissions::set_paid(&state.store, &path.commission_id, false).await?;
    Ok(Json(json!(updated)))
}

async fn pay_fortnight(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Json(payload): Json<PayFortnightInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let payout = commissions::pay_fortnight(&state.store, payload).await?;
    Ok(Json(json!(payout)))
}

async fn delete_commission(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<CommissionPath>,
) -> AppResult<Json<Value>> {
    commissions::delete_commission(&state.store, &path.commission_id).await?;
    Ok(Json(json!({ "message": "Commission deleted" })))
}
