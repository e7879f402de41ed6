use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::{AdminOnly, Authenticated},
    error::AppResult,
    models::{from_document, Expense},
    repository::table_service::{collections::EXPENSES, get_row},
    schemas::{
        clamp_limit_in_range, non_empty_opt, validate_input, CreateAbonoInput,
        CreateExpenseInput, ExpenseAbonoPath, ExpensePath, ExpensesQuery, UpdateExpenseInput,
    },
    services::{
        abonos::{add_abono, delete_abono, list_abonos, AbonoParent},
        expenses,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/expenses",
            axum::routing::get(list_expenses).post(create_expense),
        )
        .route(
            "/expenses/{expense_id}",
            axum::routing::get(get_expense)
                .put(update_expense)
                .delete(delete_expense),
        )
        .route(
            "/expenses/{expense_id}/abonos",
            axum::routing::get(list_expense_abonos).post(create_expense_abono),
        )
        .route(
            "/expenses/{expense_id}/abonos/{abono_id}",
            axum::routing::delete(delete_expense_abono),
        )
}

async fn list_expenses(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Query(query): Query<ExpensesQuery>,
) -> AppResult<Json<Value>> {
    let mut filters = Map::new();
    if let Some(category) = non_empty_opt(query.category.as_deref()) {
        filters.insert("category".to_string(), Value::String(category));
    }
    if let Some(category_id) = non_empty_opt(query.category_id.as_deref()) {
        filters.insert("category_id".to_string(), Value::String(category_id));
    }
    if let Some(status) = non_empty_opt(query.payment_status.as_deref()) {
        filters.insert("payment_status".to_string(), Value::String(status));
    }
    if let Some(reservation_id) = non_empty_opt(query.related_reservation_id.as_deref()) {
        filters.insert(
            "related_reservation_id".to_string(),
            Value::String(reservation_id),
        );
    }

    let rows = expenses::list_expenses(
        &state.store,
        &filters,
        clamp_limit_in_range(query.limit, 1, 5000),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_expense(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(payload): Json<CreateExpenseInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let created = expenses::create_expense(&state.store, payload, &user).await?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_expense(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ExpensePath>,
) -> AppResult<Json<Value>> {
    let expense: Expense = from_document(get_row(&state.store, EXPENSES, &path.expense_id).await?)?;
    Ok(Json(json!(expense)))
}

async fn update_expense(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ExpensePath>,
    Json(payload): Json<UpdateExpenseInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let updated = expenses::update_expense(&state.store, &path.expense_id, payload).await?;
    Ok(Json(json!(updated)))
}

async fn delete_expense(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<ExpensePath>,
) -> AppResult<Json<Value>> {
    let abonos_removed = expenses::delete_expense(&state.store, &path.expense_id).await?;
    Ok(Json(json!({
        "message": "Expense deleted",
        "abonos_removed": abonos_removed,
    })))
}

async fn list_expense_abonos(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ExpensePath>,
) -> AppResult<Json<Value>> {
    let rows = list_abonos(&state.store, AbonoParent::Expense, &path.expense_id).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_expense_abono(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(path): Path<ExpensePath>,
    Json(payload): Json<CreateAbonoInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let abono = add_abono(&state, AbonoParent::Expense, &path.expense_id, payload, &user).await?;
    Ok((axum::http::StatusCode::CREATED, Json(abono)))
}

async fn delete_expense_abono(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<ExpenseAbonoPath>,
) -> AppResult<Json<Value>> {
    delete_abono(
        &state.store,
        AbonoParent::Expense,
        &path.expense_id,
        &path.abono_id,
    )
    .await?;
    Ok(Json(json!({ "message": "Abono deleted" })))
}
