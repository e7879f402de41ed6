use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    auth::{AdminOnly, Authenticated},
    error::AppResult,
    models::{from_document, from_documents, to_document, Customer},
    repository::table_service::{collections::CUSTOMERS, create_row, delete_row, get_row, list_rows},
    schemas::{clamp_limit_in_range, validate_input, CreateCustomerInput, CustomerPath, ListQuery},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/customers",
            axum::routing::get(list_customers).post(create_customer),
        )
        .route(
            "/customers/{customer_id}",
            axum::routing::get(get_customer).delete(delete_customer),
        )
}

async fn list_customers(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let rows = list_rows(
        &state.store,
        CUSTOMERS,
        None,
        clamp_limit_in_range(query.limit, 1, 1000),
        "created_at",
        false,
    )
    .await?;
    let customers: Vec<Customer> = from_documents(rows)?;
    Ok(Json(json!({ "data": customers })))
}

async fn create_customer(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(payload): Json<CreateCustomerInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let customer = Customer {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        phone: payload.phone.trim().to_string(),
        email: payload.email,
        identification: payload.identification,
        address: payload.address,
        notes: payload.notes,
        created_by: Some(user.id),
        created_at: Utc::now(),
    };
    let created: Customer =
        from_document(create_row(&state.store, CUSTOMERS, &to_document(&customer)?).await?)?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_customer(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<CustomerPath>,
) -> AppResult<Json<Value>> {
    let customer: Customer =
        from_document(get_row(&state.store, CUSTOMERS, &path.customer_id).await?)?;
    Ok(Json(json!(customer)))
}

async fn delete_customer(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<CustomerPath>,
) -> AppResult<Json<Value>> {
    delete_row(&state.store, CUSTOMERS, &path.customer_id).await?;
    Ok(Json(json!({ "message": "Customer deleted" })))
}
