use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::{
    auth::{AdminOnly, Authenticated},
    error::AppResult,
    models::{from_document, from_documents, to_document, VillaOwner},
    repository::table_service::{
        collections::VILLA_OWNERS, create_row, delete_row, get_row, list_rows, update_row,
    },
    schemas::{
        clamp_limit_in_range, remove_nulls, serialize_to_map, validate_input, CreateOwnerInput,
        ListQuery, OwnerAmountsInput, OwnerPath, OwnerPaymentInput, UpdateOwnerInput,
    },
    services::owner_ledger,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/owners", axum::routing::get(list_owners).post(create_owner))
        .route(
            "/owners/{owner_id}",
            axum::routing::get(get_owner)
                .put(update_owner)
                .delete(delete_owner),
        )
        .route(
            "/owners/{owner_id}/payments",
            axum::routing::get(list_owner_payments).post(create_owner_payment),
        )
        .route(
            "/owners/{owner_id}/amounts",
            axum::routing::put(set_owner_amounts),
        )
}

async fn list_owners(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let rows = list_rows(
        &state.store,
        VILLA_OWNERS,
        None,
        clamp_limit_in_range(query.limit, 1, 1000),
        "name",
        true,
    )
    .await?;
    let owners: Vec<VillaOwner> = from_documents(rows)?;
    Ok(Json(json!({ "data": owners })))
}

async fn create_owner(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(payload): Json<CreateOwnerInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let now = Utc::now();
    let owner = VillaOwner {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        phone: payload.phone,
        email: payload.email,
        villas: payload.villas,
        commission_percentage: payload.commission_percentage,
        total_owed: Decimal::ZERO,
        amount_paid: Decimal::ZERO,
        balance_due: Decimal::ZERO,
        notes: payload.notes,
        created_by: Some(admin.id),
        created_at: now,
        updated_at: now,
    };
    let created: VillaOwner =
        from_document(create_row(&state.store, VILLA_OWNERS, &to_document(&owner)?).await?)?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_owner(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<OwnerPath>,
) -> AppResult<Json<Value>> {
    let owner: VillaOwner =
        from_document(get_row(&state.store, VILLA_OWNERS, &path.owner_id).await?)?;
    Ok(Json(json!(owner)))
}

/// Profile fields only; amounts go through the ledger.
async fn update_owner(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<OwnerPath>,
    Json(payload): Json<UpdateOwnerInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    get_row(&state.store, VILLA_OWNERS, &path.owner_id).await?;
    let patch = remove_nulls(serialize_to_map(&payload));
    let updated = if patch.is_empty() {
        get_row(&state.store, VILLA_OWNERS, &path.owner_id).await?
    } else {
        update_row(&state.store, VILLA_OWNERS, &path.owner_id, &patch).await?
    };
    let owner: VillaOwner = from_document(updated)?;
    Ok(Json(json!(owner)))
}

async fn delete_owner(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<OwnerPath>,
) -> AppResult<Json<Value>> {
    delete_row(&state.store, VILLA_OWNERS, &path.owner_id).await?;
    Ok(Json(json!({ "message": "Owner deleted" })))
}

async fn list_owner_payments(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<OwnerPath>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let payments = owner_ledger::list_payments(
        &state.store,
        &path.owner_id,
        clamp_limit_in_range(query.limit, 1, 1000),
    )
    .await?;
    Ok(Json(json!({ "data": payments })))
}

async fn create_owner_payment(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(path): Path<OwnerPath>,
    Json(payload): Json<OwnerPaymentInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let (payment, owner) =
        owner_ledger::record_payment(&state.store, &path.owner_id, payload, &user).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "payment": payment, "owner": owner })),
    ))
}

async fn set_owner_amounts(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<OwnerPath>,
    Json(payload): Json<OwnerAmountsInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let owner =
        owner_ledger::set_total_owed(&state.store, &path.owner_id, payload.total_owed).await?;
    Ok(Json(json!(owner)))
}
