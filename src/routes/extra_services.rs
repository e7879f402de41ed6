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
    models::{from_document, from_documents, to_document, ExtraService},
    repository::table_service::{
        collections::EXTRA_SERVICES, create_row, delete_row, get_row, list_rows, update_row,
    },
    schemas::{
        clamp_limit_in_range, remove_nulls, serialize_to_map, validate_input,
        CreateExtraServiceInput, ExtraServicePath, ListQuery, UpdateExtraServiceInput,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/extra-services",
            axum::routing::get(list_extra_services).post(create_extra_service),
        )
        .route(
            "/extra-services/{service_id}",
            axum::routing::get(get_extra_service)
                .put(update_extra_service)
                .delete(delete_extra_service),
        )
}

async fn list_extra_services(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let rows = list_rows(
        &state.store,
        EXTRA_SERVICES,
        None,
        clamp_limit_in_range(query.limit, 1, 1000),
        "name",
        true,
    )
    .await?;
    let services: Vec<ExtraService> = from_documents(rows)?;
    Ok(Json(json!({ "data": services })))
}

async fn create_extra_service(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(payload): Json<CreateExtraServiceInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let service = ExtraService {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        price: payload.price,
        currency: payload.currency,
        description: payload.description,
        supplier_name: payload.supplier_name,
        is_active: payload.is_active,
        created_by: Some(user.id),
        created_at: Utc::now(),
    };
    let created: ExtraService =
        from_document(create_row(&state.store, EXTRA_SERVICES, &to_document(&service)?).await?)?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_extra_service(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ExtraServicePath>,
) -> AppResult<Json<Value>> {
    let service: ExtraService =
        from_document(get_row(&state.store, EXTRA_SERVICES, &path.service_id).await?)?;
    Ok(Json(json!(service)))
}

async fn update_extra_service(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ExtraServicePath>,
    Json(payload): Json<UpdateExtraServiceInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    get_row(&state.store, EXTRA_SERVICES, &path.service_id).await?;
    let patch = remove_nulls(serialize_to_map(&payload));
    let updated = if patch.is_empty() {
        get_row(&state.store, EXTRA_SERVICES, &path.service_id).await?
    } else {
        update_row(&state.store, EXTRA_SERVICES, &path.service_id, &patch).await?
    };
    let service: ExtraService = from_document(updated)?;
    Ok(Json(json!(service)))
}

async fn delete_extra_service(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<ExtraServicePath>,
) -> AppResult<Json<Value>> {
    delete_row(&state.store, EXTRA_SERVICES, &path.service_id).await?;
    Ok(Json(json!({ "message": "Service deleted" })))
}
