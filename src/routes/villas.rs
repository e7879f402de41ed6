use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    auth::{AdminOnly, Authenticated},
    error::{AppError, AppResult},
    models::{from_document, from_documents, to_document, Villa},
    repository::table_service::{
        collections::VILLAS, create_row, delete_row, get_row, json_map, list_all_rows,
        update_row,
    },
    schemas::{
        clamp_limit_in_range, non_empty_opt, remove_nulls, serialize_to_map, validate_input,
        CreateVillaInput, UpdateVillaInput, VillaPath, VillasQuery,
    },
    services::categories::require_category,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/villas", axum::routing::get(list_villas).post(create_villa))
        .route(
            "/villas/{villa_id}",
            axum::routing::get(get_villa)
                .put(update_villa)
                .delete(delete_villa),
        )
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn matches_search(villa: &Villa, needle: &str) -> bool {
    villa.code.to_lowercase().contains(needle) || villa.name.to_lowercase().contains(needle)
}

async fn list_villas(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Query(query): Query<VillasQuery>,
) -> AppResult<Json<Value>> {
    let filters = non_empty_opt(query.category_id.as_deref())
        .map(|category_id| json_map(&[("category_id", Value::String(category_id))]));
    let rows = list_all_rows(&state.store, VILLAS, filters.as_ref(), "code", true).await?;
    let mut villas: Vec<Villa> = from_documents(rows)?;

    if let Some(needle) = non_empty_opt(query.search.as_deref()).map(|text| text.to_lowercase()) {
        villas.retain(|villa| matches_search(villa, &needle));
    }
    villas.truncate(clamp_limit_in_range(query.limit, 1, 1000) as usize);
    Ok(Json(json!({ "data": villas })))
}

async fn create_villa(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(payload): Json<CreateVillaInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let category_id = non_empty_opt(payload.category_id.as_deref());
    if let Some(category_id) = category_id.as_deref() {
        require_category(&state.store, category_id).await?;
    }
    let villa = Villa {
        id: uuid::Uuid::new_v4().to_string(),
        code: normalize_code(&payload.code),
        name: payload.name,
        category_id,
        location: payload.location,
        phone: payload.phone,
        notes: payload.notes,
        is_active: payload.is_active,
        created_by: Some(user.id),
        created_at: Utc::now(),
    };
    let created = create_row(&state.store, VILLAS, &to_document(&villa)?)
        .await
        .map_err(|error| duplicate_code(error, &villa.code))?;
    let created: Villa = from_document(created)?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_villa(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<VillaPath>,
) -> AppResult<Json<Value>> {
    let villa: Villa = from_document(get_row(&state.store, VILLAS, &path.villa_id).await?)?;
    Ok(Json(json!(villa)))
}

async fn update_villa(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<VillaPath>,
    Json(payload): Json<UpdateVillaInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    get_row(&state.store, VILLAS, &path.villa_id).await?;
    if let Some(category_id) = non_empty_opt(payload.category_id.as_deref()) {
        require_category(&state.store, &category_id).await?;
    }

    let mut patch = remove_nulls(serialize_to_map(&payload));
    // An empty category id clears the assignment.
    if payload.category_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        patch.insert("category_id".to_string(), Value::Null);
    }
    let code = payload.code.as_deref().map(normalize_code);
    if let Some(code) = &code {
        patch.insert("code".to_string(), Value::String(code.clone()));
    }
    let updated = if patch.is_empty() {
        get_row(&state.store, VILLAS, &path.villa_id).await?
    } else {
        update_row(&state.store, VILLAS, &path.villa_id, &patch)
            .await
            .map_err(|error| duplicate_code(error, code.as_deref().unwrap_or_default()))?
    };
    let villa: Villa = from_document(updated)?;
    Ok(Json(json!(villa)))
}

async fn delete_villa(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<VillaPath>,
) -> AppResult<Json<Value>> {
    delete_row(&state.store, VILLAS, &path.villa_id).await?;
    Ok(Json(json!({ "message": "Villa deleted" })))
}

fn duplicate_code(error: AppError, code: &str) -> AppError {
    match error {
        AppError::Conflict(_) => AppError::Conflict(format!("Villa code {code} already exists.")),
        other => other,
    }
}
