use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    auth::{AdminOnly, Authenticated},
    error::AppResult,
    models::{from_document, to_document, Category},
    repository::table_service::{collections::CATEGORIES, create_row, get_row, update_row},
    schemas::{
        remove_nulls, serialize_to_map, validate_input, CategoryPath, CreateCategoryInput,
        UpdateCategoryInput,
    },
    services::categories,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/categories",
            axum::routing::get(list_categories).post(create_category),
        )
        .route(
            "/categories/{category_id}",
            axum::routing::get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}

async fn list_categories(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
) -> AppResult<Json<Value>> {
    let rows = categories::list_active(&state.store).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_category(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(payload): Json<CreateCategoryInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let category = Category {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        description: payload.description,
        is_active: true,
        created_by: Some(admin.id),
        created_at: Utc::now(),
    };
    let created: Category =
        from_document(create_row(&state.store, CATEGORIES, &to_document(&category)?).await?)?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_category(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<CategoryPath>,
) -> AppResult<Json<Value>> {
    let category: Category =
        from_document(get_row(&state.store, CATEGORIES, &path.category_id).await?)?;
    Ok(Json(json!(category)))
}

async fn update_category(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<CategoryPath>,
    Json(payload): Json<UpdateCategoryInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    get_row(&state.store, CATEGORIES, &path.category_id).await?;
    let patch = remove_nulls(serialize_to_map(&payload));
    let updated = if patch.is_empty() {
        get_row(&state.store, CATEGORIES, &path.category_id).await?
    } else {
        update_row(&state.store, CATEGORIES, &path.category_id, &patch).await?
    };
    let category: Category = from_document(updated)?;
    Ok(Json(json!(category)))
}

async fn delete_category(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<CategoryPath>,
) -> AppResult<Json<Value>> {
    let deletion = categories::delete_category(&state.store, &path.category_id).await?;
    Ok(Json(json!({
        "message": "Category deleted, villas unassigned",
        "villas_unassigned": deletion.villas_unassigned,
        "expenses_unassigned": deletion.expenses_unassigned,
    })))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{routes::v1_router, state::AppState};

    fn request(method: &str, uri: &str, role: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", format!("{role}-1"))
            .header("x-user-role", role)
            .header("content-type", "application/json");
        match body {
            Some(payload) => builder.body(Body::from(payload.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request")
    }

    #[tokio::test]
    async fn only_admins_change_categories() {
        let state = AppState::in_memory();
        let response = v1_router()
            .with_state(state.clone())
            .oneshot(request("POST", "/categories", "employee", Some(json!({ "name": "Playa" }))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = v1_router()
            .with_state(state.clone())
            .oneshot(request("POST", "/categories", "admin", Some(json!({ "name": "Playa" }))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let created: Value = serde_json::from_slice(&bytes).expect("json");
        let category_id = created["id"].as_str().expect("id").to_string();

        let response = v1_router()
            .with_state(state.clone())
            .oneshot(request(
                "DELETE",
                &format!("/categories/{category_id}"),
                "employee",
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = v1_router()
            .with_state(state)
            .oneshot(request("GET", "/categories", "employee", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let listed: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(listed["data"][0]["name"], "Playa");
    }
}
