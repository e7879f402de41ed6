use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    auth::AdminOnly,
    error::AppResult,
    schemas::{validate_input, InvoiceCounterInput, ResetInvoiceCounterInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/config/invoice-counter",
            axum::routing::get(get_invoice_counter).put(advance_invoice_counter),
        )
        .route(
            "/config/reset-invoice-counter",
            axum::routing::post(reset_invoice_counter),
        )
}

async fn get_invoice_counter(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
) -> AppResult<Json<Value>> {
    let view = state.invoice_sequence().view().await?;
    Ok(Json(json!(view)))
}

async fn advance_invoice_counter(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(payload): Json<InvoiceCounterInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let outcome = state
        .invoice_sequence()
        .advance_to(payload.new_start)
        .await?;
    tracing::info!(user_id = %admin.id, new_start = payload.new_start, "Invoice counter updated");

    let mut body = json!({
        "message": format!("Invoice counter set to {}", outcome.current_number),
        "current_number": outcome.current_number,
    });
    if let Some(warning) = outcome.warning {
        body["warning"] = Value::String(warning);
    }
    Ok(Json(body))
}

async fn reset_invoice_counter(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Json(payload): Json<ResetInvoiceCounterInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let start = state
        .invoice_sequence()
        .reset_to(payload.start_number, payload.confirm)
        .await?;
    tracing::info!(user_id = %admin.id, start, "Invoice counter reset by admin");
    Ok(Json(json!({
        "message": format!("Invoice counter reset to {start}"),
        "current_number": start,
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

    use crate::{
        repository::table_service::{collections::RESERVATIONS, create_row, json_map},
        routes::v1_router,
        state::AppState,
    };

    fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", "admin-1")
            .header("x-user-role", "admin")
            .header("content-type", "application/json");
        match body {
            Some(payload) => builder.body(Body::from(payload.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn fresh_counter_reports_seed() {
        let response = v1_router()
            .with_state(AppState::in_memory())
            .oneshot(admin_request("GET", "/config/invoice-counter", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["current_number"], json!(1600));
        assert_eq!(body["next_invoice"], json!("1600"));
        assert_eq!(body["reservations_count"], json!(0));
    }

    #[tokio::test]
    async fn reset_is_blocked_by_existing_reservations() {
        let state = AppState::in_memory();
        create_row(
            &state.store,
            RESERVATIONS,
            &json_map(&[("invoice_number", json!("1600"))]),
        )
        .await
        .expect("reservation");

        let response = v1_router()
            .with_state(state.clone())
            .oneshot(admin_request(
                "POST",
                "/config/reset-invoice-counter",
                Some(json!({ "start_number": 1, "confirm": true })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["blocking_reservations"], json!(1));

        let response = v1_router()
            .with_state(state)
            .oneshot(admin_request(
                "PUT",
                "/config/invoice-counter",
                Some(json!({ "new_start": 2000 })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["warning"].is_string());
    }

    #[tokio::test]
    async fn counter_is_admin_only() {
        let response = v1_router()
            .with_state(AppState::in_memory())
            .oneshot(
                Request::builder()
                    .uri("/config/invoice-counter")
                    .header("x-user-id", "emp-1")
                    .header("x-user-role", "employee")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
