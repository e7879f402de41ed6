use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::{AdminOnly, Authenticated},
    error::AppResult,
    schemas::{
        clamp_limit_in_range, non_empty_opt, validate_input, CreateAbonoInput,
        CreateReservationInput, ReservationAbonoPath, ReservationPath, ReservationsQuery,
        UpdateReservationInput,
    },
    services::{
        abonos::{add_abono, delete_abono, list_abonos, AbonoParent},
        reservations,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/reservations",
            axum::routing::get(list_reservations).post(create_reservation),
        )
        .route(
            "/reservations/{reservation_id}",
            axum::routing::get(get_reservation)
                .put(update_reservation)
                .delete(delete_reservation),
        )
        .route(
            "/reservations/{reservation_id}/abonos",
            axum::routing::get(list_reservation_abonos).post(create_reservation_abono),
        )
        .route(
            "/reservations/{reservation_id}/abonos/{abono_id}",
            axum::routing::delete(delete_reservation_abono),
        )
}

async fn list_reservations(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Query(query): Query<ReservationsQuery>,
) -> AppResult<Json<Value>> {
    let mut filters = Map::new();
    if let Some(status) = non_empty_opt(query.status.as_deref()) {
        filters.insert("status".to_string(), Value::String(status));
    }
    if let Some(customer_id) = non_empty_opt(query.customer_id.as_deref()) {
        filters.insert("customer_id".to_string(), Value::String(customer_id));
    }
    if let Some(villa_id) = non_empty_opt(query.villa_id.as_deref()) {
        filters.insert("villa_id".to_string(), Value::String(villa_id));
    }

    let rows = reservations::list_reservations(
        &state.store,
        &filters,
        clamp_limit_in_range(query.limit, 1, 5000),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_reservation(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(payload): Json<CreateReservationInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let outcome = reservations::create_reservation(&state, payload, &user).await?;
    Ok((axum::http::StatusCode::CREATED, Json(outcome)))
}

async fn get_reservation(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ReservationPath>,
) -> AppResult<Json<Value>> {
    let reservation = reservations::get_reservation(&state.store, &path.reservation_id).await?;
    Ok(Json(json!(reservation)))
}

async fn update_reservation(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ReservationPath>,
    Json(payload): Json<UpdateReservationInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let updated =
        reservations::update_reservation(&state.store, &path.reservation_id, payload).await?;
    Ok(Json(json!(updated)))
}

async fn delete_reservation(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<ReservationPath>,
) -> AppResult<Json<Value>> {
    let deletion = reservations::delete_reservation(&state.store, &path.reservation_id).await?;
    Ok(Json(json!({
        "message": "Reservation deleted",
        "expenses_removed": deletion.expenses_removed,
        "abonos_removed": deletion.abonos_removed,
    })))
}

async fn list_reservation_abonos(
    State(state): State<AppState>,
    Authenticated(_user): Authenticated,
    Path(path): Path<ReservationPath>,
) -> AppResult<Json<Value>> {
    let rows = list_abonos(&state.store, AbonoParent::Reservation, &path.reservation_id).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_reservation_abono(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(path): Path<ReservationPath>,
    Json(payload): Json<CreateAbonoInput>,
) -> AppResult<impl IntoResponse> {
    validate_input(&payload)?;
    let abono = add_abono(
        &state,
        AbonoParent::Reservation,
        &path.reservation_id,
        payload,
        &user,
    )
    .await?;
    Ok((axum::http::StatusCode::CREATED, Json(abono)))
}

async fn delete_reservation_abono(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
    Path(path): Path<ReservationAbonoPath>,
) -> AppResult<Json<Value>> {
    delete_abono(
        &state.store,
        AbonoParent::Reservation,
        &path.reservation_id,
        &path.abono_id,
    )
    .await?;
    Ok(Json(json!({ "message": "Abono deleted" })))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{routes::v1_router, state::AppState};

    fn app(state: AppState) -> Router {
        v1_router().with_state(state)
    }

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

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn booking() -> Value {
        json!({
            "customer_id": "cust-1",
            "customer_name": "Ana",
            "reservation_date": "2026-08-01",
            "total_amount": 15000,
            "deposit": 2000,
            "amount_paid": 10000
        })
    }

    #[tokio::test]
    async fn create_then_pay_off_a_reservation() {
        let state = AppState::in_memory();

        let response = app(state.clone())
            .oneshot(request("POST", "/reservations", "employee", Some(booking())))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = read_json(response).await;
        assert_eq!(created["invoice_number"], json!("1600"));
        assert_eq!(created["balance_due"], json!("7000"));
        let id = created["id"].as_str().expect("id").to_string();

        let response = app(state.clone())
            .oneshot(request(
                "POST",
                &format!("/reservations/{id}/abonos"),
                "employee",
                Some(json!({ "amount": 7000, "payment_date": "2026-08-02" })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(read_json(response).await["invoice_number"], json!("1601"));

        let response = app(state)
            .oneshot(request("GET", &format!("/reservations/{id}"), "employee", None))
            .await
            .expect("response");
        let reservation = read_json(response).await;
        assert_eq!(reservation["amount_paid"], json!("17000"));
        assert_eq!(reservation["balance_due"], json!("0"));
    }

    #[tokio::test]
    async fn employees_cannot_delete_or_pick_abono_numbers() {
        let state = AppState::in_memory();
        let response = app(state.clone())
            .oneshot(request("POST", "/reservations", "employee", Some(booking())))
            .await
            .expect("response");
        let id = read_json(response).await["id"]
            .as_str()
            .expect("id")
            .to_string();

        let response = app(state.clone())
            .oneshot(request("DELETE", &format!("/reservations/{id}"), "employee", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(state.clone())
            .oneshot(request(
                "POST",
                &format!("/reservations/{id}/abonos"),
                "employee",
                Some(json!({ "amount": 10, "payment_date": "2026-08-02", "invoice_number": "9999" })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(state.clone())
            .oneshot(request("DELETE", &format!("/reservations/{id}"), "admin", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(state)
            .oneshot(request("DELETE", &format!("/reservations/{id}"), "admin", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn taken_manual_invoice_is_a_bad_request() {
        let state = AppState::in_memory();
        let mut payload = booking();
        payload["invoice_number"] = json!("A-1");
        let first = app(state.clone())
            .oneshot(request("POST", "/reservations", "admin", Some(payload.clone())))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app(state)
            .oneshot(request("POST", "/reservations", "admin", Some(payload)))
            .await
            .expect("response");
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(second).await["detail"]
            .as_str()
            .is_some_and(|detail| detail.contains("A-1")));
    }

    #[tokio::test]
    async fn requests_without_credentials_are_rejected() {
        let response = app(AppState::in_memory())
            .oneshot(
                Request::builder()
                    .uri("/reservations")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
