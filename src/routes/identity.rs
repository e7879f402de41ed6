use axum::Json;
use serde_json::{json, Value};

use crate::auth::Authenticated;

pub async fn me(Authenticated(user): Authenticated) -> Json<Value> {
    Json(json!({
        "id": user.id,
        "username": user.username,
        "role": user.role,
        "is_admin": user.is_admin(),
    }))
}
