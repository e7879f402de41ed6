use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Employee,
}

impl Role {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Employee
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Claims issued by the identity service that fronts this API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: String,
    pub exp: i64,
}

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthUser);

/// Admin callers only; everyone else is rejected with 403 before the handler runs.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub AuthUser);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_user(state, &parts.headers).map(Authenticated)
    }
}

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = require_user(state, &parts.headers)?;
        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "Forbidden: admin role required.".to_string(),
            ));
        }
        Ok(AdminOnly(user))
    }
}

pub fn require_user(state: &AppState, headers: &HeaderMap) -> AppResult<AuthUser> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(user) = dev_override_user(headers) {
            return Ok(user);
        }
    }

    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: missing bearer token.".to_string())
    })?;
    let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: token verification is not configured.".to_string())
    })?;

    let claims = decode_token(token, secret)?;
    Ok(AuthUser {
        username: if claims.username.trim().is_empty() {
            claims.sub.clone()
        } else {
            claims.username
        },
        id: claims.sub,
        role: Role::parse(&claims.role),
    })
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|error| {
        tracing::debug!(error = %error, "Rejected bearer token");
        AppError::Unauthorized("Unauthorized: invalid or expired token.".to_string())
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|value| !value.is_empty())
}

fn dev_override_user(headers: &HeaderMap) -> Option<AuthUser> {
    let user_id = header_str(headers, "x-user-id")?;
    let role = header_str(headers, "x-user-role")
        .as_deref()
        .map(Role::parse)
        .unwrap_or_default();
    Some(AuthUser {
        username: header_str(headers, "x-user-name").unwrap_or_else(|| user_id.clone()),
        id: user_id,
        role,
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::{bearer_token, decode_token, Claims, Role};

    #[test]
    fn parses_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn decodes_tokens_signed_with_the_shared_secret() {
        let claims = Claims {
            sub: "u1".to_string(),
            username: "maria".to_string(),
            role: "admin".to_string(),
            exp: chrono::Utc::now().timestamp() + 600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("token");

        let decoded = decode_token(&token, "test-secret").expect("valid token");
        assert_eq!(decoded.sub, "u1");
        assert_eq!(Role::parse(&decoded.role), Role::Admin);
        assert!(decode_token(&token, "other-secret").is_err());
    }

    #[test]
    fn unknown_roles_fall_back_to_employee() {
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse("manager"), Role::Employee);
    }
}
