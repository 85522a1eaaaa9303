//! Account activation endpoint: verify the token, create the account once.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

use crate::{
    api::handlers::{SignupState, normalize_email},
    store::{NewAccount, StoreError, UserStore},
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ActivatedAccount {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/account-activation",
    request_body = ActivateRequest,
    responses (
        (status = 201, description = "Account created", body = ActivatedAccount),
        (status = 400, description = "Invalid token", body = String),
        (status = 409, description = "Account already activated", body = String),
        (status = 410, description = "Token expired", body = String),
        (status = 503, description = "User store unavailable, retry later", body = String),
    ),
    tag = "signup"
)]
// Tokens embed the derived password secret; keep them out of spans.
#[instrument(skip_all)]
pub async fn activate(
    store: Extension<Arc<dyn UserStore>>,
    state: Extension<Arc<SignupState>>,
    payload: Option<Json<ActivateRequest>>,
) -> impl IntoResponse {
    let request: ActivateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }

    // Signature and expiry first; nothing in the payload is trusted before
    // this point.
    let claims = match state.verifier().verify(token) {
        Ok(claims) => claims,
        Err(err) if err.is_expired() => {
            return (StatusCode::GONE, "Token expired".to_string()).into_response();
        }
        Err(err) => {
            debug!("Activation token rejected: {err}");
            return (StatusCode::BAD_REQUEST, "Invalid token".to_string()).into_response();
        }
    };

    let email = normalize_email(&claims.email);

    // Re-check existence: replay of an already-consumed token (or a second
    // signup for the same email) resolves here instead of creating twice.
    match store.find_by_email(&email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                "Account already activated".to_string(),
            )
                .into_response();
        }
        Ok(None) => (),
        Err(err) => {
            error!("Existence re-check failed: {err:#}");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable, try again later".to_string(),
            )
                .into_response();
        }
    }

    // The store's uniqueness guard closes the race window the check above
    // leaves open; losing the race is still "already activated".
    let account = NewAccount {
        name: claims.name,
        email,
        // Already derived at signup time; stored verbatim.
        password_secret: claims.secret,
    };
    match store.create_account(account).await {
        Ok(account) => (
            StatusCode::CREATED,
            Json(ActivatedAccount {
                id: account.id.to_string(),
                name: account.name,
                email: account.email,
            }),
        )
            .into_response(),
        Err(StoreError::UniqueViolation) => (
            StatusCode::CONFLICT,
            "Account already activated".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Account creation failed: {err:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable, try again later".to_string(),
            )
                .into_response()
        }
    }
}
