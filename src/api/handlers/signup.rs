//! Signup endpoint: existence gate, token issuance, mail enqueue.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

use crate::{
    activation::{PendingSignup, derive_password_secret},
    api::email::{EmailMessage, MailerHandle},
    api::handlers::{SignupState, build_activation_url, normalize_email, valid_email},
    store::UserStore,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses (
        (status = 200, description = "Confirmation email queued", body = SignupResponse),
        (status = 400, description = "Missing or malformed payload", body = String),
        (status = 409, description = "Email already registered", body = String),
        (status = 503, description = "User store unavailable, retry later", body = String),
    ),
    tag = "signup"
)]
// The payload carries a password; keep it out of spans.
#[instrument(skip_all)]
pub async fn signup(
    store: Extension<Arc<dyn UserStore>>,
    state: Extension<Arc<SignupState>>,
    mailer: Extension<MailerHandle>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let name = request.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing name".to_string()).into_response();
    }

    if request.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing password".to_string()).into_response();
    }

    // Duplicate gate before any token is issued or mail queued.
    match store.find_by_email(&email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                "Email already registered".to_string(),
            )
                .into_response();
        }
        Ok(None) => (),
        Err(err) => {
            error!("Existence check failed: {err:#}");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable, try again later".to_string(),
            )
                .into_response();
        }
    }

    let secret = match derive_password_secret(&request.password) {
        Ok(secret) => secret,
        Err(err) => {
            error!("Password secret derivation failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response();
        }
    };

    let pending = PendingSignup {
        name: name.to_string(),
        email: email.clone(),
        secret,
    };
    let token = match state.issuer().issue(&pending) {
        Ok(token) => token,
        Err(err) => {
            error!("Token issuance failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response();
        }
    };

    // Enqueue only: the response never waits on delivery, and a mail failure
    // cannot re-enter this request to emit a second response.
    mailer.enqueue(EmailMessage {
        to_email: email,
        activation_url: build_activation_url(state.base_url(), &token),
    });

    (
        StatusCode::OK,
        Json(SignupResponse {
            message: "Check your email to activate your account".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{TokenIssuer, TokenVerifier};
    use crate::store::{MemoryUserStore, NewAccount};
    use anyhow::{Context, Result};
    use axum::body::to_bytes;
    use secrecy::SecretString;
    use tokio::sync::mpsc::UnboundedReceiver;

    const BASE_URL: &str = "https://registro.test";

    fn signup_state() -> Arc<SignupState> {
        let key = || SecretString::from("test-signing-key");
        Arc::new(SignupState::new(
            BASE_URL.to_string(),
            TokenIssuer::new(key(), BASE_URL.to_string(), 600),
            TokenVerifier::new(key(), BASE_URL.to_string(), 0),
        ))
    }

    fn mailer() -> (MailerHandle, UnboundedReceiver<EmailMessage>) {
        MailerHandle::channel()
    }

    fn request(name: &str, email: &str) -> Option<Json<SignupRequest>> {
        Some(Json(SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: "hunter2".to_string(),
        }))
    }

    #[tokio::test]
    async fn missing_payload_is_rejected() {
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let (handle, _rx) = mailer();
        let response = signup(
            Extension(store),
            Extension(signup_state()),
            Extension(handle),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let (handle, mut rx) = mailer();
        let response = signup(
            Extension(store),
            Extension(signup_state()),
            Extension(handle),
            request("B", "not-an-email"),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn registered_email_conflicts_and_queues_no_mail() -> Result<()> {
        let memory = MemoryUserStore::new();
        memory
            .create_account(NewAccount {
                name: "A".to_string(),
                email: "a@x.com".to_string(),
                password_secret: "s.h".to_string(),
            })
            .await?;
        let store: Arc<dyn UserStore> = Arc::new(memory);

        let (handle, mut rx) = mailer();
        let response = signup(
            Extension(store),
            Extension(signup_state()),
            Extension(handle),
            request("A", "a@x.com"),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn fresh_email_queues_mail_with_verifiable_token() -> Result<()> {
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let state = signup_state();
        let (handle, mut rx) = mailer();

        let response = signup(
            Extension(store),
            Extension(state.clone()),
            Extension(handle),
            request("Bea", " B@X.com "),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let queued = rx.try_recv().context("no mail queued")?;
        assert_eq!(queued.to_email, "b@x.com");

        let token = queued
            .activation_url
            .split_once("#token=")
            .map(|(_, token)| token)
            .context("activation url missing token fragment")?;
        let claims = state.verifier().verify(token)?;
        assert_eq!(claims.email, "b@x.com");
        assert_eq!(claims.name, "Bea");
        // The token carries a derived secret, never the submitted password.
        assert!(!claims.secret.contains("hunter2"));
        Ok(())
    }

    #[tokio::test]
    async fn signup_response_has_no_sensitive_data() -> Result<()> {
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let (handle, _rx) = mailer();
        let response = signup(
            Extension(store),
            Extension(signup_state()),
            Extension(handle),
            request("Bea", "b@x.com"),
        )
        .await
        .into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let text = String::from_utf8(body.to_vec())?;
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("token"));
        Ok(())
    }

    #[tokio::test]
    async fn store_outage_maps_to_service_unavailable() {
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::unavailable());
        let (handle, mut rx) = mailer();
        let response = signup(
            Extension(store),
            Extension(signup_state()),
            Extension(handle),
            request("B", "b@x.com"),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(rx.try_recv().is_err());
    }
}
