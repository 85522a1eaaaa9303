use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::store::{PgUserStore, UserStore};

pub mod email;
pub mod handlers;
mod openapi;

pub use openapi::ApiDoc;

use handlers::SignupState;

/// Start the server
///
/// # Errors
///
/// Returns an error if the database connection or the listener cannot be
/// established.
pub async fn new(
    port: u16,
    dsn: String,
    state: Arc<SignupState>,
    sender: Arc<dyn email::EmailSender>,
    mailer_config: email::MailerConfig,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));

    // Confirmation mail is delivered by a background worker; handlers only
    // enqueue, so responses never block on (or fail due to) mail latency.
    let mailer = email::spawn_mailer_worker(sender, mailer_config);

    let app = router(store, state, mailer)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Build the application router with all layers and state attached.
///
/// # Errors
///
/// Returns an error if the activation base URL cannot be turned into a CORS
/// origin.
pub fn router(
    store: Arc<dyn UserStore>,
    state: Arc<SignupState>,
    mailer: email::MailerHandle,
) -> Result<Router> {
    let origin = activation_origin(state.base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(origin));

    let app = Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .route("/", get(|| async { env!("CARGO_PKG_NAME") }))
        .route("/health", get(handlers::health))
        .route("/signup", post(handlers::signup))
        .route("/account-activation", post(handlers::activate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state))
                .layer(Extension(mailer))
                .layer(Extension(store)),
        );

    Ok(app)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn activation_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid activation base URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Activation base URL must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build activation origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_origin_strips_path_and_keeps_port() -> Result<()> {
        let origin = activation_origin("https://registro.dev:8443/app/")?;
        assert_eq!(origin, HeaderValue::from_static("https://registro.dev:8443"));
        Ok(())
    }

    #[test]
    fn activation_origin_rejects_garbage() {
        assert!(activation_origin("not a url").is_err());
    }
}
