//! `OpenAPI` document for the HTTP surface.
//!
//! Add new endpoints to `paths(...)` so they show up in the generated
//! document and the swagger UI.

use utoipa::OpenApi;

use super::handlers::{activate, health, signup};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        signup::signup,
        activate::activate,
    ),
    components(schemas(
        health::Health,
        signup::SignupRequest,
        signup::SignupResponse,
        activate::ActivateRequest,
        activate::ActivatedAccount,
    )),
    tags(
        (name = "signup", description = "Signup and account activation"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_the_signup_surface() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        assert!(paths.contains_key("/signup"));
        assert!(paths.contains_key("/account-activation"));
        assert!(paths.contains_key("/health"));
    }
}
