use axum::{
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod invoices;
pub mod lines;
pub mod system;

/// Routes that need no token.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

/// Routes that require an authenticated caller.
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/profile", get(auth::profile).put(auth::update_profile))
        .nest("/invoices", invoices::router())
        .nest("/lines", lines::router())
}
