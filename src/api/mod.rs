/// API routes and handlers
pub mod auth;
pub mod middleware;
pub mod notes;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/auth", auth::routes())
        .merge(notes::routes())
}
