pub mod handlers;
pub mod routes;

use axum::Router;

use voice_companion_domain::services::Services;

/// Create the application router
pub fn create_application(services: Services) -> Router {
    routes::create_app(services)
}
