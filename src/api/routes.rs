use axum::{http::HeaderValue, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::api::crud::{bulk_resource_router, resource_router};
use crate::api::rate_limit::rate_limit;
use crate::api::state::AppState;
use crate::api::uploads::UPLOADS_URL;
use crate::api::{analytics, chats, clients, overview, pricing, projects, solutions, users};
use crate::config::CorsConfig;
use crate::error::ApiError;
use crate::model::{
    Blog, Category, ContactDraft, ContactSubmission, PortfolioItem, Product, Service,
    SupportTicket, TeamMember, Technology, Testimonial,
};
use crate::store::Store;

pub async fn banner() -> &'static str {
    "Projukti server is running"
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config.allowed_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            log::warn!("Ignoring invalid CORS origin: {}", e);
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

pub fn create_router<S: Store + 'static>(state: AppState<S>) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
        // Plain collections
        .nest("/blogs", resource_router::<S, Blog>())
        .nest("/products", resource_router::<S, Product>())
        .nest("/portfolio", resource_router::<S, PortfolioItem>())
        .nest("/testimonials", resource_router::<S, Testimonial>())
        .nest("/support", resource_router::<S, SupportTicket>())
        .nest("/contact-us", resource_router::<S, ContactDraft>())
        .nest(
            "/contact-us-submitted",
            resource_router::<S, ContactSubmission>(),
        )
        .nest("/our-team", resource_router::<S, TeamMember>())
        .nest("/services", resource_router::<S, Service>())
        .nest("/categories", bulk_resource_router::<S, Category>())
        .nest("/technologies", bulk_resource_router::<S, Technology>())
        // Collections with their own rules
        .nest("/users", users::router::<S>(&config.uploads))
        .nest("/pricing", pricing::router::<S>())
        .nest("/our-solutions", solutions::router::<S>())
        .nest("/our-clients", clients::router::<S>(&config.uploads))
        .nest("/total-projects", projects::router::<S>())
        .nest("/overview", overview::router::<S>())
        .nest("/analytics", analytics::router::<S>())
        .nest("/chats", chats::router::<S>())
        .nest_service(UPLOADS_URL, ServeDir::new(&config.uploads.dir))
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::<S>,
        ))
        .layer(cors_layer(&config.cors))
        .with_state(state)
}
