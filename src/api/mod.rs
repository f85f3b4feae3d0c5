pub mod handlers;

pub use handlers::*;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;

/// 构建路由
pub fn router(service: SharedService) -> Router {
    let estimate_routes = Router::new()
        .route("/api/estimates", post(generate_estimate))
        .route("/api/estimates/:id", get(get_estimate))
        .route("/api/estimates/:id/costs", patch(update_costs))
        .route("/api/estimates/:id/status", patch(set_status))
        .route("/api/estimates/:id/lines", post(add_line))
        .route("/api/estimates/:id/lines/:line_id", put(update_line).delete(remove_line))
        .route("/api/estimates/:id/optimize", post(optimize_estimate))
        .route("/api/estimates/:id/substitutions", get(list_substitutions))
        .route(
            "/api/estimates/:id/substitutions/:substitution_id/apply",
            post(apply_substitution),
        )
        .route("/api/estimates/:id/export", get(export_estimate));

    let catalog_routes = Router::new()
        .route("/api/catalog/:kind/:id/price", get(current_price))
        .route("/api/catalog/:kind/:id/availability", get(availability))
        .route("/api/catalog/:kind/:id/price-history", get(price_history))
        .route("/api/catalog/:kind/:id/alternatives", get(alternatives));

    Router::new()
        .route("/health", get(health_check))
        .merge(estimate_routes)
        .merge(catalog_routes)
        .layer(ServiceBuilder::new())
        .with_state(service)
}
