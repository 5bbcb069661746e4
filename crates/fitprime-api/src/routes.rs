use crate::{
    admin_handlers, auth_middleware::require_admin, health::health, state::AppState,
    webhook_handler::handle_stevo_webhook,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Assemble every route served by the edge
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::<AppState>::new()
        .route(
            "/api/admin/webhook-tokens/{instance}",
            post(admin_handlers::generate_webhook_token)
                .get(admin_handlers::webhook_token_status)
                .delete(admin_handlers::revoke_webhook_token),
        )
        .route(
            "/api/admin/rate-limits/{key}",
            get(admin_handlers::rate_limit_status).delete(admin_handlers::reset_rate_limit),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    // Webhook throttling is per instance, inside the extractor; the provider
    // delivers every instance from the same gateway address
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/stevo/{instance}", post(handle_stevo_webhook))
        .merge(admin_routes)
        .with_state(state)
}
