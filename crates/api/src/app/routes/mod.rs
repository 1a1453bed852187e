use axum::{
    Router,
    handler::Handler,
    routing::get,
};

use crate::middleware::{self, AuthState};

pub mod orders;
pub mod products;
pub mod system;

/// Router for everything under `/api/v1`.
///
/// The catalog listing is public; every other endpoint requires a valid token.
pub fn router(auth: AuthState) -> Router {
    let require_auth = axum::middleware::from_fn_with_state(auth, middleware::auth_middleware);

    let protected = Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/orders", orders::router())
        .route_layer(require_auth.clone());

    Router::new()
        .route(
            "/products",
            get(products::list_products).post(products::create_product.layer(require_auth)),
        )
        .merge(protected)
}
