//! Route definitions for the link dashboard API
//!
//! This module maps every HTTP route to its handler and injects the shared state.

use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::database::AppState;
use crate::handler::{
    create_link, delete_link, get_link, get_link_stats, health, links_summary, list_links,
    redirect_url, update_link,
};
use crate::middleware::auth_middleware;

/// Creates the application router
///
/// # Route Definitions
///
/// - `GET /health` - liveness probe
/// - `GET /{code}` - redirect to the original URL and count the click (public)
/// - `GET /api/urls` - list an owner's links with search, sorting and pagination
/// - `POST /api/urls` - create a short link
/// - `GET /api/urls/summary` - totals over an owner's links
/// - `GET|PATCH|DELETE /api/urls/{code}` - read, edit or delete one link
/// - `GET /api/urls/{code}/stats` - click analytics of one link
///
/// `health`, `api` and `summary` are reserved and never issued as short codes.
///
/// `/api` routes go through [`auth_middleware`].
///
/// # Example Usage
///
/// ```no_run
/// # use linkboard::config::Config;
/// # use linkboard::database::{init_db, AppState};
/// # use linkboard::route::create_app;
/// # let db = init_db("data.db").unwrap();
/// let state = AppState::new(db, Config::default());
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/urls", get(list_links).post(create_link))
        .route("/urls/summary", get(links_summary))
        .route(
            "/urls/{code}",
            get(get_link).patch(update_link).delete(delete_link),
        )
        .route("/urls/{code}/stats", get(get_link_stats))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/{code}", get(redirect_url))
        .nest("/api", api_routes)
        .with_state(state)
}
