use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/deployments", get(handlers::list_deployments))
        .route(
            "/deployments/:name",
            get(handlers::get_deployment_state).delete(handlers::destroy_deployment),
        )
        .route("/deployments/:name/plan", post(handlers::plan_deployment))
        .route("/deployments/:name/refresh", post(handlers::refresh_deployment))
        .route("/plans/:plan_id/apply", post(handlers::apply_deployment))
        .route("/resource-types", get(handlers::list_resource_types))
        .route("/resource-types/:type_name", get(handlers::describe_resource_type))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use opnctl_domain::catalog::with_builtin_types;
    use opnctl_effector::{BroadcastEventBus, LocalEffector};
    use opnctl_engine::ExecutionEngine;
    use opnctl_store::MemoryStore;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";

    fn test_app() -> Router {
        let store: Arc<dyn opnctl_store::StateStore> = Arc::new(MemoryStore::new());
        let effector = Arc::new(LocalEffector::new());
        let bus = Arc::new(BroadcastEventBus::new(16));
        let engine = Arc::new(ExecutionEngine::new(store.clone(), effector, bus, 4, "test"));
        let registry = Arc::new(with_builtin_types());
        let controller = Controller::new(store, engine, registry);
        let state = AppState { controller, auth_token: Arc::new(TEST_TOKEN.to_string()) };
        build_app(state)
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {}", TEST_TOKEN))
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_returns_200_when_authenticated() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/health")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn resource_types_lists_builtin_catalog() {
        let app = test_app();
        let resp = app
            .oneshot(
                authed(Request::builder().uri("/resource-types"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deployment_not_found_returns_404() {
        let app = test_app();
        let resp = app
            .oneshot(
                authed(Request::builder().uri("/deployments/nonexistent"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
