use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use strata_driver::DriverRegistry;
use strata_events::EventBus;
use strata_store::Store;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::{AppState, Nudges};

pub fn build_app(
    store: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
    events: Arc<EventBus>,
    auth_token: Arc<String>,
) -> Router {
    build_app_with_nudges(store, drivers, events, auth_token, Nudges::default())
}

/// Like [`build_app`] but takes the caller's own [`Nudges`] rather than a
/// fresh set — used by the `server` command so the supervisor loops it
/// spawned share the same wake-up signals the handlers post to.
pub fn build_app_with_nudges(
    store: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
    events: Arc<EventBus>,
    auth_token: Arc<String>,
    nudges: Nudges,
) -> Router {
    let state = AppState { store, drivers, events, nudges, auth_token };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        // Clusters
        .route("/clusters", get(handlers::list_clusters).post(handlers::create_cluster))
        .route(
            "/clusters/:id",
            get(handlers::get_cluster).put(handlers::update_cluster).delete(handlers::delete_cluster),
        )
        .route("/clusters/:id/retry", post(handlers::retry_cluster))
        .route("/clusters/:id/provision", post(handlers::provision_cluster))
        .route("/clusters/:id/kubernetes/upgrade", post(handlers::upgrade_cluster))
        .route("/clusters/:id/size", post(handlers::resize_cluster))
        // Installations
        .route("/installations", get(handlers::list_installations).post(handlers::create_installation))
        .route(
            "/installations/:id",
            get(handlers::get_installation).put(handlers::update_installation).delete(handlers::delete_installation),
        )
        .route("/installations/:id/hibernate", post(handlers::hibernate_installation))
        .route("/installations/:id/wakeup", post(handlers::wakeup_installation))
        .route("/installations/:id/groups/:group_id", post(handlers::join_group))
        .route("/installations/:id/group", axum::routing::delete(handlers::leave_group))
        .route("/installations/:id/annotations", post(handlers::add_annotation))
        .route("/installations/:id/annotations/:name", axum::routing::delete(handlers::remove_annotation))
        .route("/installations/:id/backups", get(handlers::list_backups).post(handlers::create_backup))
        // ClusterInstallations
        .route("/cluster_installations", get(handlers::list_cluster_installations))
        .route("/cluster_installations/:id", get(handlers::get_cluster_installation))
        .route(
            "/cluster_installations/:id/config",
            get(handlers::get_cluster_installation_config).put(handlers::update_cluster_installation_config),
        )
        .route("/cluster_installations/:id/exec/:command", post(handlers::exec_cluster_installation))
        // Migration
        .route("/cluster_installations/migrate", post(handlers::migrate_create_targets))
        .route("/migrate/dns", post(handlers::migrate_switch_dns))
        .route("/migrate/switch_cluster_roles", post(handlers::migrate_switch_cluster_roles))
        .route("/migrate/delete_inactive/:cluster_id", post(handlers::migrate_delete_inactive))
        // Groups
        .route("/groups", get(handlers::list_groups).post(handlers::create_group))
        .route("/groups/status", get(handlers::get_all_group_statuses))
        .route("/groups/:id", get(handlers::get_group).put(handlers::update_group).delete(handlers::delete_group))
        .route("/groups/:id/status", get(handlers::get_group_status))
        // Webhooks / Subscriptions
        .route("/webhooks", get(handlers::list_webhooks).post(handlers::create_webhook))
        .route("/webhooks/:id", get(handlers::get_webhook).delete(handlers::delete_webhook))
        .route("/subscriptions", get(handlers::list_subscriptions).post(handlers::create_subscription))
        .route("/subscriptions/:id", get(handlers::get_subscription).delete(handlers::delete_subscription))
        // Events
        .route("/events/state-change", get(handlers::list_events))
        // Security locks
        .route("/security/:kind/:id/api/lock", post(handlers::api_lock))
        .route("/security/:kind/:id/api/unlock", post(handlers::api_unlock))
        .route("/security/installation/:id/deletion/lock", post(handlers::deletion_lock))
        .route("/security/installation/:id/deletion/unlock", post(handlers::deletion_unlock))
        // Database hierarchy
        .route(
            "/multitenant_databases",
            get(handlers::list_multitenant_databases).post(handlers::create_multitenant_database),
        )
        .route(
            "/multitenant_databases/:id",
            get(handlers::get_multitenant_database).delete(handlers::delete_multitenant_database),
        )
        .route(
            "/logical_databases",
            get(handlers::list_logical_databases).post(handlers::create_logical_database),
        )
        .route("/logical_databases/:id", get(handlers::get_logical_database))
        .route(
            "/database_schemas",
            get(handlers::list_database_schemas).post(handlers::apply_database_schema),
        )
        .route("/database_schemas/:id", get(handlers::get_database_schema))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use strata_driver::LocalDriver;
    use strata_store::MemoryStore;
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";

    fn test_app() -> Router {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let driver = Arc::new(LocalDriver);
        let registry = Arc::new(DriverRegistry::new("local").register("local", driver));
        let events = Arc::new(EventBus::new(store.clone()));
        build_app(store, registry, events, Arc::new(TEST_TOKEN.to_string()))
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {}", TEST_TOKEN))
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app();
        let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn basic_auth_with_correct_token_returns_200() {
        let app = test_app();
        let credentials = base64::engine::general_purpose::STANDARD.encode(format!("strata:{}", TEST_TOKEN));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", format!("Basic {}", credentials))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn basic_auth_with_wrong_token_returns_401() {
        let app = test_app();
        let credentials = base64::engine::general_purpose::STANDARD.encode("strata:wrong-token");
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", format!("Basic {}", credentials))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_app();
        let resp = app.oneshot(authed(Request::builder().uri("/health")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_returns_200_with_empty_store() {
        let app = test_app();
        let resp = app.oneshot(authed(Request::builder().uri("/ready")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn clusters_empty_list() {
        let app = test_app();
        let resp = app.oneshot(authed(Request::builder().uri("/clusters")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cluster_not_found_returns_404() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/clusters/nonexistent")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_cluster_returns_202() {
        let app = test_app();
        let body = serde_json::json!({ "provider": "aws", "provisioner": "local" });
        let resp = app
            .oneshot(
                authed(
                    axum::http::Request::builder()
                        .method("POST")
                        .uri("/clusters")
                        .header("content-type", "application/json"),
                )
                .body(Body::from(body.to_string()))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn groups_status_returns_200() {
        let app = test_app();
        let resp = app.oneshot(authed(Request::builder().uri("/groups/status")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn events_returns_200() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().uri("/events/state-change")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
