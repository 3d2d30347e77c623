//! API router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        // Parties
        .route("/parties", get(handlers::list_parties))
        .route("/parties", post(handlers::register_party))
        .route("/parties/:id", get(handlers::get_party))
        .route("/parties/:id", delete(handlers::remove_party))
        .route("/parties/:id/availability", put(handlers::set_availability))
        .route("/parties/:id/stream", get(handlers::party_stream))
        // Rides
        .route("/rides", get(handlers::list_rides))
        .route("/rides", post(handlers::request_ride))
        .route("/rides/:id", get(handlers::get_ride))
        .route("/rides/:id/offers", post(handlers::submit_offer))
        .route("/rides/:id/accept", post(handlers::accept_offer))
        .route("/rides/:id/status", post(handlers::advance_status))
        .route("/rides/:id/cancel", post(handlers::cancel_ride))
        // Events
        .route("/events", get(handlers::get_events))
        .route("/events/stream", get(handlers::stream_events))
        // System
        .route("/system/shutdown", post(handlers::shutdown_daemon));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(RequestBodyLimitLayer::new(config.max_body_size));

    let router = if config.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use hail_directory::PresenceDirectory;
    use hail_dispatch::DispatchEngine;
    use hail_ledger::TripLedger;
    use hail_notify::Notifier;
    use hail_types::RideId;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tower::ServiceExt;

    fn test_engine() -> Arc<DispatchEngine> {
        let directory = Arc::new(PresenceDirectory::new());
        let ledger = Arc::new(TripLedger::new());
        let notifier = Arc::new(Notifier::new(directory.clone()));
        Arc::new(DispatchEngine::new(ledger, directory, notifier))
    }

    fn test_app() -> Router {
        let (shutdown_tx, _rx) = watch::channel(false);
        create_router(
            AppState::new(test_engine(), shutdown_tx),
            &ServerConfig::default(),
        )
    }

    async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read_json(response).await
    }

    async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        read_json(response).await
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send_json(app, "POST", uri, body).await
    }

    async fn delete_party(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        read_json(response).await
    }

    async fn register(app: &Router, party: &str, kind: &str) {
        let (status, _) = post_json(
            app,
            "/api/v1/parties",
            json!({ "party_id": party, "kind": kind }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app();
        let (status, body) = get(&app, "/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["version"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_register_and_inspect_parties() {
        let app = test_app();
        register(&app, "rider-1", "requester").await;
        register(&app, "worker-1", "worker").await;

        let (status, body) = get(&app, "/api/v1/parties").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = get(&app, "/api/v1/parties/worker-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "worker");
        assert_eq!(body["availability"], "available");
        assert_eq!(body["connected"], false);

        let (status, body) = get(&app, "/api/v1/parties/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "PARTY_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_ride_negotiation_over_http() {
        let app = test_app();
        register(&app, "rider-1", "requester").await;
        register(&app, "worker-1", "worker").await;
        register(&app, "worker-2", "worker").await;

        let (status, ride) = post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "rider-1", "pickup": "12 Elm St", "dropoff": "Airport T2" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ride["status"], "pending");
        let ride_id = ride["ride_id"].as_str().unwrap().to_string();

        let (status, offer) = post_json(
            &app,
            &format!("/api/v1/rides/{}/offers", ride_id),
            json!({ "worker": "worker-1", "price": 1200, "eta_minutes": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(offer["outcome"], "pending");

        let (status, _) = post_json(
            &app,
            &format!("/api/v1/rides/{}/offers", ride_id),
            json!({ "worker": "worker-2", "price": 950, "eta_minutes": 9 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, settled) = post_json(
            &app,
            &format!("/api/v1/rides/{}/accept", ride_id),
            json!({ "requester": "rider-1", "worker": "worker-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settled["status"], "accepted");

        // One won, one lost.
        let (_, fetched) = get(&app, &format!("/api/v1/rides/{}", ride_id)).await;
        let outcomes: Vec<&str> = fetched["offers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["outcome"].as_str().unwrap())
            .collect();
        assert!(outcomes.contains(&"won"));
        assert!(outcomes.contains(&"lost"));

        // The winner is committed.
        let (_, snap) = get(&app, "/api/v1/parties/worker-1").await;
        assert_eq!(snap["availability"], "busy");

        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/status", ride_id),
            json!({ "worker": "worker-1", "status": "picked_up" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "picked_up");

        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/status", ride_id),
            json!({ "worker": "worker-1", "status": "completed" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");

        // Completion frees the worker.
        let (_, snap) = get(&app, "/api/v1/parties/worker-1").await;
        assert_eq!(snap["availability"], "available");
    }

    #[tokio::test]
    async fn test_error_taxonomy_on_the_wire() {
        let app = test_app();

        // Unregistered requester cannot open a ride.
        let (status, body) = post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "ghost", "pickup": "A", "dropoff": "B" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NOT_AUTHENTICATED");

        register(&app, "rider-1", "requester").await;
        register(&app, "rider-2", "requester").await;
        register(&app, "worker-1", "worker").await;

        let (status, body) = get(&app, "/api/v1/rides/not-a-ride").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let unknown = RideId::generate();
        let (status, body) = get(&app, &format!("/api/v1/rides/{}", unknown)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "RIDE_NOT_FOUND");

        let (_, ride) = post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "rider-1", "pickup": "A", "dropoff": "B" }),
        )
        .await;
        let ride_id = ride["ride_id"].as_str().unwrap().to_string();

        // Zero price is an invalid offer.
        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/offers", ride_id),
            json!({ "worker": "worker-1", "price": 0, "eta_minutes": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_OFFER");

        // One offer per worker per ride.
        let (status, _) = post_json(
            &app,
            &format!("/api/v1/rides/{}/offers", ride_id),
            json!({ "worker": "worker-1", "price": 1000, "eta_minutes": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/offers", ride_id),
            json!({ "worker": "worker-1", "price": 900, "eta_minutes": 4 }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "DUPLICATE_OFFER");

        // Only the ride's own requester may accept.
        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/accept", ride_id),
            json!({ "requester": "rider-2", "worker": "worker-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_AUTHORIZED");

        // A second accept loses the race.
        let (status, _) = post_json(
            &app,
            &format!("/api/v1/rides/{}/accept", ride_id),
            json!({ "requester": "rider-1", "worker": "worker-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/accept", ride_id),
            json!({ "requester": "rider-1", "worker": "worker-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "RIDE_ALREADY_ACCEPTED");
    }

    #[tokio::test]
    async fn test_cancel_and_stale_offers() {
        let app = test_app();
        register(&app, "rider-1", "requester").await;
        register(&app, "worker-1", "worker").await;

        let (_, ride) = post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "rider-1", "pickup": "A", "dropoff": "B" }),
        )
        .await;
        let ride_id = ride["ride_id"].as_str().unwrap().to_string();

        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/cancel", ride_id),
            json!({ "actor": "rider-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");

        // Offers on a cancelled ride bounce.
        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/offers", ride_id),
            json!({ "worker": "worker-1", "price": 1000, "eta_minutes": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "RIDE_NOT_PENDING");

        // So does cancelling twice.
        let (status, body) = post_json(
            &app,
            &format!("/api/v1/rides/{}/cancel", ride_id),
            json!({ "actor": "rider-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_list_rides_with_filters() {
        let app = test_app();
        register(&app, "rider-1", "requester").await;

        let (_, first) = post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "rider-1", "pickup": "A", "dropoff": "B" }),
        )
        .await;
        post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "rider-1", "pickup": "C", "dropoff": "D" }),
        )
        .await;
        post_json(
            &app,
            &format!("/api/v1/rides/{}/cancel", first["ride_id"].as_str().unwrap()),
            json!({ "actor": "rider-1" }),
        )
        .await;

        let (status, body) = get(&app, "/api/v1/rides").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = get(&app, "/api/v1/rides?status=pending").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = get(&app, "/api/v1/rides?requester=rider-1&limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_availability_endpoint() {
        let app = test_app();
        register(&app, "rider-1", "requester").await;
        register(&app, "worker-1", "worker").await;

        let (status, body) = send_json(
            &app,
            "PUT",
            "/api/v1/parties/worker-1/availability",
            json!({ "availability": "busy" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["availability"], "busy");

        // Requesters have no availability to set.
        let (status, body) = send_json(
            &app,
            "PUT",
            "/api/v1/parties/rider-1/availability",
            json!({ "availability": "busy" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_AUTHORIZED");

        let (status, body) = send_json(
            &app,
            "PUT",
            "/api/v1/parties/ghost/availability",
            json!({ "availability": "busy" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NOT_AUTHENTICATED");
    }

    #[tokio::test]
    async fn test_remove_party_endpoint() {
        let app = test_app();
        register(&app, "worker-1", "worker").await;

        let (status, body) = delete_party(&app, "/api/v1/parties/worker-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["availability"], "offline");
        assert_eq!(body["connected"], false);

        let (status, body) = delete_party(&app, "/api/v1/parties/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "PARTY_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_events_endpoint_records_the_flow() {
        let app = test_app();
        register(&app, "rider-1", "requester").await;
        register(&app, "worker-1", "worker").await;

        let (_, ride) = post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "rider-1", "pickup": "A", "dropoff": "B" }),
        )
        .await;
        let ride_id = ride["ride_id"].as_str().unwrap().to_string();
        post_json(
            &app,
            &format!("/api/v1/rides/{}/offers", ride_id),
            json!({ "worker": "worker-1", "price": 1000, "eta_minutes": 5 }),
        )
        .await;
        post_json(
            &app,
            &format!("/api/v1/rides/{}/accept", ride_id),
            json!({ "requester": "rider-1", "worker": "worker-1" }),
        )
        .await;

        let (status, body) = get(&app, "/api/v1/events").await;
        assert_eq!(status, StatusCode::OK);
        let kinds: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event"]["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec!["ride.created", "ride.offer.received", "ride.accepted"]
        );

        let (status, body) = get(&app, &format!("/api/v1/events?ride_id={}", ride_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = get(&app, "/api/v1/events?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        let last = &body.as_array().unwrap()[0];
        assert_eq!(last["event"]["type"], "ride.accepted");
    }

    #[tokio::test]
    async fn test_party_stream_connects_and_registers() {
        let app = test_app();

        // Unknown party with no declared kind is rejected.
        let (status, body) = get(&app, "/api/v1/parties/worker-9/stream").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        // Declaring a kind connects and registers in one step.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/parties/worker-9/stream?kind=worker")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("text/event-stream"));

        let (status, snap) = get(&app, "/api/v1/parties/worker-9").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snap["kind"], "worker");
        assert_eq!(snap["connected"], true);
    }

    #[tokio::test]
    async fn test_status_endpoint_aggregates() {
        let app = test_app();
        register(&app, "rider-1", "requester").await;
        register(&app, "worker-1", "worker").await;
        post_json(
            &app,
            "/api/v1/rides",
            json!({ "requester": "rider-1", "pickup": "A", "dropoff": "B" }),
        )
        .await;

        let (status, body) = get(&app, "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["stats"]["total_rides"], 1);
        assert_eq!(body["stats"]["pending"], 1);
        // Detached registrations hold no live stream.
        assert_eq!(body["connected_parties"], 0);
        assert_eq!(body["available_workers"], 0);
    }

    #[tokio::test]
    async fn test_shutdown_endpoint_signals() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let app = create_router(
            AppState::new(test_engine(), shutdown_tx),
            &ServerConfig::default(),
        );

        let (status, body) = post_json(&app, "/api/v1/system/shutdown", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "accepted");
        assert!(*shutdown_rx.borrow_and_update());
    }
}
