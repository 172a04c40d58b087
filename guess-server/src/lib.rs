use chrono::{DateTime, Utc};
use guess_types::RoundPhaseKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::Filter;

use crate::session_driver::SessionHandle;
use crate::websocket::{ConnectionManager, RateLimiter};

pub mod config;
pub mod session_driver;
pub mod websocket;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub player_count: usize,
    pub round_number: u64,
    pub phase: RoundPhaseKind,
    pub uptime_seconds: i64,
}

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    session: SessionHandle,
    rate_limiter: RateLimiter,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let started_at = Utc::now();

    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let session_filter = warp::any().map({
        let session = session.clone();
        move || session.clone()
    });

    let rate_limiter_filter = warp::any().map(move || rate_limiter.clone());

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter)
        .and(session_filter.clone())
        .and(rate_limiter_filter)
        .map(
            |ws: warp::ws::Ws, conn_mgr, session, rate_limiter| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(socket, conn_mgr, session, rate_limiter)
                })
            },
        );

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    let status = warp::path("status")
        .and(warp::get())
        .and(session_filter)
        .and(warp::any().map(move || started_at))
        .and_then(handle_status_request);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET"]);

    websocket
        .or(health)
        .or(status)
        .with(cors)
        .with(warp::log("picture_guess"))
}

async fn handle_status_request(
    session: SessionHandle,
    started_at: DateTime<Utc>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match session.status().await {
        Ok(status) => {
            let response = StatusResponse {
                player_count: status.player_count,
                round_number: status.round_number,
                phase: status.phase,
                uptime_seconds: (Utc::now() - started_at).num_seconds().max(0),
            };
            Ok(warp::reply::with_status(
                warp::reply::json(&response),
                warp::http::StatusCode::OK,
            ))
        }
        Err(err) => {
            tracing::warn!("Status requested while session is down: {}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Game session unavailable"
                })),
                warp::http::StatusCode::SERVICE_UNAVAILABLE,
            ))
        }
    }
}

#[cfg(test)]
mod route_tests {
    use super::*;
    use guess_core::{Answer, QuestionPool, QuestionRecord, SessionConfig};

    fn create_test_app() -> (
        impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone,
        SessionHandle,
    ) {
        let connection_manager = Arc::new(ConnectionManager::new());
        let pool = QuestionPool::new(vec![QuestionRecord {
            id: 1,
            image_url: "/images/otter.jpg".to_string(),
            question: "Which animal is this?".to_string(),
            answer: Answer::Text("Otter".to_string()),
        }]);
        let (session, _task) = session_driver::spawn_session(
            SessionConfig::default(),
            pool,
            connection_manager.clone(),
        );

        (
            create_routes(connection_manager, session.clone(), RateLimiter::new()),
            session,
        )
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _session) = create_test_app();

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_idle_session() {
        let (app, _session) = create_test_app();

        let response = warp::test::request()
            .method("GET")
            .path("/status")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        let status: StatusResponse = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(status.player_count, 0);
        assert_eq!(status.round_number, 0);
        assert_eq!(status.phase, RoundPhaseKind::Idle);
        assert!(status.uptime_seconds >= 0);
    }

    #[tokio::test]
    async fn test_status_after_shutdown_is_unavailable() {
        let (app, session) = create_test_app();
        session.shutdown().await.unwrap();

        let response = warp::test::request()
            .method("GET")
            .path("/status")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 503);
    }

    #[tokio::test]
    async fn test_http_endpoints_cors() {
        let (app, _session) = create_test_app();

        let response = warp::test::request()
            .method("OPTIONS")
            .path("/health")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "GET")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert!(
            response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }

    #[tokio::test]
    async fn test_invalid_routes() {
        let (app, _session) = create_test_app();

        let response = warp::test::request()
            .method("GET")
            .path("/invalid")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 404);
    }
}
