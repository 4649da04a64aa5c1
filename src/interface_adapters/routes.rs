use crate::interface_adapters::handlers::{
    get_engine, get_game, get_output_image, get_results, list_players, put_player,
    recompute_results, start_game,
};
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/players", get(list_players))
        .route("/players/{slot}", put(put_player))
        .route("/games", post(start_game))
        .route("/game", get(get_game))
        .route("/results", get(get_results))
        .route("/results/recompute", post(recompute_results))
        .route("/outputs/{slot}", get(get_output_image))
        .route("/engine", get(get_engine))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frameworks::config::{EngineKind, GameConfig};
    use crate::frameworks::server::build_state;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn build_test_app() -> Router {
        let mut config = GameConfig::default();
        config.engine.kind = EngineKind::Echo;
        config.server.artifact_dir =
            std::env::temp_dir().join(format!("doodle-routes-{}", uuid::Uuid::new_v4()));
        let state = build_state(&config).expect("expected state to build");
        app(state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("expected response body");
        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("expected json body")
        };
        (status, payload)
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("expected request to build")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("expected request to build")
    }

    #[tokio::test]
    async fn when_player_signs_in_then_roster_shows_their_name() {
        let app = build_test_app();

        let (status, payload) = send(
            &app,
            json_request("PUT", "/players/2", r#"{"display_name":"  Robin  "}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["display_name"], "Robin");

        let (status, payload) = send(&app, get_request("/players")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload[0]["display_name"], "Player 1");
        assert_eq!(payload[1]["slot"], 2);
        assert_eq!(payload[1]["display_name"], "Robin");
    }

    #[tokio::test]
    async fn when_display_name_is_blank_then_returns_400_and_error_message() {
        let app = build_test_app();

        let (status, payload) = send(
            &app,
            json_request("PUT", "/players/1", r#"{"display_name":"   "}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "display_name is required");
    }

    #[tokio::test]
    async fn when_slot_does_not_exist_then_returns_404_and_error_message() {
        let app = build_test_app();

        let (status, payload) = send(
            &app,
            json_request("PUT", "/players/3", r#"{"display_name":"Sam"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload["error"], "unknown player slot");
    }

    #[tokio::test]
    async fn when_no_game_was_started_then_game_returns_404() {
        let app = build_test_app();

        let (status, payload) = send(&app, get_request("/game")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload["error"], "no game started");
    }

    #[tokio::test]
    async fn when_game_starts_then_player_one_is_ready_with_requested_prompt() {
        let app = build_test_app();

        let (status, payload) =
            send(&app, json_request("POST", "/games", r#"{"prompt":"shark"}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payload["prompt"], "shark");
        let game_id = payload["game_id"].clone();

        let (status, payload) = send(&app, get_request("/game")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["game_id"], game_id);
        assert_eq!(payload["current_player"], 1);
        assert_eq!(payload["phase"], "ready");
        assert_eq!(payload["seconds_remaining"], 30);
    }

    #[tokio::test]
    async fn when_game_starts_without_body_then_prompt_is_chosen() {
        let app = build_test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/games")
            .body(Body::empty())
            .expect("expected request to build");

        let (status, payload) = send(&app, request).await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(["shark", "bird", "turtle"].contains(&payload["prompt"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn when_nothing_has_run_then_results_are_pending() {
        let app = build_test_app();

        let (status, payload) = send(&app, get_request("/results")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(payload["results"].is_null());
        assert!(payload["score"].is_null());
        assert_eq!(payload["outputs"][0]["status"], "not_started");
        assert_eq!(payload["outputs"][1]["status"], "not_started");
    }

    #[tokio::test]
    async fn when_output_is_not_finished_then_image_returns_404() {
        let app = build_test_app();

        let (status, payload) = send(&app, get_request("/outputs/1")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload["error"], "output not ready");
    }

    #[tokio::test]
    async fn when_recompute_is_requested_then_returns_202() {
        let app = build_test_app();

        let (status, _) = send(&app, json_request("POST", "/results/recompute", "")).await;

        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn when_engine_is_queried_then_reports_load_state() {
        let app = build_test_app();

        let (status, payload) = send(&app, get_request("/engine")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(["not_loaded", "loading", "loaded"].contains(&payload["state"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn when_games_route_is_called_with_get_then_returns_405() {
        let app = build_test_app();

        let response = app.oneshot(get_request("/games")).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
