mod support;

use doodle_duel::domain::RasterImage;
use futures::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

async fn start_game(client: &reqwest::Client, base_url: &str, prompt: &str) -> Value {
    let res = client
        .post(format!("{base_url}/games"))
        .json(&json!({ "prompt": prompt }))
        .send()
        .await
        .expect("start should succeed");
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.expect("start response should be json")
}

async fn wait_for_complete(client: &reqwest::Client, base_url: &str, game_id: &Value) {
    for _ in 0..200 {
        let game: Value = client
            .get(format!("{base_url}/game"))
            .send()
            .await
            .expect("game request should succeed")
            .json()
            .await
            .expect("game should be json");
        if &game["game_id"] == game_id && game["phase"] == "complete" {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("restarted game never completed");
}

#[tokio::test]
async fn restarted_game_does_not_inherit_previous_drawing() {
    // Long countdowns so the upload lands well inside player 1's round.
    let base_url = support::ensure_server_with(|config| {
        config.round.round_duration = 60;
        config.round.warning_thresholds = vec![1];
    });
    let client = reqwest::Client::new();
    let ws_url = format!("{}/ws", base_url.replacen("http://", "ws://", 1));
    let (mut socket, _) = tokio_tungstenite::connect_async(ws_url)
        .await
        .expect("websocket should connect");

    start_game(&client, base_url, "bird").await;

    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("input should be enabled")
            .expect("socket should stay open")
            .expect("frame should be valid");
        let Message::Text(text) = message else {
            continue;
        };
        let value: Value = serde_json::from_str(text.as_str()).expect("server sends json");
        if value["type"] == "canvas"
            && value["data"]["command"] == "set_input_enabled"
            && value["data"]["enabled"] == true
        {
            break;
        }
    }

    let ink = RasterImage::from_rgba(16, 16, [0, 0, 0, 255].repeat(256)).expect("valid buffer");
    let png = ink.encode_png().expect("png should encode");
    socket
        .send(Message::Binary(png.into()))
        .await
        .expect("upload should send");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let restarted = start_game(&client, base_url, "shark").await;
    wait_for_complete(&client, base_url, &restarted["game_id"]).await;

    let bytes = std::fs::read(support::artifact_dir().join("player1_drawing.png"))
        .expect("player 1 sketch should exist");
    let sketch = RasterImage::decode_png(&bytes).expect("sketch should decode");
    assert_eq!(sketch.pixels().get_pixel(0, 0).0, [255, 255, 255, 255]);
}
