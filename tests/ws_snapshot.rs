mod support;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn connecting_client_receives_current_state_snapshot() {
    let base_url = support::ensure_server();
    let ws_url = format!("{}/ws", base_url.replacen("http://", "ws://", 1));
    let (mut socket, _) = tokio_tungstenite::connect_async(ws_url)
        .await
        .expect("websocket should connect");

    let mut seen = HashSet::new();
    while !(seen.contains("engine") && seen.contains("outputs") && seen.contains("chrome")) {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("snapshot should arrive")
            .expect("socket should stay open")
            .expect("frame should be valid");
        if let Message::Text(text) = message {
            let value: Value = serde_json::from_str(text.as_str()).expect("server sends json");
            let kind = value["type"].as_str().expect("message has a type").to_string();
            seen.insert(kind);
        }
    }

    // Invalid uploads are tolerated below the disconnect threshold.
    socket
        .send(Message::Text("{\"type\":\"canvas\",\"data\":{\"png_base64\":\"!\"}}".into()))
        .await
        .expect("send should succeed");
    socket
        .send(Message::Ping(Vec::new().into()))
        .await
        .expect("ping should succeed");
    let next = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("connection should answer");
    assert!(matches!(next, Some(Ok(_))));
}
