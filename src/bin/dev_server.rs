use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use storefront_live::codec;
use tokio::net::TcpListener;
use uuid::Uuid;

const DEFAULT_ADDR: &str = "127.0.0.1:5001";
const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    user_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let addr: SocketAddr = std::env::var("STOREFRONT_DEV_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let app = Router::new().route("/ws", get(ws_handler));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dev server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown: ctrl-c");
        })
        .await?;
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    let session_id = Uuid::new_v4().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, session_id))
}

async fn handle_socket(mut socket: WebSocket, session_id: String) {
    tracing::info!(session = %session_id, "client connected");
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    let mut round = 0usize;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (tag, data) = sample(round);
                round += 1;
                if !send_envelope(&mut socket, tag, &data, None).await {
                    break;
                }
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some((tag, data, originator)) = echo_for(&text, &session_id) {
                        if !send_envelope(&mut socket, tag, &data, Some(originator.as_str())).await {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    tracing::warn!(session = %session_id, error = %err, "socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(session = %session_id, "client disconnected");
}

async fn send_envelope(socket: &mut WebSocket, tag: &str, data: &Value, user_id: Option<&str>) -> bool {
    let frame = match codec::encode(tag, data, user_id) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(tag, error = %err, "cannot encode sample");
            return true;
        }
    };
    socket.send(Message::Text(frame)).await.is_ok()
}

fn echo_for(text: &str, session_id: &str) -> Option<(&'static str, Value, String)> {
    let envelope: ClientEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(session = %session_id, error = %err, "ignoring malformed client frame");
            return None;
        }
    };
    tracing::debug!(session = %session_id, message_type = %envelope.message_type, "client event");

    let action = match envelope.message_type.as_str() {
        "add_to_cart" => "added",
        "remove_from_cart" => "removed",
        _ => return None,
    };
    let originator = envelope.user_id.unwrap_or_else(|| session_id.to_string());
    let data = json!({
        "action": action,
        "product_id": envelope.data.get("product_id").cloned().unwrap_or(Value::Null),
        "quantity": envelope.data.get("quantity").cloned().unwrap_or(Value::Null),
        "session_id": session_id,
    });
    Some(("cart_updated", data, originator))
}

fn sample(round: usize) -> (&'static str, Value) {
    match round % 5 {
        0 => (
            "notification",
            json!({
                "type": "info",
                "title": "Flash sale",
                "message": "Sneakers are 20% off for the next hour",
                "priority": "low",
                "category": "promo",
            }),
        ),
        1 => (
            "price_alert",
            json!({ "product_id": "sku-1042", "old_price": 129.0, "new_price": 99.0 }),
        ),
        2 => (
            "stock_alert",
            json!({ "product_id": "sku-2210", "stock": 3 }),
        ),
        3 => (
            "realtime_stats",
            json!({ "stats": { "online_users": 10 + round % 7, "orders_last_hour": round } }),
        ),
        _ => (
            "notification",
            json!({
                "type": "order",
                "title": "Order shipped",
                "message": "Order #1001 is on its way",
                "priority": "medium",
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_intents_echo_with_sender_identity() {
        let raw = r#"{"type":"add_to_cart","data":{"product_id":"p-1","quantity":2},"timestamp":1,"user_id":"u-1"}"#;
        let (tag, data, originator) = echo_for(raw, "session-a").unwrap();
        assert_eq!(tag, "cart_updated");
        assert_eq!(originator, "u-1");
        assert_eq!(data["action"], "added");
        assert_eq!(data["quantity"], 2);

        let raw = r#"{"type":"remove_from_cart","data":{"product_id":"p-1"},"timestamp":2}"#;
        let (_, data, originator) = echo_for(raw, "session-a").unwrap();
        assert_eq!(originator, "session-a");
        assert_eq!(data["action"], "removed");
    }

    #[test]
    fn other_frames_are_not_echoed() {
        assert!(echo_for(r#"{"type":"product_view","data":{"product_id":"p"},"timestamp":1}"#, "s").is_none());
        assert!(echo_for("garbage", "s").is_none());
    }

    #[test]
    fn samples_decode_with_the_client_codec() {
        for round in 0..5 {
            let (tag, data) = sample(round);
            let frame = codec::encode(tag, &data, None).unwrap();
            let decoded = codec::decode(&frame).unwrap();
            assert_eq!(decoded.tag(), tag);
            assert!(decoded.kind().is_some(), "{tag} should be a known kind");
        }
    }
}
