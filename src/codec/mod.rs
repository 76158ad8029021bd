use crate::model::{InboundMessage, InboundPayload, MessageKind};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
struct WireEnvelopeOut<'a, T: Serialize + ?Sized> {
    #[serde(rename = "type")]
    message_type: &'a str,
    data: &'a T,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WireEnvelopeIn {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    data: Value,
    timestamp: u64,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug)]
pub enum CodecError {
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    Payload {
        tag: &'static str,
        source: serde_json::Error,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "encode failed: {err}"),
            Self::Decode(err) => write!(f, "decode failed: {err}"),
            Self::Payload { tag, source } => write!(f, "invalid {tag} payload: {source}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
            Self::Payload { source, .. } => Some(source),
        }
    }
}

pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn encode<T: Serialize + ?Sized>(
    message_type: &str,
    data: &T,
    user_id: Option<&str>,
) -> Result<String, CodecError> {
    encode_at(message_type, data, now_unix_ms(), user_id)
}

pub fn encode_at<T: Serialize + ?Sized>(
    message_type: &str,
    data: &T,
    timestamp: u64,
    user_id: Option<&str>,
) -> Result<String, CodecError> {
    let envelope = WireEnvelopeOut {
        message_type,
        data,
        timestamp,
        user_id,
    };
    serde_json::to_string(&envelope).map_err(CodecError::Encode)
}

pub fn decode(raw: &str) -> Result<InboundMessage, CodecError> {
    let envelope: WireEnvelopeIn = serde_json::from_str(raw).map_err(CodecError::Decode)?;
    typed(envelope)
}

pub fn decode_bytes(raw: &[u8]) -> Result<InboundMessage, CodecError> {
    let envelope: WireEnvelopeIn = serde_json::from_slice(raw).map_err(CodecError::Decode)?;
    typed(envelope)
}

fn typed(envelope: WireEnvelopeIn) -> Result<InboundMessage, CodecError> {
    let payload = match MessageKind::from_tag(&envelope.message_type) {
        Some(MessageKind::Notification) => {
            InboundPayload::Notification(decode_payload(MessageKind::Notification, envelope.data)?)
        }
        Some(MessageKind::CartUpdated) => {
            InboundPayload::CartUpdated(decode_payload(MessageKind::CartUpdated, envelope.data)?)
        }
        Some(MessageKind::ProductUpdate) => {
            InboundPayload::ProductUpdate(decode_payload(MessageKind::ProductUpdate, envelope.data)?)
        }
        Some(MessageKind::PriceAlert) => {
            InboundPayload::PriceAlert(decode_payload(MessageKind::PriceAlert, envelope.data)?)
        }
        Some(MessageKind::StockAlert) => {
            InboundPayload::StockAlert(decode_payload(MessageKind::StockAlert, envelope.data)?)
        }
        Some(MessageKind::OrderUpdate) => {
            InboundPayload::OrderUpdate(decode_payload(MessageKind::OrderUpdate, envelope.data)?)
        }
        Some(MessageKind::AnalyticsUpdate) => InboundPayload::AnalyticsUpdate(decode_payload(
            MessageKind::AnalyticsUpdate,
            envelope.data,
        )?),
        Some(MessageKind::RealtimeStats) => {
            InboundPayload::RealtimeStats(decode_payload(MessageKind::RealtimeStats, envelope.data)?)
        }
        Some(MessageKind::Ping) => {
            let data = if envelope.data.is_null() {
                Value::Object(Default::default())
            } else {
                envelope.data
            };
            InboundPayload::Ping(decode_payload(MessageKind::Ping, data)?)
        }
        None => InboundPayload::Unknown {
            tag: envelope.message_type,
            data: envelope.data,
        },
    };

    Ok(InboundMessage {
        timestamp: envelope.timestamp,
        originator_id: envelope.user_id,
        payload,
    })
}

fn decode_payload<T: DeserializeOwned>(kind: MessageKind, data: Value) -> Result<T, CodecError> {
    serde_json::from_value(data).map_err(|source| CodecError::Payload {
        tag: kind.as_str(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OutboundIntent, Priority};
    use serde::ser::Error as _;

    #[test]
    fn decodes_notification_with_originator() {
        let raw = r#"{"type":"notification","data":{"title":"Low stock","priority":"low"},"timestamp":1700000000000,"user_id":"u-7"}"#;
        let msg = decode(raw).unwrap();
        assert_eq!(msg.timestamp, 1_700_000_000_000);
        assert_eq!(msg.originator_id.as_deref(), Some("u-7"));
        match msg.payload {
            InboundPayload::Notification(n) => {
                assert_eq!(n.title, "Low stock");
                assert_eq!(n.priority, Priority::Low);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_accepted() {
        let msg = decode(r#"{"type":"flash_sale","data":{"pct":20},"timestamp":5}"#).unwrap();
        assert_eq!(msg.kind(), None);
        assert_eq!(msg.tag(), "flash_sale");
    }

    #[test]
    fn resource_tags_keep_payload_verbatim() {
        let msg = decode(
            r#"{"type":"price_alert","data":{"product_id":"p1","old_price":10.5,"new_price":8.0},"timestamp":9}"#,
        )
        .unwrap();
        match msg.payload {
            InboundPayload::PriceAlert(data) => {
                assert_eq!(data["product_id"], "p1");
                assert_eq!(data["new_price"], 8.0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_and_incomplete_frames() {
        assert!(matches!(decode("{not json"), Err(CodecError::Decode(_))));
        assert!(matches!(
            decode(r#"{"type":"ping","data":{}}"#),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            decode(r#"{"data":{},"timestamp":1}"#),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn rejects_payload_with_wrong_shape_for_tag() {
        let err = decode(r#"{"type":"cart_updated","data":[1,2],"timestamp":1}"#).unwrap_err();
        assert!(matches!(err, CodecError::Payload { tag: "cart_updated", .. }));

        let err = decode(r#"{"type":"notification","data":{"message":"no title"},"timestamp":1}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::Payload { tag: "notification", .. }));
    }

    fn notification(raw: &str) -> crate::model::NotificationPayload {
        match decode(raw).unwrap().payload {
            InboundPayload::Notification(n) => n,
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn null_notification_fields_fall_back_to_defaults() {
        let n = notification(
            r#"{"type":"notification","data":{"title":"x","type":null,"message":null,"priority":null},"timestamp":1}"#,
        );
        assert_eq!(n.kind, "info");
        assert_eq!(n.message, "");
        assert_eq!(n.priority, Priority::Medium);
    }

    #[test]
    fn empty_notification_kind_and_priority_fall_back() {
        let n = notification(
            r#"{"type":"notification","data":{"title":"x","type":"","priority":""},"timestamp":1}"#,
        );
        assert_eq!(n.kind, "info");
        assert_eq!(n.priority, Priority::Medium);
    }

    #[test]
    fn unrecognised_priority_is_shown_as_medium() {
        let n = notification(
            r#"{"type":"notification","data":{"title":"x","type":"order","priority":"urgent"},"timestamp":1}"#,
        );
        assert_eq!(n.kind, "order");
        assert_eq!(n.priority, Priority::Medium);

        let n = notification(
            r#"{"type":"notification","data":{"title":"x","priority":3},"timestamp":1}"#,
        );
        assert_eq!(n.priority, Priority::Medium);

        let n = notification(
            r#"{"type":"notification","data":{"title":"x","priority":"high"},"timestamp":1}"#,
        );
        assert_eq!(n.priority, Priority::High);
    }

    #[test]
    fn ping_without_data_decodes() {
        let msg = decode(r#"{"type":"ping","timestamp":3}"#).unwrap();
        assert_eq!(msg.payload, InboundPayload::Ping(Default::default()));
    }

    #[test]
    fn binary_frames_decode_like_text() {
        let raw = br#"{"type":"realtime_stats","data":{"stats":{"online":12}},"timestamp":4}"#;
        let msg = decode_bytes(raw).unwrap();
        match msg.payload {
            InboundPayload::RealtimeStats(p) => assert_eq!(p.stats["online"], 12),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn encodes_intent_envelope() {
        let intent = OutboundIntent::CheckoutStart {
            total: 59.9,
            item_count: 3,
        };
        let raw = encode_at(intent.tag(), &intent, 42, None).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "checkout_start");
        assert_eq!(value["data"]["item_count"], 3);
        assert_eq!(value["timestamp"], 42);
        assert!(value.get("user_id").is_none());

        let raw = encode_at("ping", &serde_json::json!({ "timestamp": 42 }), 42, Some("u-1"))
            .unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["user_id"], "u-1");
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("payload cannot be serialized"))
        }
    }

    #[test]
    fn encode_failure_is_reported() {
        let err = encode("custom", &Unserializable, None).unwrap_err();
        assert!(matches!(err, CodecError::Encode(_)));
        assert!(err.to_string().contains("payload cannot be serialized"));
    }
}
