use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type ResourcePayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Notification,
    CartUpdated,
    ProductUpdate,
    PriceAlert,
    StockAlert,
    OrderUpdate,
    AnalyticsUpdate,
    RealtimeStats,
    Ping,
}

impl MessageKind {
    pub const ALL: [MessageKind; 9] = [
        MessageKind::Notification,
        MessageKind::CartUpdated,
        MessageKind::ProductUpdate,
        MessageKind::PriceAlert,
        MessageKind::StockAlert,
        MessageKind::OrderUpdate,
        MessageKind::AnalyticsUpdate,
        MessageKind::RealtimeStats,
        MessageKind::Ping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::CartUpdated => "cart_updated",
            Self::ProductUpdate => "product_update",
            Self::PriceAlert => "price_alert",
            Self::StockAlert => "stock_alert",
            Self::OrderUpdate => "order_update",
            Self::AnalyticsUpdate => "analytics_update",
            Self::RealtimeStats => "realtime_stats",
            Self::Ping => "ping",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(
        rename = "type",
        default = "default_notification_kind",
        deserialize_with = "notification_kind"
    )]
    pub kind: String,
    pub title: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub message: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_notification_kind() -> String {
    "info".to_string()
}

// null, empty or non-string kinds fall back to "info"
fn notification_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(kind)) if !kind.is_empty() => kind,
        _ => default_notification_kind(),
    })
}

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// anything other than "low" or "high" is shown as medium
fn lenient_priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Priority, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(raw)) if raw == "low" => Priority::Low,
        Some(Value::String(raw)) if raw == "high" => Priority::High,
        _ => Priority::Medium,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsUpdatePayload {
    pub metrics: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeStatsPayload {
    pub stats: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PingPayload {
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    Notification(NotificationPayload),
    CartUpdated(ResourcePayload),
    ProductUpdate(ResourcePayload),
    PriceAlert(ResourcePayload),
    StockAlert(ResourcePayload),
    OrderUpdate(ResourcePayload),
    AnalyticsUpdate(AnalyticsUpdatePayload),
    RealtimeStats(RealtimeStatsPayload),
    Ping(PingPayload),
    Unknown { tag: String, data: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub timestamp: u64,
    pub originator_id: Option<String>,
    pub payload: InboundPayload,
}

impl InboundMessage {
    pub fn kind(&self) -> Option<MessageKind> {
        let kind = match &self.payload {
            InboundPayload::Notification(_) => MessageKind::Notification,
            InboundPayload::CartUpdated(_) => MessageKind::CartUpdated,
            InboundPayload::ProductUpdate(_) => MessageKind::ProductUpdate,
            InboundPayload::PriceAlert(_) => MessageKind::PriceAlert,
            InboundPayload::StockAlert(_) => MessageKind::StockAlert,
            InboundPayload::OrderUpdate(_) => MessageKind::OrderUpdate,
            InboundPayload::AnalyticsUpdate(_) => MessageKind::AnalyticsUpdate,
            InboundPayload::RealtimeStats(_) => MessageKind::RealtimeStats,
            InboundPayload::Ping(_) => MessageKind::Ping,
            InboundPayload::Unknown { .. } => return None,
        };
        Some(kind)
    }

    pub fn tag(&self) -> &str {
        match &self.payload {
            InboundPayload::Unknown { tag, .. } => tag,
            _ => self.kind().map(MessageKind::as_str).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundIntent {
    Ping { timestamp: u64 },
    AddToCart { product_id: String, quantity: u32 },
    RemoveFromCart { product_id: String },
    CheckoutStart { total: f64, item_count: u32 },
    CheckoutComplete { order_id: String, total: f64 },
    ProductView { product_id: String },
    ProductReview { product_id: String, rating: u8 },
    WishlistAdd { product_id: String },
    WishlistRemove { product_id: String },
}

impl OutboundIntent {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::AddToCart { .. } => "add_to_cart",
            Self::RemoveFromCart { .. } => "remove_from_cart",
            Self::CheckoutStart { .. } => "checkout_start",
            Self::CheckoutComplete { .. } => "checkout_complete",
            Self::ProductView { .. } => "product_view",
            Self::ProductReview { .. } => "product_review",
            Self::WishlistAdd { .. } => "wishlist_add",
            Self::WishlistRemove { .. } => "wishlist_remove",
        }
    }
}
