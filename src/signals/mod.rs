use crate::model::{InboundMessage, InboundPayload, ResourcePayload};
use tokio::sync::broadcast;

const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreSignal {
    CartUpdated(ResourcePayload),
    ProductUpdated(ResourcePayload),
    PriceAlert(ResourcePayload),
    StockAlert(ResourcePayload),
    OrderUpdated(ResourcePayload),
}

impl StoreSignal {
    pub fn from_inbound(message: &InboundMessage) -> Option<Self> {
        let signal = match &message.payload {
            InboundPayload::CartUpdated(data) => Self::CartUpdated(data.clone()),
            InboundPayload::ProductUpdate(data) => Self::ProductUpdated(data.clone()),
            InboundPayload::PriceAlert(data) => Self::PriceAlert(data.clone()),
            InboundPayload::StockAlert(data) => Self::StockAlert(data.clone()),
            InboundPayload::OrderUpdate(data) => Self::OrderUpdated(data.clone()),
            _ => return None,
        };
        Some(signal)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CartUpdated(_) => "cart_updated",
            Self::ProductUpdated(_) => "product_updated",
            Self::PriceAlert(_) => "price_alert",
            Self::StockAlert(_) => "stock_alert",
            Self::OrderUpdated(_) => "order_updated",
        }
    }

    pub fn data(&self) -> &ResourcePayload {
        match self {
            Self::CartUpdated(data)
            | Self::ProductUpdated(data)
            | Self::PriceAlert(data)
            | Self::StockAlert(data)
            | Self::OrderUpdated(data) => data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<StoreSignal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, signal: StoreSignal) -> usize {
        let name = signal.name();
        match self.tx.send(signal) {
            Ok(listeners) => listeners,
            Err(_) => {
                tracing::trace!(signal = name, "signal published with no listeners");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreSignal> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn payload(product: &str) -> ResourcePayload {
        let mut data = Map::new();
        data.insert("product_id".to_string(), json!(product));
        data
    }

    #[test]
    fn publish_without_listeners_is_harmless() {
        let bus = SignalBus::new();
        assert_eq!(bus.publish(StoreSignal::StockAlert(payload("p1"))), 0);
    }

    #[tokio::test]
    async fn every_listener_receives_each_signal() {
        let bus = SignalBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(StoreSignal::PriceAlert(payload("p1"))), 2);

        let got_a = a.recv().await.unwrap();
        let got_b = b.recv().await.unwrap();
        assert_eq!(got_a, got_b);
        assert_eq!(got_a.name(), "price_alert");
        assert_eq!(got_a.data()["product_id"], "p1");
    }

    #[test]
    fn only_resource_tags_map_to_signals() {
        let order = InboundMessage {
            timestamp: 1,
            originator_id: None,
            payload: InboundPayload::OrderUpdate(payload("o1")),
        };
        assert!(matches!(
            StoreSignal::from_inbound(&order),
            Some(StoreSignal::OrderUpdated(_))
        ));

        let ping = InboundMessage {
            timestamp: 1,
            originator_id: None,
            payload: InboundPayload::Ping(Default::default()),
        };
        assert!(StoreSignal::from_inbound(&ping).is_none());
    }
}
