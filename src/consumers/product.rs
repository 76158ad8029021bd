use super::Pump;
use crate::channel::{ChannelError, ChannelHandle, SendOutcome};
use crate::model::{MessageKind, OutboundIntent};
use crate::signals::{SignalBus, StoreSignal};

#[derive(Debug)]
pub struct ProductTracker {
    channel: ChannelHandle,
    _pump: Pump,
}

impl ProductTracker {
    pub fn attach(channel: &ChannelHandle, bus: &SignalBus) -> Self {
        let subscription = channel.subscribe(&[
            MessageKind::ProductUpdate,
            MessageKind::PriceAlert,
            MessageKind::StockAlert,
        ]);
        let bus = bus.clone();
        let pump = Pump::start("product", subscription, move |message| {
            if let Some(signal) = StoreSignal::from_inbound(message) {
                bus.publish(signal);
            }
        });
        Self {
            channel: channel.clone(),
            _pump: pump,
        }
    }

    pub fn track_product_view(&self, product_id: &str) -> Result<SendOutcome, ChannelError> {
        self.channel.send(&OutboundIntent::ProductView {
            product_id: product_id.to_string(),
        })
    }

    pub fn track_product_review(&self, product_id: &str, rating: u8) -> Result<SendOutcome, ChannelError> {
        self.channel.send(&OutboundIntent::ProductReview {
            product_id: product_id.to_string(),
            rating,
        })
    }

    pub fn track_wishlist_add(&self, product_id: &str) -> Result<SendOutcome, ChannelError> {
        self.channel.send(&OutboundIntent::WishlistAdd {
            product_id: product_id.to_string(),
        })
    }

    pub fn track_wishlist_remove(&self, product_id: &str) -> Result<SendOutcome, ChannelError> {
        self.channel.send(&OutboundIntent::WishlistRemove {
            product_id: product_id.to_string(),
        })
    }
}
