use super::Pump;
use crate::channel::{ChannelError, ChannelHandle, SendOutcome};
use crate::model::{MessageKind, OutboundIntent};
use crate::signals::{SignalBus, StoreSignal};

#[derive(Debug)]
pub struct CartTracker {
    channel: ChannelHandle,
    _pump: Pump,
}

impl CartTracker {
    pub fn attach(channel: &ChannelHandle, bus: &SignalBus) -> Self {
        let subscription = channel.subscribe(&[MessageKind::CartUpdated]);
        let bus = bus.clone();
        let pump = Pump::start("cart", subscription, move |message| {
            if let Some(signal) = StoreSignal::from_inbound(message) {
                bus.publish(signal);
            }
        });
        Self {
            channel: channel.clone(),
            _pump: pump,
        }
    }

    pub fn track_add_to_cart(&self, product_id: &str, quantity: u32) -> Result<SendOutcome, ChannelError> {
        self.channel.send(&OutboundIntent::AddToCart {
            product_id: product_id.to_string(),
            quantity,
        })
    }

    pub fn track_remove_from_cart(&self, product_id: &str) -> Result<SendOutcome, ChannelError> {
        self.channel.send(&OutboundIntent::RemoveFromCart {
            product_id: product_id.to_string(),
        })
    }

    pub fn track_checkout_start(&self, total: f64, item_count: u32) -> Result<SendOutcome, ChannelError> {
        self.channel
            .send(&OutboundIntent::CheckoutStart { total, item_count })
    }

    pub fn track_checkout_complete(&self, order_id: &str, total: f64) -> Result<SendOutcome, ChannelError> {
        self.channel.send(&OutboundIntent::CheckoutComplete {
            order_id: order_id.to_string(),
            total,
        })
    }
}
