use super::Pump;
use crate::channel::ChannelHandle;
use crate::model::MessageKind;
use crate::signals::{SignalBus, StoreSignal};

#[derive(Debug)]
pub struct OrderListener {
    _pump: Pump,
}

impl OrderListener {
    pub fn attach(channel: &ChannelHandle, bus: &SignalBus) -> Self {
        let subscription = channel.subscribe(&[MessageKind::OrderUpdate]);
        let bus = bus.clone();
        let pump = Pump::start("order", subscription, move |message| {
            if let Some(signal) = StoreSignal::from_inbound(message) {
                bus.publish(signal);
            }
        });
        Self { _pump: pump }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::test_support::{idle_channel, inbound, resource};
    use crate::model::InboundPayload;
    use std::time::Duration;

    #[tokio::test]
    async fn order_updates_reach_every_listener() {
        let channel = idle_channel();
        let bus = SignalBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let _orders = OrderListener::attach(&channel, &bus);

        channel.dispatcher().dispatch(inbound(
            9,
            InboundPayload::OrderUpdate(resource("status", "shipped")),
        ));

        for rx in [&mut first, &mut second] {
            let signal = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(signal, StoreSignal::OrderUpdated(resource("status", "shipped")));
        }
    }
}
