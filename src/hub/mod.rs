use crate::channel::{self, ChannelHandle, ChannelOptions};
use crate::config::Config;
use crate::consumers::{AnalyticsFeed, CartTracker, OrderListener, ProductTracker};
use crate::notifications::NotificationCenter;
use crate::signals::SignalBus;
use std::time::Duration;

#[derive(Debug)]
pub struct RealtimeHub {
    channel: ChannelHandle,
    bus: SignalBus,
    notifications: NotificationCenter,
    cart: CartTracker,
    products: ProductTracker,
    orders: OrderListener,
    analytics: AnalyticsFeed,
}

impl RealtimeHub {
    pub fn new(options: ChannelOptions, low_priority_ttl: Duration) -> Self {
        let bus = SignalBus::new();
        let channel = channel::spawn(options);

        Self {
            notifications: NotificationCenter::attach(&channel, low_priority_ttl),
            cart: CartTracker::attach(&channel, &bus),
            products: ProductTracker::attach(&channel, &bus),
            orders: OrderListener::attach(&channel, &bus),
            analytics: AnalyticsFeed::attach(&channel),
            channel,
            bus,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ChannelOptions::from_config(&config.channel),
            Duration::from_millis(config.notifications.low_priority_ttl_ms),
        )
    }

    pub fn start(options: ChannelOptions, low_priority_ttl: Duration) -> Self {
        let hub = Self::new(options, low_priority_ttl);
        hub.connect();
        hub
    }

    pub fn connect(&self) {
        self.channel.connect();
    }

    pub fn disconnect(&self) {
        self.channel.disconnect();
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    pub fn signals(&self) -> &SignalBus {
        &self.bus
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn cart(&self) -> &CartTracker {
        &self.cart
    }

    pub fn products(&self) -> &ProductTracker {
        &self.products
    }

    pub fn orders(&self) -> &OrderListener {
        &self.orders
    }

    pub fn analytics(&self) -> &AnalyticsFeed {
        &self.analytics
    }
}
