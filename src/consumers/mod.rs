mod analytics;
mod cart;
mod order;
mod product;

pub use analytics::{AnalyticsFeed, AnalyticsSnapshot};
pub use cart::CartTracker;
pub use order::OrderListener;
pub use product::ProductTracker;

use crate::dispatch::Subscription;
use crate::model::InboundMessage;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub(crate) struct Pump {
    task: JoinHandle<()>,
}

impl Pump {
    pub(crate) fn start<F>(name: &'static str, mut subscription: Subscription, mut handler: F) -> Self
    where
        F: FnMut(&InboundMessage) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                handler(message.as_ref());
            }
            tracing::debug!(consumer = name, "inbound stream ended");
        });
        Self { task }
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        self.task.abort();
    }
}
