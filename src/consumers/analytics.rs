use super::Pump;
use crate::channel::ChannelHandle;
use crate::model::{InboundPayload, MessageKind};
use serde_json::Value;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsSnapshot {
    pub analytics: Option<Value>,
    pub realtime_stats: Option<Value>,
}

#[derive(Debug)]
pub struct AnalyticsFeed {
    snapshot: watch::Receiver<AnalyticsSnapshot>,
    _pump: Pump,
}

impl AnalyticsFeed {
    pub fn attach(channel: &ChannelHandle) -> Self {
        let subscription =
            channel.subscribe(&[MessageKind::AnalyticsUpdate, MessageKind::RealtimeStats]);
        let (tx, snapshot) = watch::channel(AnalyticsSnapshot::default());
        let pump = Pump::start("analytics", subscription, move |message| {
            match &message.payload {
                InboundPayload::AnalyticsUpdate(update) => {
                    tx.send_modify(|snap| snap.analytics = Some(update.metrics.clone()));
                }
                InboundPayload::RealtimeStats(update) => {
                    tx.send_modify(|snap| snap.realtime_stats = Some(update.stats.clone()));
                }
                _ => {}
            }
        });
        Self {
            snapshot,
            _pump: pump,
        }
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn analytics(&self) -> Option<Value> {
        self.snapshot.borrow().analytics.clone()
    }

    pub fn realtime_stats(&self) -> Option<Value> {
        self.snapshot.borrow().realtime_stats.clone()
    }

    pub fn watch(&self) -> watch::Receiver<AnalyticsSnapshot> {
        self.snapshot.clone()
    }
}
