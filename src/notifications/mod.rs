use crate::channel::ChannelHandle;
use crate::consumers::Pump;
use crate::model::{InboundPayload, MessageKind, NotificationPayload, Priority};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_LOW_PRIORITY_TTL: Duration = Duration::from_millis(5000);
const ID_SALT_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub icon: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    pub timestamp: u64,
    pub read: bool,
}

#[derive(Debug, Default)]
struct Entries {
    newest_first: Vec<Notification>,
    timers: HashMap<String, JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    entries: Mutex<Entries>,
    snapshot: watch::Sender<Vec<Notification>>,
    low_priority_ttl: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, entries: &Entries) {
        self.snapshot.send_replace(entries.newest_first.clone());
    }

    fn receive(this: &Arc<Self>, payload: NotificationPayload, timestamp: u64) -> String {
        let mut entries = this.lock();
        let id = unique_id(&entries, timestamp);
        let expires = payload.priority == Priority::Low;

        entries.newest_first.insert(
            0,
            Notification {
                id: id.clone(),
                kind: payload.kind,
                title: payload.title,
                message: payload.message,
                icon: payload.icon,
                priority: payload.priority,
                category: payload.category,
                timestamp,
                read: false,
            },
        );

        if expires {
            let timer = spawn_expiry(Arc::downgrade(this), id.clone(), this.low_priority_ttl);
            entries.timers.insert(id.clone(), timer);
        }
        this.publish(&entries);
        tracing::debug!(id = %id, expires, "notification received");
        id
    }

    // timer path: the entry may already be gone
    fn expire(&self, id: &str) {
        let mut entries = self.lock();
        entries.timers.remove(id);
        let before = entries.newest_first.len();
        entries.newest_first.retain(|n| n.id != id);
        if entries.newest_first.len() != before {
            self.publish(&entries);
            tracing::debug!(id, "low-priority notification expired");
        }
    }
}

fn spawn_expiry(shared: Weak<Shared>, id: String, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if let Some(shared) = shared.upgrade() {
            shared.expire(&id);
        }
    })
}

fn unique_id(entries: &Entries, timestamp: u64) -> String {
    loop {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_SALT_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        let id = format!("{timestamp}-{salt}");
        if !entries.newest_first.iter().any(|n| n.id == id) {
            return id;
        }
    }
}

#[derive(Debug)]
pub struct NotificationCenter {
    shared: Arc<Shared>,
    pump: Option<Pump>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_PRIORITY_TTL)
    }
}

impl NotificationCenter {
    pub fn new(low_priority_ttl: Duration) -> Self {
        let (snapshot, _rx) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(Entries::default()),
                snapshot,
                low_priority_ttl,
            }),
            pump: None,
        }
    }

    pub fn attach(channel: &ChannelHandle, low_priority_ttl: Duration) -> Self {
        let mut center = Self::new(low_priority_ttl);
        let subscription = channel.subscribe(&[MessageKind::Notification]);
        let shared = Arc::downgrade(&center.shared);
        center.pump = Some(Pump::start("notifications", subscription, move |message| {
            let InboundPayload::Notification(payload) = &message.payload else {
                return;
            };
            if let Some(shared) = shared.upgrade() {
                Shared::receive(&shared, payload.clone(), message.timestamp);
            }
        }));
        center
    }

    pub fn receive(&self, payload: NotificationPayload, timestamp: u64) -> String {
        Shared::receive(&self.shared, payload, timestamp)
    }

    pub fn mark_as_read(&self, id: &str) -> bool {
        let mut entries = self.shared.lock();
        let Some(entry) = entries.newest_first.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if entry.read {
            return true;
        }
        entry.read = true;
        self.shared.publish(&entries);
        true
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.shared.lock();
        if let Some(timer) = entries.timers.remove(id) {
            timer.abort();
        }
        let before = entries.newest_first.len();
        entries.newest_first.retain(|n| n.id != id);
        let removed = entries.newest_first.len() != before;
        if removed {
            self.shared.publish(&entries);
        }
        removed
    }

    pub fn clear_all(&self) {
        let mut entries = self.shared.lock();
        for (_, timer) in entries.timers.drain() {
            timer.abort();
        }
        entries.newest_first.clear();
        self.shared.publish(&entries);
    }

    pub fn unread_count(&self) -> usize {
        self.shared
            .lock()
            .newest_first
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.shared.lock().newest_first.clone()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.shared.lock().newest_first.iter().find(|n| n.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().newest_first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_expiries(&self) -> usize {
        self.shared.lock().timers.len()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<Notification>> {
        self.shared.snapshot.subscribe()
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        let mut entries = self.shared.lock();
        for (_, timer) in entries.timers.drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{self, ChannelOptions};
    use crate::model::InboundMessage;

    const TTL: Duration = Duration::from_millis(5000);

    fn payload(title: &str, priority: Priority) -> NotificationPayload {
        NotificationPayload {
            kind: "info".to_string(),
            title: title.to_string(),
            message: String::new(),
            icon: None,
            priority,
            category: None,
        }
    }

    fn unread_matches(center: &NotificationCenter) {
        let expected = center.notifications().iter().filter(|n| !n.read).count();
        assert_eq!(center.unread_count(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn low_priority_notice_expires_after_ttl() {
        let center = NotificationCenter::new(TTL);
        let id = center.receive(payload("Low stock", Priority::Low), 1_700_000_000_000);

        let entry = center.get(&id).unwrap();
        assert!(!entry.read);
        assert!(id.starts_with("1700000000000-"));
        assert_eq!(center.pending_expiries(), 1);

        tokio::time::sleep(TTL - Duration::from_millis(1)).await;
        assert!(center.get(&id).is_some());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(center.get(&id).is_none());
        assert_eq!(center.pending_expiries(), 0);
        assert!(!center.remove(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn notice_with_null_fields_is_shown_and_kept() {
        let raw = r#"{"type":"notification","timestamp":9,"data":{"type":null,"title":"Restock","message":null,"priority":null}}"#;
        let payload = match crate::codec::decode(raw).unwrap().payload {
            InboundPayload::Notification(n) => n,
            other => panic!("unexpected payload: {other:?}"),
        };

        let center = NotificationCenter::new(TTL);
        let id = center.receive(payload, 9);
        assert_eq!(center.pending_expiries(), 0);

        tokio::time::sleep(TTL * 2).await;
        let entry = center.get(&id).unwrap();
        assert_eq!(entry.kind, "info");
        assert_eq!(entry.message, "");
        assert_eq!(entry.priority, Priority::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn other_priorities_never_expire() {
        let center = NotificationCenter::new(TTL);
        center.receive(payload("Order shipped", Priority::Medium), 1);
        center.receive(payload("Payment failed", Priority::High), 2);
        assert_eq!(center.pending_expiries(), 0);

        tokio::time::sleep(TTL * 3).await;
        assert_eq!(center.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_remove_cancels_expiry() {
        let center = NotificationCenter::new(TTL);
        let mut snapshots = center.watch();
        let id = center.receive(payload("Low stock", Priority::Low), 1);
        let keep = center.receive(payload("Sale", Priority::Medium), 2);

        assert!(center.remove(&id));
        assert!(!center.remove(&id));
        assert_eq!(center.pending_expiries(), 0);

        snapshots.borrow_and_update();
        tokio::time::sleep(TTL * 2).await;
        assert!(!snapshots.has_changed().unwrap());
        assert_eq!(center.notifications().len(), 1);
        assert_eq!(center.notifications()[0].id, keep);
    }

    #[tokio::test(start_paused = true)]
    async fn newest_first_and_unread_count_tracks_mutations() {
        let center = NotificationCenter::new(TTL);
        let a = center.receive(payload("a", Priority::Medium), 1);
        let b = center.receive(payload("b", Priority::Low), 2);
        let c = center.receive(payload("c", Priority::High), 3);
        let titles: Vec<String> = center.notifications().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
        assert_eq!(center.unread_count(), 3);

        assert!(center.mark_as_read(&a));
        assert!(center.mark_as_read(&a));
        assert!(!center.mark_as_read("missing"));
        assert_eq!(center.unread_count(), 2);
        unread_matches(&center);

        center.remove(&c);
        assert_eq!(center.unread_count(), 1);
        unread_matches(&center);

        tokio::time::sleep(TTL + Duration::from_millis(1)).await;
        assert!(center.get(&b).is_none());
        assert_eq!(center.unread_count(), 0);
        unread_matches(&center);

        center.clear_all();
        assert!(center.is_empty());
        assert_eq!(center.unread_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_all_cancels_every_timer() {
        let center = NotificationCenter::new(TTL);
        for ts in 0..4 {
            center.receive(payload("flash", Priority::Low), ts);
        }
        assert_eq!(center.pending_expiries(), 4);

        center.clear_all();
        assert_eq!(center.pending_expiries(), 0);
        let id = center.receive(payload("after", Priority::Medium), 10);

        tokio::time::sleep(TTL * 2).await;
        assert_eq!(center.notifications().len(), 1);
        assert_eq!(center.notifications()[0].id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_unique_for_same_timestamp() {
        let center = NotificationCenter::new(TTL);
        let ids: Vec<String> = (0..50)
            .map(|_| center.receive(payload("dup", Priority::Medium), 42))
            .collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_center_releases_state_and_timers() {
        let center = NotificationCenter::new(TTL);
        let mut snapshots = center.watch();
        center.receive(payload("Low stock", Priority::Low), 1);
        snapshots.borrow_and_update();

        drop(center);
        assert!(snapshots.changed().await.is_err());
        tokio::time::sleep(TTL * 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn attached_center_consumes_channel_notifications() {
        let channel = channel::spawn(ChannelOptions::new("ws://127.0.0.1:9/ws"));
        let center = NotificationCenter::attach(&channel, TTL);
        let mut snapshots = center.watch();

        channel.dispatcher().dispatch(InboundMessage {
            timestamp: 1_000,
            originator_id: None,
            payload: InboundPayload::Notification(payload("Low stock", Priority::Low)),
        });

        snapshots.wait_for(|list| list.len() == 1).await.unwrap();
        let entry = center.notifications().remove(0);
        assert_eq!(entry.title, "Low stock");
        assert_eq!(entry.timestamp, 1_000);
        assert!(!entry.read);

        snapshots.wait_for(|list| list.is_empty()).await.unwrap();
        assert!(center.is_empty());
    }
}
