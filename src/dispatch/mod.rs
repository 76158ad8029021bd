use crate::model::{InboundMessage, MessageKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

pub type Delivery = Arc<InboundMessage>;

#[derive(Debug)]
struct Route {
    subscription_id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Debug, Default)]
struct Routes {
    by_kind: HashMap<MessageKind, Vec<Route>>,
}

impl Routes {
    fn remove(&mut self, subscription_id: u64) {
        for list in self.by_kind.values_mut() {
            list.retain(|route| route.subscription_id != subscription_id);
        }
        self.by_kind.retain(|_, list| !list.is_empty());
    }
}

fn lock_routes(routes: &Mutex<Routes>) -> MutexGuard<'_, Routes> {
    routes.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    routes: Arc<Mutex<Routes>>,
    next_id: Arc<AtomicU64>,
}

#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kinds: Vec<MessageKind>,
    rx: mpsc::UnboundedReceiver<Delivery>,
    routes: Weak<Mutex<Routes>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kinds(&self) -> &[MessageKind] {
        &self.kinds
    }

    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(routes) = self.routes.upgrade() {
            lock_routes(&routes).remove(self.id);
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kinds: &[MessageKind]) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut unique: Vec<MessageKind> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !unique.contains(kind) {
                unique.push(*kind);
            }
        }
        let kinds = unique;

        let mut routes = self.lock();
        for kind in &kinds {
            routes.by_kind.entry(*kind).or_default().push(Route {
                subscription_id: id,
                tx: tx.clone(),
            });
        }

        Subscription {
            id,
            kinds,
            rx,
            routes: Arc::downgrade(&self.routes),
        }
    }

    pub fn unsubscribe(&self, subscription_id: u64) {
        self.lock().remove(subscription_id);
    }

    pub fn dispatch(&self, message: InboundMessage) -> usize {
        let Some(kind) = message.kind() else {
            tracing::debug!(tag = %message.tag(), "ignoring message with unrecognized type tag");
            return 0;
        };

        let delivery = Arc::new(message);
        let mut routes = self.lock();
        let Some(list) = routes.by_kind.get_mut(&kind) else {
            tracing::trace!(tag = %kind, "no subscribers for message");
            return 0;
        };

        let mut delivered = 0;
        list.retain(|route| match route.tx.send(delivery.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        if list.is_empty() {
            routes.by_kind.remove(&kind);
        }
        tracing::trace!(tag = %kind, delivered, "dispatched inbound message");
        delivered
    }

    pub fn subscriber_count(&self, kind: MessageKind) -> usize {
        self.lock()
            .by_kind
            .get(&kind)
            .map(|list| list.iter().filter(|route| !route.tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Routes> {
        lock_routes(&self.routes)
    }
}
