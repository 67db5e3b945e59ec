use crate::state::CombinedState;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener = Box<dyn Fn(&CombinedState) + Send + Sync>;

struct ListenerSlot {
    active: AtomicBool,
    callback: Listener,
}

#[derive(Default)]
struct NotifierInner {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Arc<ListenerSlot>>>,
}

/// Fans committed state out to subscribed listeners.
///
/// Listeners run on the thread that committed the change, after the store has
/// released its own lock, so a listener may read from or update the store.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CombinedState) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(ListenerSlot {
            active: AtomicBool::new(true),
            callback: Box::new(listener),
        });
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, slot.clone());

        Subscription {
            id,
            slot,
            notifier: Arc::downgrade(&self.inner),
        }
    }

    pub fn notify(&self, state: &CombinedState) {
        // Copy the slots out so listeners can subscribe or unsubscribe freely.
        let slots: Vec<Arc<ListenerSlot>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for slot in slots {
            if slot.active.load(Ordering::Acquire) {
                (slot.callback)(state);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to stop deliveries.
pub struct Subscription {
    id: u64,
    slot: Arc<ListenerSlot>,
    notifier: Weak<NotifierInner>,
}

impl Subscription {
    /// Stops deliveries. Once this returns, the listener is not invoked again,
    /// including by a notification that is already walking the listener list.
    pub fn unsubscribe(&self) {
        self.slot.active.store(false, Ordering::Release);
        if let Some(inner) = self.notifier.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.active.load(Ordering::Acquire)
    }
}
