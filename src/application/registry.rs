use crate::domain::order::{OrderId, OrderRef};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, oneshot};

/// Proof that a worker owns the registry slot for its order id.
///
/// The generation guards against a late release removing a newer order that
/// reused the same identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) order_id: OrderId,
    generation: u64,
}

enum Slot {
    /// Submitted, `start` not answered yet. Cannot be cancelled.
    Reserved,
    Active {
        order_ref: OrderRef,
        cancel: oneshot::Sender<()>,
    },
}

struct RegistryEntry {
    generation: u64,
    slot: Slot,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<OrderId, RegistryEntry>,
    closed: bool,
}

/// Maps order ids to the cancellation channel of their worker.
///
/// The only state shared between workers besides the transport. Each worker
/// is the sole writer of its own entry; the map itself sits behind a mutex.
#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<Inner>,
    next_generation: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claims `order_id` for a new order. `None` if it is already in use or
    /// the registry has been closed.
    pub(crate) async fn reserve(&self, order_id: &OrderId) -> Option<Ticket> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return None;
        }
        match inner.entries.entry(order_id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                vacant.insert(RegistryEntry {
                    generation,
                    slot: Slot::Reserved,
                });
                Some(Ticket {
                    order_id: order_id.clone(),
                    generation,
                })
            }
        }
    }

    /// Makes a started order cancellable.
    ///
    /// Returns `false` when the engine shut down while `start` was in flight;
    /// `cancel` is dropped in that case, which the worker reads as a
    /// cancellation request.
    pub(crate) async fn activate(
        &self,
        ticket: &Ticket,
        order_ref: OrderRef,
        cancel: oneshot::Sender<()>,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return false;
        }
        match inner.entries.get_mut(&ticket.order_id) {
            Some(entry) if entry.generation == ticket.generation => {
                entry.slot = Slot::Active { order_ref, cancel };
                true
            }
            _ => false,
        }
    }

    /// Removes an active entry for cancellation, handing back its channel.
    pub(crate) async fn take_active(
        &self,
        order_id: &OrderId,
    ) -> Option<(OrderRef, oneshot::Sender<()>)> {
        let mut inner = self.inner.lock().await;
        if !matches!(
            inner.entries.get(order_id),
            Some(RegistryEntry {
                slot: Slot::Active { .. },
                ..
            })
        ) {
            return None;
        }
        match inner.entries.remove(order_id) {
            Some(RegistryEntry {
                slot: Slot::Active { order_ref, cancel },
                ..
            }) => Some((order_ref, cancel)),
            _ => None,
        }
    }

    /// Drops the worker's own entry, if it is still there.
    pub(crate) async fn release(&self, ticket: &Ticket) {
        let mut inner = self.inner.lock().await;
        if inner
            .entries
            .get(&ticket.order_id)
            .is_some_and(|entry| entry.generation == ticket.generation)
        {
            inner.entries.remove(&ticket.order_id);
        }
    }

    /// Refuses further reservations and hands back every active channel.
    ///
    /// Reserved entries stay: their workers notice the closed registry once
    /// `start` returns.
    pub(crate) async fn close(&self) -> Vec<(OrderId, oneshot::Sender<()>)> {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        let active: Vec<OrderId> = inner
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry.slot, Slot::Active { .. }))
            .map(|(id, _)| id.clone())
            .collect();
        active
            .into_iter()
            .filter_map(|id| match inner.entries.remove(&id) {
                Some(RegistryEntry {
                    slot: Slot::Active { cancel, .. },
                    ..
                }) => Some((id, cancel)),
                _ => None,
            })
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub(crate) async fn order_ref(&self, order_id: &OrderId) -> Option<OrderRef> {
        let inner = self.inner.lock().await;
        match inner.entries.get(order_id) {
            Some(RegistryEntry {
                slot: Slot::Active { order_ref, .. },
                ..
            }) => Some(order_ref.clone()),
            _ => None,
        }
    }
}
