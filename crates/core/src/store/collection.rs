use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, Weak};

/// A single mutation of an [`ObservableCollection`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Added { index: usize, item: T },
    Replaced { index: usize, old: T, new: T },
    Removed { index: usize, item: T },
    /// Every item was dropped at once; `items` holds what was there.
    Cleared { items: Vec<T> },
}

type Callback<T> = Arc<dyn Fn(&[Change<T>]) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Ordered, thread-safe list that reports every mutation to its subscribers.
///
/// Each mutation (or each [`edit`](Self::edit) batch) is delivered as one
/// slice of [`Change`]s, synchronously, after the write lock is released.
/// Delivery is serialized per collection, so subscribers observe changes in
/// the order they were applied. Subscribers may read the collection from
/// their callback but must not mutate it.
pub struct ObservableCollection<T> {
    name: &'static str,
    items: RwLock<Vec<T>>,
    subscribers: Arc<Mutex<Subscribers<T>>>,
    delivery: Mutex<()>,
}

impl<T> std::fmt::Debug for ObservableCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("name", &self.name)
            .field("len", &self.read().len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T> ObservableCollection<T> {
    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers<T>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name used in logs and errors (e.g., "Brokers").
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().entries.len()
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableCollection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: RwLock::new(Vec::new()),
            subscribers: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            })),
            delivery: Mutex::new(()),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Copy of the current items, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.read().clone()
    }

    /// Linear scan for the first matching item.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.read().iter().find(|item| predicate(item)).cloned()
    }

    /// Linear scan returning the first `Some` produced by `f`.
    pub fn find_map<R>(&self, f: impl Fn(&T) -> Option<R>) -> Option<R> {
        self.read().iter().find_map(f)
    }

    pub fn any(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.read().iter().any(predicate)
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Apply several mutations as one batch, delivered as a single
    /// notification. Returns whatever `f` returns.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Editor<'_, T>) -> R) -> R {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let (result, changes) = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            let mut editor = Editor {
                items: &mut *items,
                changes: Vec::new(),
            };
            let result = f(&mut editor);
            (result, editor.changes)
        };
        if !changes.is_empty() {
            self.notify(&changes);
        }
        result
    }

    pub fn push(&self, item: T) {
        self.edit(|e| e.push(item));
    }

    pub fn insert(&self, index: usize, item: T) {
        self.edit(|e| e.insert(index, item));
    }

    /// Replace the item at `index`. Returns the previous item.
    pub fn replace_at(&self, index: usize, item: T) -> Option<T> {
        self.edit(|e| e.replace_at(index, item))
    }

    pub fn remove_at(&self, index: usize) -> Option<T> {
        self.edit(|e| e.remove_at(index))
    }

    /// Replace the first item matching `predicate`. Returns false if none matched.
    pub fn replace_where(&self, predicate: impl Fn(&T) -> bool, item: T) -> bool {
        self.edit(|e| match e.position(predicate) {
            Some(index) => e.replace_at(index, item).is_some(),
            None => false,
        })
    }

    /// Replace the first item matching `predicate`, or append `item` if none does.
    pub fn upsert_where(&self, predicate: impl Fn(&T) -> bool, item: T) {
        self.edit(|e| match e.position(predicate) {
            Some(index) => {
                e.replace_at(index, item);
            }
            None => e.push(item),
        });
    }

    /// Remove every item matching `predicate`. Returns how many were removed.
    pub fn remove_where(&self, predicate: impl Fn(&T) -> bool) -> usize {
        self.edit(|e| e.remove_where(predicate))
    }

    pub fn clear(&self) {
        self.edit(|e| e.clear());
    }

    /// Swap the whole content: one Cleared followed by one Added per item.
    pub fn reset(&self, items: impl IntoIterator<Item = T>) {
        self.edit(|e| {
            e.clear();
            for item in items {
                e.push(item);
            }
        });
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Register a callback for every future change batch. The callback is
    /// removed when the returned [`Subscription`] is dropped.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        callback: impl Fn(&[Change<T>]) + Send + Sync + 'static,
    ) -> Subscription {
        let id = {
            let mut subscribers = self.lock_subscribers();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            let callback: Callback<T> = Arc::new(callback);
            subscribers.entries.push((id, callback));
            id
        };

        let weak: Weak<Mutex<Subscribers<T>>> = Arc::downgrade(&self.subscribers);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(subscribers) = weak.upgrade() {
                    let mut subscribers =
                        subscribers.lock().unwrap_or_else(PoisonError::into_inner);
                    subscribers.entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    fn notify(&self, changes: &[Change<T>]) {
        let callbacks: Vec<Callback<T>> = self
            .lock_subscribers()
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(changes);
        }
    }
}

/// Mutable view handed to [`ObservableCollection::edit`]. Records every
/// mutation so the batch can be published once the lock is released.
pub struct Editor<'a, T> {
    items: &'a mut Vec<T>,
    changes: Vec<Change<T>>,
}

impl<T: Clone> Editor<'_, T> {
    pub fn items(&self) -> &[T] {
        self.items.as_slice()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn position(&self, predicate: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.iter().position(predicate)
    }

    pub fn push(&mut self, item: T) {
        let index = self.items.len();
        self.insert(index, item);
    }

    /// Insert at `index`, clamped to the current length.
    pub fn insert(&mut self, index: usize, item: T) {
        let index = index.min(self.items.len());
        self.items.insert(index, item.clone());
        self.changes.push(Change::Added { index, item });
    }

    pub fn replace_at(&mut self, index: usize, item: T) -> Option<T> {
        let slot = self.items.get_mut(index)?;
        let old = std::mem::replace(slot, item.clone());
        self.changes.push(Change::Replaced {
            index,
            old: old.clone(),
            new: item,
        });
        Some(old)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.changes.push(Change::Removed {
            index,
            item: item.clone(),
        });
        Some(item)
    }

    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        let mut removed = 0;
        // Back to front so reported indices stay valid when replayed in order
        for index in (0..self.items.len()).rev() {
            if predicate(&self.items[index]) {
                self.remove_at(index);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let items = std::mem::take(&mut *self.items);
        self.changes.push(Change::Cleared { items });
    }
}

/// Handle of a collection subscription. Unsubscribes on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Stop receiving notifications now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
