//! Ready/active bookkeeping shared by every pool variant
//!
//! `PoolCore` does no locking and never calls the factory. The synchronized
//! pool keeps it behind a mutex; the single-owner pool owns it directly.
//! Instances are reused LIFO: the most recently admitted one is taken first.

pub(crate) struct PoolCore<T> {
    ready: Vec<T>,
    active: usize,
    min_size: usize,
    ceiling: Option<usize>,
    disposed: bool,
}

impl<T> PoolCore<T> {
    pub fn new(min_size: usize, ceiling: Option<usize>) -> Self {
        Self {
            ready: Vec::with_capacity(min_size),
            active: 0,
            min_size,
            ceiling,
            disposed: false,
        }
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Handed-out instances plus creation reservations
    pub fn active(&self) -> usize {
        self.active
    }

    /// Ready plus active. Reservations live in `active`, so they count here.
    pub fn total(&self) -> usize {
        self.ready.len() + self.active
    }

    pub fn ceiling(&self) -> Option<usize> {
        self.ceiling
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether one more instance fits under the ceiling
    pub fn has_room(&self) -> bool {
        self.ceiling.is_none_or(|ceiling| self.total() < ceiling)
    }

    /// Free slots under the ceiling, `None` when unbounded
    pub fn room(&self) -> Option<usize> {
        self.ceiling.map(|ceiling| ceiling.saturating_sub(self.total()))
    }

    /// Hand out the most recently admitted ready instance
    pub fn take_ready(&mut self) -> Option<T> {
        let object = self.ready.pop()?;
        self.active += 1;
        Some(object)
    }

    /// Count a slot as active before the instance exists
    pub fn reserve(&mut self) {
        self.active += 1;
    }

    /// Give back a reserved or active slot without re-pooling anything
    pub fn forget(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Take back an active instance. Returns it when it must be retired
    /// instead: the pool is disposed or it would sit above the ceiling.
    pub fn admit(&mut self, object: T) -> Option<T> {
        self.forget();
        if self.disposed || !self.has_room() {
            return Some(object);
        }
        self.ready.push(object);
        None
    }

    /// Add fresh instances to the ready set. Everything is handed back for
    /// retirement once the pool is disposed.
    pub fn stock(&mut self, objects: Vec<T>) -> Vec<T> {
        if self.disposed {
            return objects;
        }
        self.ready.extend(objects);
        Vec::new()
    }

    /// Like `stock`, but only fills the free room under the ceiling and
    /// hands back the surplus for retirement
    pub fn stock_within_ceiling(&mut self, mut objects: Vec<T>) -> Vec<T> {
        if self.disposed {
            return objects;
        }
        let keep = self.room().map_or(objects.len(), |room| room.min(objects.len()));
        let surplus = objects.split_off(keep);
        self.ready.extend(objects);
        surplus
    }

    pub fn raise_ceiling(&mut self, amount: usize) {
        if let Some(ceiling) = self.ceiling.as_mut() {
            *ceiling = ceiling.saturating_add(amount);
        }
    }

    /// Lower the ceiling, never below the floor or one
    pub fn lower_ceiling(&mut self, amount: usize) {
        let floor = self.min_size.max(1);
        if let Some(ceiling) = self.ceiling.as_mut() {
            *ceiling = ceiling.saturating_sub(amount).max(floor);
        }
    }

    /// Remove up to `amount` ready instances, oldest first, keeping at least
    /// `min_size` ready
    pub fn shrink_ready(&mut self, amount: usize) -> Vec<T> {
        let surplus = self.ready.len().saturating_sub(self.min_size);
        let count = amount.min(surplus);
        self.ready.drain(..count).collect()
    }

    /// Mark disposed and surrender the ready set
    pub fn dispose(&mut self) -> Vec<T> {
        self.disposed = true;
        std::mem::take(&mut self.ready)
    }
}
