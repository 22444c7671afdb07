//! Keyed message cache with stable arrival order.
//!
//! The store is the single source of truth for what gets rendered. Render
//! order is derived (see `reconcile`), not storage order, but arrival order
//! is tracked so the derivation has a stable tie-break: overwriting an
//! existing id keeps its original position.

use std::collections::HashMap;

use crate::message::{Message, is_optimistic};

#[derive(Debug, Default)]
pub struct MessageStore {
    entries: HashMap<String, Message>,
    /// Ids in arrival order. Invariant: same key set as `entries`.
    arrival: Vec<String>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by id. An overwrite keeps the entry's original
    /// arrival slot. Returns the previous entry, if any.
    pub fn insert(&mut self, msg: Message) -> Option<Message> {
        let id = msg.id.clone();
        let prev = self.entries.insert(id.clone(), msg);
        if prev.is_none() {
            self.arrival.push(id);
        }
        prev
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.arrival.retain(|k| k != id);
        }
        removed
    }

    /// Remove every entry carrying the optimistic id prefix.
    /// Returns how many were dropped.
    pub fn purge_optimistic(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| !is_optimistic(id));
        self.arrival.retain(|id| !is_optimistic(id));
        before - self.entries.len()
    }

    /// Iterate entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.arrival.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
