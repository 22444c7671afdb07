//! Reconciliation of authoritative batches and derived render order.
//!
//! Every server batch is treated as ground truth: entries are upserted by
//! id, then all optimistic placeholders are dropped unconditionally. The
//! arrival of any batch means the store's view is authoritative again and
//! stale local echoes must not linger.

use tracing::debug;

use crate::message::Message;
use crate::store::MessageStore;

/// Fold an authoritative batch into the store. Authoritative entries always
/// win over an existing entry with the same id. Returns the batch size.
pub fn merge_batch(store: &mut MessageStore, batch: Vec<Message>) -> usize {
    let merged = batch.len();
    for msg in batch {
        store.insert(msg);
    }
    let purged = store.purge_optimistic();
    if purged > 0 {
        debug!(merged, purged, "batch merged, optimistic placeholders dropped");
    }
    merged
}

/// Derive the render order: a stable topological sort over parent links.
///
/// Roots (no parent, or a parent the store does not hold) appear in arrival
/// order; each is followed depth-first by its children, themselves in
/// arrival order. A single chain therefore renders in chain order, and a
/// set of mutually-unrelated messages keeps its arrival order unchanged.
/// Entries unreachable through the link structure (cycles) are appended in
/// arrival order rather than dropped.
pub fn ordered(store: &MessageStore) -> Vec<&Message> {
    use std::collections::HashMap;

    let mut children: HashMap<&str, Vec<&Message>> = HashMap::new();
    let mut roots: Vec<&Message> = Vec::new();
    for msg in store.iter() {
        let linked_parent = msg
            .parent
            .as_deref()
            .filter(|p| *p != msg.id && store.contains(p));
        match linked_parent {
            Some(parent) => children.entry(parent).or_default().push(msg),
            None => roots.push(msg),
        }
    }

    let mut out: Vec<&Message> = Vec::with_capacity(store.len());
    let mut stack: Vec<&Message> = roots.into_iter().rev().collect();
    while let Some(msg) = stack.pop() {
        out.push(msg);
        if let Some(kids) = children.get(msg.id.as_str()) {
            stack.extend(kids.iter().rev().copied());
        }
    }

    if out.len() < store.len() {
        // Cyclic parent links never reach a root; emit them anyway.
        for msg in store.iter() {
            if !out.iter().any(|m| m.id == msg.id) {
                out.push(msg);
            }
        }
    }

    out
}

/// The most recently known message in the derived order.
pub fn head(store: &MessageStore) -> Option<&Message> {
    ordered(store).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn msg(id: &str, parent: Option<&str>) -> Message {
        Message::new(id, Role::User, id, parent)
    }

    fn ids(store: &MessageStore) -> Vec<String> {
        ordered(store).iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn merge_into_empty_store_is_exact() {
        let mut store = MessageStore::new();
        let batch = vec![msg("m1", None), msg("m2", Some("m1"))];
        assert_eq!(merge_batch(&mut store, batch.clone()), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("m1").unwrap().content, "m1");

        // Idempotent: merging the same batch twice yields the same store
        merge_batch(&mut store, batch);
        assert_eq!(store.len(), 2);
        assert_eq!(ids(&store), ["m1", "m2"]);
    }

    #[test]
    fn authoritative_entry_wins_over_existing() {
        let mut store = MessageStore::new();
        store.insert(msg("m1", None));
        merge_batch(
            &mut store,
            vec![Message::new("m1", Role::Assistant, "revised", None)],
        );
        assert_eq!(store.get("m1").unwrap().content, "revised");
        assert_eq!(store.get("m1").unwrap().role, Role::Assistant);
    }

    #[test]
    fn any_batch_purges_optimistic_entries() {
        let mut store = MessageStore::new();
        store.insert(Message::optimistic("hello"));

        // The batch does not echo the optimistic content at all
        merge_batch(&mut store, vec![msg("other", None)]);

        assert_eq!(store.len(), 1);
        assert!(store.iter().all(|m| !m.is_optimistic()));
    }

    #[test]
    fn empty_batch_still_purges() {
        let mut store = MessageStore::new();
        store.insert(Message::optimistic("hello"));
        merge_batch(&mut store, vec![]);
        assert!(store.is_empty());
    }

    #[test]
    fn unrelated_messages_keep_arrival_order() {
        let mut store = MessageStore::new();
        store.insert(msg("c", None));
        store.insert(msg("a", None));
        store.insert(msg("b", None));
        assert_eq!(ids(&store), ["c", "a", "b"]);
    }

    #[test]
    fn child_sorts_after_parent() {
        let mut store = MessageStore::new();
        // B arrives before A but links to it
        store.insert(msg("2", Some("1")));
        store.insert(msg("1", None));
        assert_eq!(ids(&store), ["1", "2"]);
    }

    #[test]
    fn chain_renders_in_chain_order() {
        let mut store = MessageStore::new();
        store.insert(msg("m3", Some("m2")));
        store.insert(msg("m1", None));
        store.insert(msg("m2", Some("m1")));
        assert_eq!(ids(&store), ["m1", "m2", "m3"]);
    }

    #[test]
    fn branching_history_is_deterministic() {
        let mut store = MessageStore::new();
        store.insert(msg("root", None));
        store.insert(msg("b", Some("root")));
        store.insert(msg("a", Some("root")));
        store.insert(msg("b1", Some("b")));
        // Siblings in arrival order, each branch depth-first
        assert_eq!(ids(&store), ["root", "b", "b1", "a"]);
    }

    #[test]
    fn dangling_parent_is_treated_as_root() {
        let mut store = MessageStore::new();
        store.insert(msg("m2", Some("gone")));
        store.insert(msg("m3", Some("m2")));
        assert_eq!(ids(&store), ["m2", "m3"]);
    }

    #[test]
    fn cyclic_links_are_not_dropped() {
        let mut store = MessageStore::new();
        store.insert(msg("x", Some("y")));
        store.insert(msg("y", Some("x")));
        store.insert(msg("solo", None));
        let order = ids(&store);
        assert_eq!(order.len(), 3);
        assert!(order.contains(&"x".to_string()));
        assert!(order.contains(&"y".to_string()));
    }

    #[test]
    fn head_is_last_of_derived_order() {
        let mut store = MessageStore::new();
        assert!(head(&store).is_none());

        store.insert(msg("m2", Some("m1")));
        store.insert(msg("m1", None));
        assert_eq!(head(&store).unwrap().id, "m2");
        assert_eq!(head(&store).unwrap().short_id(), "m2");
    }
}
