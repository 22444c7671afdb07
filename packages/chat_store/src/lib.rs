//! Chat Store - Pure message cache and reconciliation library
//!
//! This crate owns the local view of a conversation: a keyed cache of
//! message records, reconciliation of authoritative server batches against
//! optimistic (not-yet-confirmed) local entries, and the derived render
//! order. It has no I/O and no knowledge of the transport.
//!
//! # Example
//!
//! ```
//! use chat_store::{merge_batch, ordered, Message, MessageStore, Role};
//!
//! let mut store = MessageStore::new();
//!
//! // Local echo while the send is in flight
//! store.insert(Message::optimistic("hello"));
//!
//! // Authoritative batch from the server supersedes it
//! merge_batch(
//!     &mut store,
//!     vec![
//!         Message::new("m1", Role::User, "hello", None),
//!         Message::new("m2", Role::Assistant, "hi there", Some("m1")),
//!     ],
//! );
//!
//! let ids: Vec<&str> = ordered(&store).iter().map(|m| m.id.as_str()).collect();
//! assert_eq!(ids, ["m1", "m2"]);
//! ```

mod message;
mod reconcile;
mod store;

pub use message::{Message, OPTIMISTIC_PREFIX, Role, is_optimistic, optimistic_id};
pub use reconcile::{head, merge_batch, ordered};
pub use store::MessageStore;
