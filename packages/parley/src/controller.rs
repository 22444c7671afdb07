//! ChatController: bridges user intent to the connection/reconciliation
//! pipeline.
//!
//! Owns the message store and the selection state. Every state change is
//! published as a [`ViewFrame`] on a watch channel; rendering itself is an
//! external collaborator.

use anyhow::Result;
use chat_store::{Message, MessageStore, merge_batch, ordered};
use tokio::sync::watch;
use tracing::debug;

use crate::connection::ConnectionManager;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::view::ViewFrame;

pub struct ChatController {
    store: MessageStore,
    selected: Option<String>,
    conn: ConnectionManager,
    frames: watch::Sender<ViewFrame>,
}

impl ChatController {
    pub fn new(conn: ConnectionManager) -> Self {
        let (frames, _) = watch::channel(ViewFrame::default());
        Self {
            store: MessageStore::new(),
            selected: None,
            conn,
            frames,
        }
    }

    /// Subscribe to view frames.
    pub fn watch_frames(&self) -> watch::Receiver<ViewFrame> {
        self.frames.subscribe()
    }

    /// Accept user input. Empty-after-trim text is a silent no-op.
    /// Otherwise an optimistic entry appears immediately (pending
    /// indicator active) and the raw text is transmitted fire-and-forget:
    /// while disconnected the entry still shows, but nothing goes out.
    pub async fn submit(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let msg = Message::optimistic(text);
        debug!(id = %msg.id, "optimistic entry created");
        self.store.insert(msg);
        self.emit_frame(true);

        self.conn
            .send(&ClientMessage::SendMessage {
                content: text.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Fold an inbound envelope into local state.
    pub fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::MessageUpdate { messages } => {
                let merged = merge_batch(&mut self.store, messages);
                debug!(merged, total = self.store.len(), "authoritative batch merged");
                if let Some(id) = self.selected.take_if(|id| !self.store.contains(id)) {
                    debug!(%id, "selection cleared, message gone");
                }
                self.emit_frame(false);
            }
        }
    }

    /// Toggle highlighting: re-selecting the selected message deselects it.
    pub fn toggle_selection(&mut self, id: &str) {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        } else if self.store.contains(id) {
            self.selected = Some(id.to_string());
        } else {
            return;
        }
        self.emit_frame(false);
    }

    /// Clear highlighting (the click-outside-message-bounds analog).
    pub fn clear_selection(&mut self) {
        if self.selected.take().is_some() {
            self.emit_frame(false);
        }
    }

    pub fn message_count(&self) -> usize {
        self.store.len()
    }

    fn emit_frame(&self, typing: bool) {
        let messages: Vec<Message> = ordered(&self.store).into_iter().cloned().collect();
        let head = messages.last().map(|m| m.short_id().to_string());
        self.frames.send_replace(ViewFrame {
            messages,
            typing,
            selected: self.selected.clone(),
            head,
        });
    }
}
