//! View frames handed to the (out-of-scope) renderer.

use chat_store::Message;

/// A complete render snapshot: messages in derived order plus indicators.
/// Emitted by the controller on every state change; the renderer is an
/// external collaborator and only ever reads these.
#[derive(Debug, Clone, Default)]
pub struct ViewFrame {
    pub messages: Vec<Message>,
    /// A locally-originated send is awaiting its authoritative echo.
    pub typing: bool,
    /// Highlighted message id, if any.
    pub selected: Option<String>,
    /// Short display id (first 8 characters) of the head message.
    /// `None` while the conversation is empty.
    pub head: Option<String>,
}
