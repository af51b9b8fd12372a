//! Bounded conversation context.
//!
//! Wraps a `Conversation` with a size cap and a recent-window view used
//! for prompt assembly. Oldest messages are evicted first once the cap is
//! reached; the log is never reordered.

use crate::message::{Conversation, ConversationMessage};

/// Append-only message log with FIFO eviction at capacity.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    conversation: Conversation,
    max_messages: usize,
    dropped: u64,
}

impl ConversationContext {
    /// Start a fresh conversation. `max_messages` is floored at 1.
    pub fn new(title: impl Into<String>, max_messages: usize) -> Self {
        Self {
            conversation: Conversation::new(title),
            max_messages: max_messages.max(1),
            dropped: 0,
        }
    }

    /// Resume a loaded conversation, trimming to the cap if the stored log
    /// is longer than the current configuration allows.
    pub fn from_conversation(conversation: Conversation, max_messages: usize) -> Self {
        let mut ctx = Self {
            conversation,
            max_messages: max_messages.max(1),
            dropped: 0,
        };
        while ctx.conversation.messages.len() > ctx.max_messages {
            ctx.conversation.messages.remove(0);
            ctx.dropped += 1;
        }
        ctx
    }

    /// Append one message, evicting the oldest entry when full.
    pub fn push(&mut self, message: ConversationMessage) {
        if self.conversation.messages.len() >= self.max_messages {
            self.conversation.messages.remove(0);
            self.dropped += 1;
        }
        self.conversation.messages.push(message);
    }

    /// The last `n` messages in chronological order.
    pub fn recent(&self, n: usize) -> &[ConversationMessage] {
        let len = self.conversation.messages.len();
        &self.conversation.messages[len.saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.conversation.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.messages.is_empty()
    }

    /// Messages evicted so far (diagnostic counter, not persisted).
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn id(&self) -> &str {
        &self.conversation.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn msg(content: &str) -> ConversationMessage {
        ConversationMessage::new(Role::User, content)
    }

    #[test]
    fn push_appends_in_order() {
        let mut ctx = ConversationContext::new("t", 10);
        ctx.push(msg("one"));
        ctx.push(msg("two"));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.recent(2)[0].content, "one");
        assert_eq!(ctx.recent(2)[1].content, "two");
    }

    #[test]
    fn eviction_drops_oldest_first() {
        let mut ctx = ConversationContext::new("t", 3);
        for i in 0..5 {
            ctx.push(msg(&format!("m{i}")));
        }
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.dropped(), 2);
        let contents: Vec<_> = ctx.recent(3).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn recent_window_never_exceeds_len() {
        let mut ctx = ConversationContext::new("t", 10);
        ctx.push(msg("only"));
        assert_eq!(ctx.recent(10).len(), 1);
    }

    #[test]
    fn resume_trims_oversized_logs() {
        let mut conv = Conversation::new("old");
        for i in 0..6 {
            conv.messages.push(msg(&format!("m{i}")));
        }
        let ctx = ConversationContext::from_conversation(conv, 4);
        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx.recent(1)[0].content, "m5");
    }
}
