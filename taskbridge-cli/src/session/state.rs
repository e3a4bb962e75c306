//! Reconciliation of fetched history and live pushes into the conversation
//! list the user sees.
//!
//! Conversations have no backend identity: they are materialized here by
//! grouping the flat message history on the partner username and filtering by
//! the viewer's deletion flag. All of this is pure state manipulation, driven
//! from a single event loop, so no locking is involved.

use shared::models::{ChatMessage, Timestamp};

/// One conversation as the user sees it, keyed by the partner username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    pub partner: String,
    pub messages: Vec<ChatMessage>,
    pub last_message: String,
    pub last_message_time: Option<Timestamp>,
    pub unread_count: u64,
}

impl ConversationView {
    fn empty(partner: &str) -> Self {
        Self {
            partner: partner.to_string(),
            messages: Vec::new(),
            last_message: String::new(),
            last_message_time: None,
            unread_count: 0,
        }
    }

    fn refresh_summary(&mut self) {
        match self.messages.last() {
            Some(last) => {
                self.last_message = last.content.clone();
                self.last_message_time = Some(last.timestamp.clone());
            }
            None => {
                self.last_message = String::new();
                self.last_message_time = None;
            }
        }
    }
}

/// The reconciled view of the authenticated user's conversations.
#[derive(Debug)]
pub struct SessionState {
    current_user: String,
    conversations: Vec<ConversationView>,
    active_partner: Option<String>,
}

impl SessionState {
    #[must_use]
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            conversations: Vec::new(),
            active_partner: None,
        }
    }

    #[must_use]
    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    /// Conversations in display order: most recent activity first.
    #[must_use]
    pub fn conversations(&self) -> &[ConversationView] {
        &self.conversations
    }

    #[must_use]
    pub fn conversation(&self, partner: &str) -> Option<&ConversationView> {
        self.conversations.iter().find(|c| c.partner == partner)
    }

    /// Rebuilds the conversation list from a freshly fetched history.
    ///
    /// Messages deleted for this user's role are dropped, the rest grouped by
    /// partner and ordered by (timestamp, id). The initial load never counts
    /// anything as unread; unread accounting only reacts to pushes.
    pub fn load_history(&mut self, messages: Vec<ChatMessage>) {
        self.conversations.clear();

        for message in messages {
            if !message.visible_to(&self.current_user) {
                continue;
            }
            let partner = message.partner_of(&self.current_user).to_string();
            self.conversation_entry(&partner).messages.push(message);
        }

        for conversation in &mut self.conversations {
            conversation
                .messages
                .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
            conversation.refresh_summary();
        }

        self.sort_conversations();
    }

    /// Merges one pushed message into the view.
    ///
    /// The message is appended only when no existing message in the same
    /// conversation matches on (content, timestamp, sender) simultaneously;
    /// that guards against an optimistic local echo and the live push both
    /// describing the same event. Returns whether the message was appended.
    ///
    /// A push into any conversation other than the currently open one bumps
    /// that conversation's unread count by exactly one.
    pub fn apply_push(&mut self, message: ChatMessage) -> bool {
        let partner = message.partner_of(&self.current_user).to_string();
        let active = self.active_partner.clone();
        let conversation = self.conversation_entry(&partner);

        let duplicate = conversation.messages.iter().any(|existing| {
            existing.content == message.content
                && existing.timestamp == message.timestamp
                && existing.sender_username == message.sender_username
        });
        if duplicate {
            return false;
        }

        conversation.messages.push(message);
        conversation.refresh_summary();
        if active.as_deref() != Some(partner.as_str()) {
            conversation.unread_count += 1;
        }

        self.sort_conversations();
        true
    }

    /// Opens (and if needed creates) the conversation with `partner`,
    /// resetting its unread count. There is no server-side read receipt; the
    /// reset is purely local.
    pub fn open_conversation(&mut self, partner: &str) {
        self.conversation_entry(partner).unread_count = 0;
        self.active_partner = Some(partner.to_string());
        self.sort_conversations();
    }

    #[must_use]
    pub fn active_partner(&self) -> Option<&str> {
        self.active_partner.as_deref()
    }

    /// Local mirror of a successful single-message delete: the message
    /// disappears from this user's view; an emptied conversation disappears
    /// with it.
    pub fn remove_message(&mut self, partner: &str, message_id: i64) {
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.partner == partner)
        {
            conversation.messages.retain(|m| m.id != message_id);
            conversation.refresh_summary();
        }
        self.conversations.retain(|c| !c.messages.is_empty());
        self.sort_conversations();
    }

    /// Local mirror of a successful conversation delete.
    pub fn remove_conversation(&mut self, partner: &str) {
        self.conversations.retain(|c| c.partner != partner);
        if self.active_partner.as_deref() == Some(partner) {
            self.active_partner = None;
        }
    }

    fn conversation_entry(&mut self, partner: &str) -> &mut ConversationView {
        if let Some(index) = self
            .conversations
            .iter()
            .position(|c| c.partner == partner)
        {
            &mut self.conversations[index]
        } else {
            self.conversations.push(ConversationView::empty(partner));
            self.conversations
                .last_mut()
                .expect("conversation was just pushed")
        }
    }

    fn sort_conversations(&mut self) {
        // Full re-sort; a front-move would only be an optimization and must
        // produce the same order.
        self.conversations
            .sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    fn at(seconds: u32) -> Timestamp {
        Timestamp(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, seconds).unwrap())
    }

    fn message(id: i64, sender: &str, recipient: &str, content: &str, time: Timestamp) -> ChatMessage {
        ChatMessage {
            id,
            sender_username: sender.to_string(),
            recipient_username: recipient.to_string(),
            content: content.to_string(),
            timestamp: time,
            deleted_by_sender: false,
            deleted_by_recipient: false,
        }
    }

    #[test]
    fn load_groups_by_partner_and_orders_messages() {
        let mut state = SessionState::new("alice");
        state.load_history(vec![
            message(3, "carol", "alice", "late", at(30)),
            message(1, "alice", "bob", "hi bob", at(10)),
            message(2, "bob", "alice", "hi alice", at(20)),
        ]);

        // Conversation list is ordered by most recent activity.
        let partners: Vec<&str> = state
            .conversations()
            .iter()
            .map(|c| c.partner.as_str())
            .collect();
        assert_eq!(partners, vec!["carol", "bob"]);

        let bob = state.conversation("bob").unwrap();
        let contents: Vec<&str> = bob.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi bob", "hi alice"]);
        assert_eq!(bob.last_message, "hi alice");
        assert_eq!(bob.unread_count, 0);
    }

    #[test]
    fn load_breaks_timestamp_ties_by_identity() {
        let mut state = SessionState::new("alice");
        state.load_history(vec![
            message(2, "bob", "alice", "second", at(10)),
            message(1, "alice", "bob", "first", at(10)),
        ]);

        let bob = state.conversation("bob").unwrap();
        let contents: Vec<&str> = bob.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn load_filters_messages_deleted_for_this_role() {
        let mut deleted_for_me = message(1, "alice", "bob", "gone", at(10));
        deleted_for_me.deleted_by_sender = true;
        let mut deleted_for_partner = message(2, "bob", "alice", "kept", at(20));
        deleted_for_partner.deleted_by_sender = true;

        let mut state = SessionState::new("alice");
        state.load_history(vec![deleted_for_me, deleted_for_partner]);

        // The first message is deleted for alice (its sender); the second is
        // deleted only for bob, so alice still sees it.
        let bob = state.conversation("bob").unwrap();
        let contents: Vec<&str> = bob.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["kept"]);
    }

    #[test]
    fn conversation_disappears_when_every_message_is_deleted_for_viewer() {
        let mut msg = message(1, "alice", "bob", "hidden", at(10));
        msg.deleted_by_sender = true;

        let mut state = SessionState::new("alice");
        state.load_history(vec![msg]);

        assert!(state.conversation("bob").is_none());
        assert!(state.conversations().is_empty());
    }

    #[test]
    fn push_appends_and_reorders_conversations() {
        let mut state = SessionState::new("alice");
        state.load_history(vec![
            message(1, "bob", "alice", "old bob", at(10)),
            message(2, "carol", "alice", "newer carol", at(20)),
        ]);

        assert_eq!(state.conversations()[0].partner, "carol");

        assert!(state.apply_push(message(3, "bob", "alice", "fresh", at(30))));

        // Bob moved to the front; the final order equals a full re-sort.
        assert_eq!(state.conversations()[0].partner, "bob");
        assert_eq!(state.conversations()[0].last_message, "fresh");
    }

    #[test]
    fn push_creates_a_conversation_for_a_new_partner() {
        let mut state = SessionState::new("alice");
        assert!(state.apply_push(message(1, "dave", "alice", "hello", at(10))));

        let dave = state.conversation("dave").unwrap();
        assert_eq!(dave.messages.len(), 1);
        assert_eq!(dave.unread_count, 1);
    }

    #[test]
    fn push_deduplicates_on_content_timestamp_and_sender() {
        let mut state = SessionState::new("alice");
        state.load_history(vec![message(1, "bob", "alice", "hi", at(10))]);

        // Same (content, timestamp, sender): the push is the same event the
        // history already delivered.
        assert!(!state.apply_push(message(99, "bob", "alice", "hi", at(10))));
        assert_eq!(state.conversation("bob").unwrap().messages.len(), 1);

        // Any differing component means a genuinely new message.
        assert!(state.apply_push(message(4, "bob", "alice", "hi", at(11))));
        assert!(state.apply_push(message(5, "bob", "alice", "hi!", at(10))));
        assert!(state.apply_push(message(6, "alice", "bob", "hi", at(10))));
        assert_eq!(state.conversation("bob").unwrap().messages.len(), 4);
    }

    #[test]
    fn unread_increments_only_for_inactive_conversations() {
        let mut state = SessionState::new("alice");
        state.open_conversation("bob");

        state.apply_push(message(1, "bob", "alice", "seen live", at(10)));
        assert_eq!(state.conversation("bob").unwrap().unread_count, 0);

        state.apply_push(message(2, "carol", "alice", "waiting", at(20)));
        state.apply_push(message(3, "carol", "alice", "still waiting", at(30)));
        assert_eq!(state.conversation("carol").unwrap().unread_count, 2);
    }

    #[test]
    fn opening_a_conversation_resets_its_unread_count() {
        let mut state = SessionState::new("alice");
        state.apply_push(message(1, "bob", "alice", "one", at(10)));
        state.apply_push(message(2, "bob", "alice", "two", at(20)));
        assert_eq!(state.conversation("bob").unwrap().unread_count, 2);

        state.open_conversation("bob");
        assert_eq!(state.conversation("bob").unwrap().unread_count, 0);
        assert_eq!(state.active_partner(), Some("bob"));
    }

    // The offline scenario: A sent "hello" at t=100 while B was offline. B's
    // initial load never counts unread; only a push that lands while the
    // conversation is not active does.
    #[test_case(true; "conversation opened before the push")]
    #[test_case(false; "conversation never opened")]
    fn offline_backlog_counts_unread_only_on_push(opened: bool) {
        let mut state = SessionState::new("bob");
        state.load_history(vec![message(1, "alice", "bob", "hello", at(10))]);
        assert_eq!(state.conversation("alice").unwrap().unread_count, 0);

        if opened {
            state.open_conversation("alice");
        }

        state.apply_push(message(2, "alice", "bob", "are you there?", at(20)));
        let expected = u64::from(!opened);
        assert_eq!(state.conversation("alice").unwrap().unread_count, expected);
    }

    #[test]
    fn removing_the_last_message_drops_the_conversation() {
        let mut state = SessionState::new("alice");
        state.load_history(vec![
            message(1, "bob", "alice", "only one", at(10)),
            message(2, "carol", "alice", "other", at(20)),
        ]);

        state.remove_message("bob", 1);
        assert!(state.conversation("bob").is_none());
        assert!(state.conversation("carol").is_some());
    }

    #[test]
    fn removing_a_conversation_clears_the_active_marker() {
        let mut state = SessionState::new("alice");
        state.apply_push(message(1, "bob", "alice", "hi", at(10)));
        state.open_conversation("bob");

        state.remove_conversation("bob");
        assert!(state.conversation("bob").is_none());
        assert_eq!(state.active_partner(), None);
    }
}
