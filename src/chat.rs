use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assistant::AiAssistant;

pub const WELCOME_MESSAGE: &str =
    "Hello! I'm your financial assistant. How can I help you today?";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub text: String,
    pub from_user: bool,
    pub error: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_user: false,
            error: false,
            timestamp: Utc::now(),
        }
    }

    fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_user: true,
            error: false,
            timestamp: Utc::now(),
        }
    }

    fn failure(text: impl Into<String>) -> Self {
        Self {
            error: true,
            ..Self::assistant(text)
        }
    }
}

/// Chat-screen state: the owned message transcript and an advisory busy
/// flag. The flag is checked at command-enablement time; it is not a lock,
/// since one session only ever runs one operation at a time.
pub struct ChatSession {
    assistant: Arc<dyn AiAssistant>,
    messages: Vec<ChatMessage>,
    busy: bool,
}

impl ChatSession {
    pub fn new(assistant: Arc<dyn AiAssistant>) -> Self {
        Self {
            assistant,
            messages: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            busy: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn can_send(&self, input: &str) -> bool {
        !self.busy && !input.trim().is_empty()
    }

    /// Sends one user message and appends the assistant's reply. Every
    /// failure ends up in the transcript as an error-tagged message; nothing
    /// propagates to the caller.
    pub async fn send(&mut self, input: &str) {
        if !self.can_send(input) {
            return;
        }

        self.busy = true;
        let text = input.trim().to_owned();
        self.messages.push(ChatMessage::user(text.clone()));

        match self.assistant.process_query(&text).await {
            Ok(reply) => self.messages.push(ChatMessage::assistant(reply)),
            Err(error) => self.messages.push(ChatMessage::failure(format!("Error: {error}"))),
        }
        self.busy = false;
    }

    /// Resets the transcript back to the welcome message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.messages.push(ChatMessage::assistant(WELCOME_MESSAGE));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::assistant::MockAssistant;

    use super::*;

    #[tokio::test]
    async fn starts_with_welcome_and_round_trips() {
        let assistant = Arc::new(MockAssistant::default());
        assistant.initialize("key", "model").await;

        let mut session = ChatSession::new(assistant);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].text, WELCOME_MESSAGE);

        session.send("  how much profit this month?  ").await;
        assert_eq!(session.messages().len(), 3);
        assert!(session.messages()[1].from_user);
        assert_eq!(session.messages()[1].text, "how much profit this month?");
        assert_eq!(
            session.messages()[2].text,
            "Mock reply to: how much profit this month?"
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn blank_input_is_not_sendable() {
        let assistant = Arc::new(MockAssistant::default());
        assistant.initialize("key", "model").await;

        let mut session = ChatSession::new(assistant);
        assert!(!session.can_send("   "));
        session.send("   ").await;
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn uninitialized_assistant_surfaces_as_error_message() {
        let mut session = ChatSession::new(Arc::new(MockAssistant::default()));
        session.send("hello").await;

        let last = session.messages().last().unwrap();
        assert!(last.error);
        assert!(last.text.contains("not initialized"));
    }

    #[tokio::test]
    async fn clear_restores_welcome() {
        let assistant = Arc::new(MockAssistant::default());
        assistant.initialize("key", "model").await;

        let mut session = ChatSession::new(assistant);
        session.send("hello").await;
        session.clear();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].text, WELCOME_MESSAGE);
    }
}
