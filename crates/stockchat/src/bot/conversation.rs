//! Session transcript for the conversation loop
//!
//! A [`Session`] lives from REPL start until exit or `/clear`. It only grows,
//! except when a failed turn is rolled back.

use std::fmt::Write;
use stockchat_llm::{Message, Role};

/// Ordered transcript of one conversation
#[derive(Debug, Clone, Default)]
pub struct Session {
    messages: Vec<Message>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Every message so far, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything after the first `len` messages
    pub(crate) fn rollback_to(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Render the transcript for `/history`
    pub fn format_history(&self) -> String {
        if self.messages.is_empty() {
            return "No messages yet.".to_string();
        }

        let mut out = String::new();
        for (i, message) in self.messages.iter().enumerate() {
            let line = match message.role {
                Role::User => format!("You: {}", message.text().unwrap_or_default()),
                Role::Assistant => match message.function_call_request() {
                    Some(call) => format!("Assistant -> {}({})", call.name, call.arguments),
                    None => format!("Assistant: {}", message.text().unwrap_or_default()),
                },
                Role::Function => match message.function_output() {
                    Some((name, content)) => format!("[{name}] {content}"),
                    None => "[function]".to_string(),
                },
            };
            let _ = writeln!(out, "{:>3}. {line}", i + 1);
        }
        out
    }
}
