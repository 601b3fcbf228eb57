//! Transcript messages
//!
//! Three speakers take part: the user, the assistant (text, or a suggested
//! function call) and function results fed back to the model. A result must
//! directly follow the assistant message whose call it answers; the call id
//! pairs them on the wire.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Output of a function the assistant asked for
    Function,
}

/// A call suggested by the assistant
///
/// `arguments` is the model's JSON text, untouched. Whoever dispatches the
/// call decodes and validates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },

    FunctionCall(FunctionCall),

    /// Stringified output of a function, keyed by the call it answers
    FunctionResult {
        call_id: String,
        name: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

impl Message {
    fn with_text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text.into())),
        }
    }

    fn with_block(role: Role, block: ContentBlock) -> Self {
        Self {
            role,
            content: Some(MessageContent::Blocks(vec![block])),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_text(Role::Assistant, text)
    }

    /// Assistant message that only suggests `call`
    pub fn function_call(call: FunctionCall) -> Self {
        Self::with_block(Role::Assistant, ContentBlock::FunctionCall(call))
    }

    /// Output of `name`, answering the call with id `call_id`
    pub fn function_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::with_block(
            Role::Function,
            ContentBlock::FunctionResult {
                call_id: call_id.into(),
                name: name.into(),
                content: content.into(),
            },
        )
    }

    fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            Some(MessageContent::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }

    /// First text in the message
    pub fn text(&self) -> Option<&str> {
        if let Some(MessageContent::Text(text)) = &self.content {
            return Some(text);
        }
        self.blocks().iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn function_call_request(&self) -> Option<&FunctionCall> {
        self.blocks().iter().find_map(|block| match block {
            ContentBlock::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn has_function_call(&self) -> bool {
        self.function_call_request().is_some()
    }

    /// `(name, content)` of a function result
    pub fn function_output(&self) -> Option<(&str, &str)> {
        self.blocks().iter().find_map(|block| match block {
            ContentBlock::FunctionResult { name, content, .. } => {
                Some((name.as_str(), content.as_str()))
            }
            _ => None,
        })
    }
}
