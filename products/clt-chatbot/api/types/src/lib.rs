use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

pub type Slots = Map<String, Value>;

fn default_language() -> Option<String> {
    Some("ko".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub content: String,
    #[serde(default = "default_language")]
    pub language: Option<String>,
    #[serde(default)]
    pub slots: Option<Slots>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Scenario,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    #[serde(rename = "type")]
    pub kind: ResponseType,
    pub message: String,
    pub slots: Option<Slots>,
    pub next_node: Option<Value>,
}

impl ChatResponse {
    /// Mock reply: the user's content echoed back with the slots carried over.
    pub fn echo(request: &ChatRequest) -> Self {
        ChatResponse {
            kind: ResponseType::Text,
            message: format!("Echo: {} (Mock Response)", request.content),
            slots: Some(request.slots.clone().unwrap_or_default()),
            next_node: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn new(id: &str, title: &str, is_pinned: bool) -> Self {
        let now = Utc::now();
        ConversationSummary {
            id: id.to_string(),
            title: title.to_string(),
            is_pinned,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(id: &str, role: Role, content: &str) -> Self {
        Message {
            id: id.to_string(),
            ..Message::new(role, content)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationDetail {
    pub id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioItem {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl ScenarioItem {
    pub fn new(id: &str, title: &str, description: &str) -> Self {
        ScenarioItem {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioCategory {
    pub category: String,
    pub items: Vec<ScenarioItem>,
}

fn default_limit() -> i64 {
    50
}

/// Paging window over a conversation's messages.
#[derive(Validate, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1))]
    pub limit: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub offset: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        PageParams {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl PageParams {
    /// Index range into a list of `len` items. Out-of-range windows are empty.
    pub fn window(&self, len: usize) -> std::ops::Range<usize> {
        let start = usize::try_from(self.offset).unwrap_or(0).min(len);
        let limit = usize::try_from(self.limit).unwrap_or(0);
        start..start.saturating_add(limit).min(len)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: &str) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }

    pub fn conversation_not_found() -> Self {
        Self::new("Conversation not found")
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}
