use api_types::{
    ChatRequest, ChatResponse, ConversationDetail, ConversationSummary, Message, PageParams,
    Role, ScenarioCategory, ScenarioItem, UpdateConversationRequest,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type SharedStore = Arc<RwLock<Store>>;

const DEFAULT_TITLE: &str = "New Chat";

/// In-memory conversation store. Summaries are kept newest first; every
/// summary has a (possibly empty) message list under the same id.
#[derive(Debug, Default)]
pub struct Store {
    conversations: Vec<ConversationSummary>,
    messages: HashMap<String, Vec<Message>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded() -> Self {
        let mut store = Store::new();
        store.conversations = vec![
            ConversationSummary::new("uuid-1", "기본 인사 테스트", true),
            ConversationSummary::new("uuid-2", "비자 신청 문의", false),
        ];
        store.messages.insert(
            "uuid-1".to_string(),
            vec![
                Message::with_id("msg-1", Role::User, "안녕?"),
                Message::with_id("msg-2", Role::Assistant, "안녕하세요! 무엇을 도와드릴까요?"),
            ],
        );
        store.messages.insert("uuid-2".to_string(), Vec::new());
        store
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    /// Answers a chat message. When the request names a known conversation
    /// both sides of the exchange are appended to its history.
    pub fn chat(&mut self, request: &ChatRequest) -> ChatResponse {
        let response = ChatResponse::echo(request);

        if let Some(history) = request
            .conversation_id
            .as_ref()
            .and_then(|id| self.messages.get_mut(id))
        {
            history.push(Message::new(Role::User, &request.content));
            history.push(Message::new(Role::Assistant, &response.message));
        }

        response
    }

    pub fn create_conversation(&mut self, title: Option<String>) -> ConversationSummary {
        let title = match title {
            Some(title) if !title.is_empty() => title,
            _ => DEFAULT_TITLE.to_string(),
        };
        let summary = ConversationSummary::new(&Uuid::new_v4().to_string(), &title, false);

        self.conversations.insert(0, summary.clone());
        self.messages.insert(summary.id.clone(), Vec::new());
        summary
    }

    pub fn conversation_detail(&self, id: &str, page: &PageParams) -> Option<ConversationDetail> {
        let history = self.messages.get(id)?;
        Some(ConversationDetail {
            id: id.to_string(),
            messages: history[page.window(history.len())].to_vec(),
        })
    }

    pub fn update_conversation(
        &mut self,
        id: &str,
        request: &UpdateConversationRequest,
    ) -> Option<ConversationSummary> {
        let summary = self.conversations.iter_mut().find(|c| c.id == id)?;

        if let Some(title) = &request.title {
            summary.title = title.clone();
        }
        if let Some(is_pinned) = request.is_pinned {
            summary.is_pinned = is_pinned;
        }
        summary.updated_at = Utc::now();

        Some(summary.clone())
    }

    /// Returns false when no conversation with `id` exists.
    pub fn delete_conversation(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return false;
        }
        self.messages.remove(id);
        true
    }
}

pub fn scenarios() -> Vec<ScenarioCategory> {
    vec![
        ScenarioCategory {
            category: "인사".to_string(),
            items: vec![
                ScenarioItem::new("greeting", "기본 인사", "봇과 가볍게 인사를 나눕니다."),
                ScenarioItem::new("intro", "봇 소개", "이 봇의 기능을 설명합니다."),
            ],
        },
        ScenarioCategory {
            category: "민원".to_string(),
            items: vec![
                ScenarioItem::new("visa", "비자 문의", "비자 발급 절차를 안내합니다."),
                ScenarioItem::new("tax", "세금 납부", "지방세 납부 방법을 안내합니다."),
            ],
        },
    ]
}
