use crate::error::ApiError;
use crate::store::{scenarios, SharedStore};
use api_types::{
    ChatRequest, ChatResponse, ConversationDetail, ConversationSummary,
    CreateConversationRequest, PageParams, ScenarioCategory, UpdateConversationRequest,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use log::debug;
use validator::Validate;

// Body and query rejections surface as 422 with a `detail`, the same shape
// as the domain errors.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::Unprocessable(e.body_text()))
}

pub async fn healthcheck() -> Html<&'static str> {
    Html("Service is up")
}

pub async fn chat(
    State(store): State<SharedStore>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = json_body(payload)?;
    let response = store.write().await.chat(&request);
    Ok(Json(response))
}

pub async fn list_conversations(State(store): State<SharedStore>) -> Json<Vec<ConversationSummary>> {
    Json(store.read().await.conversations().to_vec())
}

pub async fn create_conversation(
    State(store): State<SharedStore>,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConversationSummary>), ApiError> {
    let request = json_body(payload)?;
    let summary = store.write().await.create_conversation(request.title);
    debug!("Created conversation {}", summary.id);
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn conversation_detail(
    State(store): State<SharedStore>,
    Path(conversation_id): Path<String>,
    query: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let Query(page) = query.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    page.validate()?;

    store
        .read()
        .await
        .conversation_detail(&conversation_id, &page)
        .map(Json)
        .ok_or(ApiError::ConversationNotFound)
}

pub async fn update_conversation(
    State(store): State<SharedStore>,
    Path(conversation_id): Path<String>,
    payload: Result<Json<UpdateConversationRequest>, JsonRejection>,
) -> Result<Json<ConversationSummary>, ApiError> {
    let request = json_body(payload)?;
    store
        .write()
        .await
        .update_conversation(&conversation_id, &request)
        .map(Json)
        .ok_or(ApiError::ConversationNotFound)
}

pub async fn delete_conversation(
    State(store): State<SharedStore>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if store.write().await.delete_conversation(&conversation_id) {
        debug!("Deleted conversation {}", conversation_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::ConversationNotFound)
    }
}

pub async fn list_scenarios() -> Json<Vec<ScenarioCategory>> {
    Json(scenarios())
}
