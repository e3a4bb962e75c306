//! REST surface of the chat core: publish, history, and soft-delete
//! operations. The live push channel lives in [`super::streaming`].

use std::sync::Arc;

use axum::extract::{Extension, Json, Path, Query};
use serde::Deserialize;
use shared::models::{ChatMessage, SendMessageRequest};

use crate::{
    http::error::{ApiError, AppResult},
    middleware::request_context::RequestContext,
    services::{delivery_router::DeliveryRouter, message_store::MessageStore},
};

fn authenticated_username(context: &RequestContext) -> AppResult<String> {
    context
        .username
        .clone()
        .ok_or_else(|| ApiError::unauthorized("credential required"))
}

/// Publish a message. The sender identity comes from the credential; the body
/// only names the recipient, content, and client-side timestamp.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message persisted and routed", body = ChatMessage),
        (status = 400, description = "Missing recipient"),
        (status = 401, description = "Credential missing or unresolvable")
    ),
    tag = "Chat"
)]
pub async fn send_message(
    Extension(router): Extension<Arc<DeliveryRouter>>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<SendMessageRequest>,
) -> AppResult<Json<ChatMessage>> {
    let sender = authenticated_username(&context)?;
    let message = router.route(&sender, request).await?;
    Ok(Json(message))
}

/// Full message history for a user, unfiltered by deletion flags; visibility
/// filtering is the viewing client's responsibility. Users may only fetch
/// their own history.
#[utoipa::path(
    get,
    path = "/chat/{username}",
    responses(
        (status = 200, description = "Ordered message history", body = Vec<ChatMessage>),
        (status = 403, description = "History requested for another user")
    ),
    tag = "Chat"
)]
pub async fn get_history(
    Extension(store): Extension<Arc<dyn MessageStore>>,
    Extension(context): Extension<RequestContext>,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let caller = authenticated_username(&context)?;
    if caller != username {
        return Err(ApiError::forbidden(
            "history can only be fetched for the authenticated user",
        ));
    }

    let messages = store.list_for_user(&username).await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageParams {
    #[serde(rename = "currentUsername")]
    pub current_username: String,
    #[serde(rename = "deleteForAll", default)]
    pub delete_for_all: bool,
}

/// Apply a deletion flag to a single message. `deleteForAll` only takes
/// effect when the caller is the message's sender.
#[utoipa::path(
    post,
    path = "/chat/message/{id}/delete",
    responses(
        (status = 200, description = "Deletion flag applied"),
        (status = 403, description = "Caller is not the named user or not a participant"),
        (status = 404, description = "No such message")
    ),
    tag = "Chat"
)]
pub async fn delete_message(
    Extension(store): Extension<Arc<dyn MessageStore>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<i64>,
    Query(params): Query<DeleteMessageParams>,
) -> AppResult<()> {
    let caller = authenticated_username(&context)?;
    if caller != params.current_username {
        return Err(ApiError::forbidden(
            "deletions can only be applied as the authenticated user",
        ));
    }

    store
        .mark_deleted(id, &params.current_username, params.delete_for_all)
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct DeleteConversationParams {
    #[serde(rename = "currentUsername")]
    pub current_username: String,
}

/// One-sided conversation delete: flags every message between the caller and
/// the named partner as deleted for the caller. The partner's copies survive.
#[utoipa::path(
    delete,
    path = "/chat/conversation/{other_username}",
    responses(
        (status = 200, description = "Conversation hidden for the caller"),
        (status = 403, description = "Caller is not the named user")
    ),
    tag = "Chat"
)]
pub async fn delete_conversation(
    Extension(store): Extension<Arc<dyn MessageStore>>,
    Extension(context): Extension<RequestContext>,
    Path(other_username): Path<String>,
    Query(params): Query<DeleteConversationParams>,
) -> AppResult<()> {
    let caller = authenticated_username(&context)?;
    if caller != params.current_username {
        return Err(ApiError::forbidden(
            "deletions can only be applied as the authenticated user",
        ));
    }

    store
        .delete_conversation(&params.current_username, &other_username)
        .await?;
    Ok(())
}
