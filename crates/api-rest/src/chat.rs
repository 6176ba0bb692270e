//! Two-party conversations.

use crate::outcome::{refuse, refuse_to};
use crate::AppState;
use api_shared::{Notice, NoticeParams};
use axum::extract::{Extension, Path, Query, State};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::Form;
use hms_core::repositories::messaging::{ConversationSummary, ConversationView, MessagingService};
use hms_core::repositories::profiles::{Doctor, ProfileService};
use hms_core::validation::parse_id;
use hms_core::Actor;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct StartChatForm {
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct MessageForm {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct StartChatView {
    pub notice: Option<Notice>,
    pub doctors: Vec<Doctor>,
}

#[derive(Debug, Serialize)]
pub struct ConversationsView {
    pub notice: Option<Notice>,
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub notice: Option<Notice>,
    #[serde(flatten)]
    pub view: ConversationView,
}

#[utoipa::path(
    get,
    path = "/chat/start",
    params(NoticeParams),
    responses((status = 200, description = "Approved doctors the caller can message"))
)]
#[axum::debug_handler]
pub async fn start_view(
    State(state): State<AppState>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<StartChatView>, Response> {
    let doctors = ProfileService::new(state.db.clone(), state.cfg.clone())
        .approved_doctors()
        .await
        .map_err(refuse_to("/"))?;
    Ok(Json(StartChatView {
        notice: params.into_notice(),
        doctors,
    }))
}

#[utoipa::path(
    post,
    path = "/chat/start",
    request_body(content = StartChatForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the conversation, or back with an error"))
)]
/// Find or create the conversation between the caller and another user
#[axum::debug_handler]
pub async fn start(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Form(form): Form<StartChatForm>,
) -> Response {
    let other = match parse_id(&form.user_id, "User") {
        Ok(id) => id,
        Err(e) => return refuse("/chat/start", e),
    };
    match MessagingService::new(state.db.clone())
        .start_conversation(&actor, other)
        .await
    {
        Ok(id) => Redirect::to(&format!("/chat/{id}")).into_response(),
        Err(e) => refuse("/chat/start", e),
    }
}

#[utoipa::path(
    get,
    path = "/chat/list",
    params(NoticeParams),
    responses((status = 200, description = "The caller's conversations, newest first"))
)]
#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<ConversationsView>, Response> {
    let conversations = MessagingService::new(state.db.clone())
        .list_conversations(&actor)
        .await
        .map_err(refuse_to("/"))?;
    Ok(Json(ConversationsView {
        notice: params.into_notice(),
        conversations,
    }))
}

#[utoipa::path(
    get,
    path = "/chat/{id}",
    params(("id" = i64, Path, description = "Conversation id"), NoticeParams),
    responses((status = 200, description = "Messages, oldest first"))
)]
#[axum::debug_handler]
pub async fn conversation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<ChatView>, Response> {
    let id = parse_id(&id, "Conversation").map_err(refuse_to("/chat/list"))?;
    let view = MessagingService::new(state.db.clone())
        .conversation(&actor, id)
        .await
        .map_err(refuse_to("/chat/list"))?;
    Ok(Json(ChatView {
        notice: params.into_notice(),
        view,
    }))
}

#[utoipa::path(
    post,
    path = "/chat/{id}",
    params(("id" = i64, Path, description = "Conversation id")),
    request_body(content = MessageForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect back to the conversation"))
)]
#[axum::debug_handler]
pub async fn post_message(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Form(form): Form<MessageForm>,
) -> Response {
    let id = match parse_id(&id, "Conversation") {
        Ok(id) => id,
        Err(e) => return refuse("/chat/list", e),
    };
    let back = format!("/chat/{id}");
    match MessagingService::new(state.db.clone())
        .post_message(&actor, id, &form.body)
        .await
    {
        Ok(_) => Redirect::to(&back).into_response(),
        Err(e) => refuse(&back, e),
    }
}
