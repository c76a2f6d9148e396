use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use quotedesk_domain::comments::{AddCommentInput, Comment, NotifyMentionsInput};
use quotedesk_domain::error::DomainError;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::{AuthContext, CorrelationId};
use crate::observability;
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CommentMode {
    List,
    Add,
    NotifyMentions,
}

impl CommentMode {
    fn as_str(self) -> &'static str {
        match self {
            CommentMode::List => "list",
            CommentMode::Add => "add",
            CommentMode::NotifyMentions => "notify_mentions",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct QuoteCommentsRequest {
    mode: CommentMode,
    #[validate(length(min = 1, max = 128))]
    quote_id: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    mentioned_user_ids: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ListResponse {
    comments: Vec<Comment>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddResponse {
    comment: Comment,
    delivered_mentions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    mention_error: Option<String>,
}

#[derive(Serialize)]
struct NotifyResponse {
    success: bool,
    delivered: usize,
}

pub(super) async fn handle(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(correlation): Extension<CorrelationId>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: QuoteCommentsRequest = validation::parse_json(&body)?;
    let caller = auth.caller()?;
    tracing::info!(
        mode = payload.mode.as_str(),
        quote_id = %payload.quote_id,
        user_id = %caller.user_id,
        role = auth.role.as_str(),
        correlation_id = %correlation.0,
        "quote comments request"
    );

    let mentioned_user_ids = payload.mentioned_user_ids.unwrap_or_default();
    match payload.mode {
        CommentMode::List => {
            let comments = state.comments.list(&caller, &payload.quote_id).await?;
            Ok(Json(ListResponse { comments }).into_response())
        }
        CommentMode::Add => {
            let input = AddCommentInput {
                quote_id: payload.quote_id,
                body: payload.body.unwrap_or_default(),
                mentioned_user_ids,
            };
            let outcome = state.comments.add(&caller, input).await?;
            let result = match (&outcome.mention_error, outcome.delivered_mentions) {
                (Some(_), _) => "failed",
                (None, 0) => "none",
                (None, _) => "delivered",
            };
            observability::register_mention_fanout(result);
            Ok(Json(AddResponse {
                comment: outcome.comment,
                delivered_mentions: outcome.delivered_mentions,
                mention_error: outcome.mention_error,
            })
            .into_response())
        }
        CommentMode::NotifyMentions => {
            let input = NotifyMentionsInput {
                quote_id: payload.quote_id,
                body: payload.body,
                mentioned_user_ids,
            };
            let delivered = match state.comments.notify_mentions(&caller, input).await {
                Ok(delivered) => delivered,
                Err(err) => {
                    if matches!(err, DomainError::Backend(_)) {
                        observability::register_mention_fanout("failed");
                    }
                    return Err(err.into());
                }
            };
            observability::register_mention_fanout(if delivered == 0 {
                "none"
            } else {
                "delivered"
            });
            Ok(Json(NotifyResponse {
                success: true,
                delivered,
            })
            .into_response())
        }
    }
}
