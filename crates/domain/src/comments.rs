use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::CallerCredentials;
use crate::mentions::{AliasIndex, ResolvedMention, extract_mention_keys};
use crate::notifications::{NotificationLocale, build_mention_notification, merge_recipients};
use crate::ports::comments::CommentRepository;
use crate::ports::notifications::NotificationRepository;
use crate::ports::quotes::QuoteRepository;
use crate::ports::team::TeamDirectory;
use crate::quotes::{QuoteRef, authorize_quote};
use crate::schema::{SchemaCapabilities, with_column_fallback};
use crate::team::MemberProjection;

const MAX_BODY_CHARS: usize = 10_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub quote_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub body: String,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewComment {
    pub quote_id: String,
    pub team_id: Option<String>,
    pub body: String,
    pub created_by: String,
}

#[derive(Clone, Debug, Default)]
pub struct AddCommentInput {
    pub quote_id: String,
    pub body: String,
    pub mentioned_user_ids: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NotifyMentionsInput {
    pub quote_id: String,
    pub body: Option<String>,
    pub mentioned_user_ids: Vec<String>,
}

/// Result of an add. The comment is stored even when fan-out failed; the
/// failure is carried in `mention_error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddCommentOutcome {
    pub comment: Comment,
    pub delivered_mentions: usize,
    pub mention_error: Option<String>,
}

#[derive(Clone)]
pub struct CommentPorts {
    pub quotes: Arc<dyn QuoteRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub team: Arc<dyn TeamDirectory>,
    pub notifications: Arc<dyn NotificationRepository>,
}

#[derive(Clone)]
pub struct CommentService {
    ports: CommentPorts,
    schema: Arc<SchemaCapabilities>,
    locale: NotificationLocale,
}

impl CommentService {
    pub fn new(
        ports: CommentPorts,
        schema: Arc<SchemaCapabilities>,
        locale: NotificationLocale,
    ) -> Self {
        Self {
            ports,
            schema,
            locale,
        }
    }

    pub fn schema(&self) -> &SchemaCapabilities {
        &self.schema
    }

    pub async fn authorize(
        &self,
        caller: &CallerCredentials,
        quote_id: &str,
    ) -> DomainResult<QuoteRef> {
        let quote_id = quote_id.trim();
        if quote_id.is_empty() {
            return Err(DomainError::Validation("quoteId is required".into()));
        }
        authorize_quote(self.ports.quotes.as_ref(), caller, quote_id).await
    }

    pub async fn list(
        &self,
        caller: &CallerCredentials,
        quote_id: &str,
    ) -> DomainResult<Vec<Comment>> {
        let quote = self.authorize(caller, quote_id).await?;
        let comments = &self.ports.comments;
        match quote.team_id() {
            Some(team_id) => {
                with_column_fallback(&self.schema.comment_team_scope, |scoped| {
                    comments.list_for_quote(&quote.id, scoped.then_some(team_id))
                })
                .await
            }
            None => comments.list_for_quote(&quote.id, None).await,
        }
    }

    pub async fn add(
        &self,
        caller: &CallerCredentials,
        input: AddCommentInput,
    ) -> DomainResult<AddCommentOutcome> {
        let body = validate_comment_body(&input.body)?;
        let quote = self.authorize(caller, &input.quote_id).await?;
        let comment = self.insert_comment(caller, &quote, body).await?;

        let (delivered_mentions, mention_error) = match self
            .fan_out(caller, &quote, &comment.body, &input.mentioned_user_ids)
            .await
        {
            Ok(delivered) => (delivered, None),
            Err(err) => {
                tracing::warn!(
                    quote_id = %quote.id,
                    comment_id = %comment.id,
                    error = %err,
                    "comment stored but mention notifications failed"
                );
                (0, Some(err.to_string()))
            }
        };

        Ok(AddCommentOutcome {
            comment,
            delivered_mentions,
            mention_error,
        })
    }

    /// Sends mention notifications for a body that already exists. Repeated
    /// calls notify again.
    pub async fn notify_mentions(
        &self,
        caller: &CallerCredentials,
        input: NotifyMentionsInput,
    ) -> DomainResult<usize> {
        let quote = self.authorize(caller, &input.quote_id).await?;
        let body = input.body.as_deref().map(str::trim).unwrap_or_default();
        self.fan_out(caller, &quote, body, &input.mentioned_user_ids)
            .await
    }

    /// Keys in `body` that map to exactly one member of the quote's team.
    pub async fn resolve_mentions(
        &self,
        quote: &QuoteRef,
        body: &str,
    ) -> DomainResult<Vec<ResolvedMention>> {
        let keys = extract_mention_keys(body);
        let Some(team_id) = quote.team_id() else {
            return Ok(Vec::new());
        };
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let team = &self.ports.team;
        let members = with_column_fallback(&self.schema.member_email, |with_email| {
            team.list_members(team_id, MemberProjection::from_email_included(with_email))
        })
        .await?;

        let index = AliasIndex::build(&members);
        let resolved = index.resolve(&keys);
        tracing::debug!(
            quote_id = %quote.id,
            keys = keys.len(),
            aliases = index.len(),
            resolved = resolved.len(),
            "mentions resolved"
        );
        Ok(resolved)
    }

    async fn insert_comment(
        &self,
        caller: &CallerCredentials,
        quote: &QuoteRef,
        body: String,
    ) -> DomainResult<Comment> {
        let comments = &self.ports.comments;
        let draft = |team_id: Option<&str>| NewComment {
            quote_id: quote.id.clone(),
            team_id: team_id.map(str::to_string),
            body: body.clone(),
            created_by: caller.user_id.clone(),
        };
        match quote.team_id() {
            Some(team_id) => {
                with_column_fallback(&self.schema.comment_team_scope, |scoped| {
                    let comment = draft(scoped.then_some(team_id));
                    async move { comments.insert(&comment).await }
                })
                .await
            }
            None => comments.insert(&draft(None)).await,
        }
    }

    async fn fan_out(
        &self,
        caller: &CallerCredentials,
        quote: &QuoteRef,
        body: &str,
        explicit: &[String],
    ) -> DomainResult<usize> {
        let resolved = self.resolve_mentions(quote, body).await?;
        let recipients = merge_recipients(explicit, &resolved, &caller.user_id);
        if recipients.is_empty() {
            return Ok(0);
        }

        let notifications: Vec<_> = recipients
            .iter()
            .map(|recipient| build_mention_notification(self.locale, quote, body, recipient))
            .collect();
        let delivered = self.ports.notifications.insert_many(&notifications).await?;
        tracing::info!(quote_id = %quote.id, delivered, "mention notifications stored");
        Ok(delivered)
    }
}

fn validate_comment_body(body: &str) -> DomainResult<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(DomainError::Validation("body is required".into()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(DomainError::Validation(format!(
            "body exceeds {MAX_BODY_CHARS} characters"
        )));
    }
    Ok(body.to_string())
}
