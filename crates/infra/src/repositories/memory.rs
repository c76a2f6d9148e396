use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use quotedesk_domain::DomainResult;
use quotedesk_domain::comments::{Comment, NewComment};
use quotedesk_domain::error::DomainError;
use quotedesk_domain::identity::CallerCredentials;
use quotedesk_domain::notifications::Notification;
use quotedesk_domain::ports::BoxFuture;
use quotedesk_domain::ports::comments::CommentRepository;
use quotedesk_domain::ports::notifications::NotificationRepository;
use quotedesk_domain::ports::quotes::QuoteRepository;
use quotedesk_domain::ports::team::TeamDirectory;
use quotedesk_domain::quotes::QuoteRef;
use quotedesk_domain::schema::{COMMENTS_TEAM_ID_COLUMN, MEMBERS_EMAIL_COLUMN};
use quotedesk_domain::team::{MemberProjection, TeamMemberIdentity};
use quotedesk_domain::util::{format_ms_rfc3339, new_record_id, now_ms};
use tokio::sync::RwLock;

fn missing_column(column: &str, relation: &str) -> DomainError {
    DomainError::Backend(format!(
        "Could not find the '{column}' column of '{relation}' in the schema cache"
    ))
}

#[derive(Clone, Debug)]
struct StoredQuote {
    quote: QuoteRef,
    viewers: HashSet<String>,
}

/// Quotes with an explicit viewer list standing in for row-level security.
#[derive(Clone, Default)]
pub struct InMemoryQuoteRepository {
    quotes: Arc<RwLock<HashMap<String, StoredQuote>>>,
}

impl InMemoryQuoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert<I, S>(&self, quote: QuoteRef, viewers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let viewers = viewers.into_iter().map(Into::into).collect();
        self.quotes
            .write()
            .await
            .insert(quote.id.clone(), StoredQuote { quote, viewers });
    }
}

impl QuoteRepository for InMemoryQuoteRepository {
    fn find_visible(
        &self,
        caller: &CallerCredentials,
        quote_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<QuoteRef>>> {
        let user_id = caller.user_id.clone();
        let quote_id = quote_id.to_string();
        let quotes = self.quotes.clone();
        Box::pin(async move {
            let quotes = quotes.read().await;
            Ok(quotes
                .get(&quote_id)
                .filter(|stored| stored.viewers.contains(&user_id))
                .map(|stored| stored.quote.clone()))
        })
    }
}

#[derive(Clone, Debug)]
struct StoredComment {
    comment: Comment,
    created_at_ms: i64,
    sequence: u64,
}

#[derive(Clone)]
pub struct InMemoryCommentRepository {
    rows: Arc<RwLock<Vec<StoredComment>>>,
    team_column: bool,
    failure: Option<String>,
}

impl Default for InMemoryCommentRepository {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            team_column: true,
            failure: None,
        }
    }
}

impl InMemoryCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behaves like a schema without `quote_comments.team_id`.
    pub fn without_team_column(mut self) -> Self {
        self.team_column = false;
        self
    }

    /// Every write fails with `message`.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub async fn all(&self) -> Vec<Comment> {
        self.rows
            .read()
            .await
            .iter()
            .map(|stored| stored.comment.clone())
            .collect()
    }
}

impl CommentRepository for InMemoryCommentRepository {
    fn insert(&self, comment: &NewComment) -> BoxFuture<'_, DomainResult<Comment>> {
        let comment = comment.clone();
        let rows = self.rows.clone();
        let team_column = self.team_column;
        let failure = self.failure.clone();
        Box::pin(async move {
            if let Some(message) = failure {
                return Err(DomainError::Backend(message));
            }
            if comment.team_id.is_some() && !team_column {
                return Err(missing_column(COMMENTS_TEAM_ID_COLUMN, "quote_comments"));
            }
            let created_at_ms = now_ms();
            let stored = Comment {
                id: new_record_id(),
                quote_id: comment.quote_id,
                team_id: comment.team_id,
                body: comment.body,
                created_by: comment.created_by,
                created_at: format_ms_rfc3339(created_at_ms),
            };
            let mut rows = rows.write().await;
            let sequence = rows.len() as u64;
            rows.push(StoredComment {
                comment: stored.clone(),
                created_at_ms,
                sequence,
            });
            Ok(stored)
        })
    }

    fn list_for_quote(
        &self,
        quote_id: &str,
        team_id: Option<&str>,
    ) -> BoxFuture<'_, DomainResult<Vec<Comment>>> {
        let quote_id = quote_id.to_string();
        let team_id = team_id.map(str::to_string);
        let rows = self.rows.clone();
        let team_column = self.team_column;
        Box::pin(async move {
            if team_id.is_some() && !team_column {
                return Err(missing_column(COMMENTS_TEAM_ID_COLUMN, "quote_comments"));
            }
            let rows = rows.read().await;
            let mut matching: Vec<&StoredComment> = rows
                .iter()
                .filter(|stored| stored.comment.quote_id == quote_id)
                .filter(|stored| {
                    team_id
                        .as_deref()
                        .is_none_or(|team_id| stored.comment.team_id.as_deref() == Some(team_id))
                })
                .collect();
            matching.sort_by(|left, right| {
                right
                    .created_at_ms
                    .cmp(&left.created_at_ms)
                    .then_with(|| right.sequence.cmp(&left.sequence))
            });
            Ok(matching
                .into_iter()
                .map(|stored| stored.comment.clone())
                .collect())
        })
    }
}

#[derive(Clone)]
pub struct InMemoryTeamDirectory {
    members: Arc<RwLock<HashMap<String, Vec<TeamMemberIdentity>>>>,
    email_column: bool,
}

impl Default for InMemoryTeamDirectory {
    fn default() -> Self {
        Self {
            members: Arc::new(RwLock::new(HashMap::new())),
            email_column: true,
        }
    }
}

impl InMemoryTeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behaves like a membership view without an `email` column.
    pub fn without_email_column(mut self) -> Self {
        self.email_column = false;
        self
    }

    pub async fn add_member(&self, team_id: &str, member: TeamMemberIdentity) {
        self.members
            .write()
            .await
            .entry(team_id.to_string())
            .or_default()
            .push(member);
    }
}

impl TeamDirectory for InMemoryTeamDirectory {
    fn list_members(
        &self,
        team_id: &str,
        projection: MemberProjection,
    ) -> BoxFuture<'_, DomainResult<Vec<TeamMemberIdentity>>> {
        let team_id = team_id.to_string();
        let members = self.members.clone();
        let email_column = self.email_column;
        Box::pin(async move {
            if projection == MemberProjection::WithEmail && !email_column {
                return Err(missing_column(MEMBERS_EMAIL_COLUMN, "team_members_view"));
            }
            let members = members.read().await;
            Ok(members
                .get(&team_id)
                .map(|members| {
                    members
                        .iter()
                        .cloned()
                        .map(|mut member| {
                            if projection == MemberProjection::NameOnly {
                                member.email = None;
                            }
                            member
                        })
                        .collect()
                })
                .unwrap_or_default())
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationRepository {
    rows: Arc<RwLock<Vec<Notification>>>,
    failure: Option<String>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.rows.read().await.clone()
    }
}

impl NotificationRepository for InMemoryNotificationRepository {
    fn insert_many(&self, notifications: &[Notification]) -> BoxFuture<'_, DomainResult<usize>> {
        let notifications = notifications.to_vec();
        let rows = self.rows.clone();
        let failure = self.failure.clone();
        Box::pin(async move {
            if let Some(message) = failure {
                return Err(DomainError::Backend(message));
            }
            let count = notifications.len();
            rows.write().await.extend(notifications);
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quotes_are_only_visible_to_viewers() {
        let repo = InMemoryQuoteRepository::new();
        repo.insert(QuoteRef::new("Q1").with_team("T1"), ["u-1"]).await;

        let owner = CallerCredentials::new("u-1", "token");
        let stranger = CallerCredentials::new("u-2", "token");
        assert!(repo.find_visible(&owner, "Q1").await.expect("read").is_some());
        assert!(repo.find_visible(&stranger, "Q1").await.expect("read").is_none());
        assert!(repo.find_visible(&owner, "Q9").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn comments_list_newest_first_and_filter_by_team() {
        let repo = InMemoryCommentRepository::new();
        for (body, team) in [("a", Some("T1")), ("b", None), ("c", Some("T1"))] {
            repo.insert(&NewComment {
                quote_id: "Q1".into(),
                team_id: team.map(str::to_string),
                body: body.into(),
                created_by: "u-1".into(),
            })
            .await
            .expect("insert");
        }

        let all = repo.list_for_quote("Q1", None).await.expect("list");
        let bodies: Vec<_> = all.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["c", "b", "a"]);

        let scoped = repo.list_for_quote("Q1", Some("T1")).await.expect("list");
        assert_eq!(scoped.len(), 2);
    }

    #[tokio::test]
    async fn missing_team_column_is_reported_like_the_schema_cache() {
        let repo = InMemoryCommentRepository::new().without_team_column();
        let err = repo
            .list_for_quote("Q1", Some("T1"))
            .await
            .expect_err("missing column");
        assert!(err.is_missing_column("team_id"));
        assert!(repo.list_for_quote("Q1", None).await.is_ok());
    }

    #[tokio::test]
    async fn name_only_projection_drops_email() {
        let directory = InMemoryTeamDirectory::new();
        directory
            .add_member(
                "T1",
                TeamMemberIdentity::new("u-1").with_email("one@acme.test"),
            )
            .await;
        let members = directory
            .list_members("T1", MemberProjection::NameOnly)
            .await
            .expect("members");
        assert_eq!(members[0].email, None);

        let err = directory
            .without_email_column()
            .list_members("T1", MemberProjection::WithEmail)
            .await
            .expect_err("missing column");
        assert!(err.is_missing_column("email"));
    }
}
