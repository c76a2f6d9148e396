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
use quotedesk_domain::team::{MemberProjection, TeamMemberIdentity};

use super::rows::{CommentRow, MemberRow, NewCommentRow, QUOTE_COLUMNS, QuoteRow, comment_columns};
use crate::config::AppConfig;
use crate::postgrest::{Credential, PostgrestClient, PostgrestError};

/// Postgres `invalid_text_representation`, e.g. a malformed uuid filter.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[derive(Clone)]
pub struct PostgrestQuoteRepository {
    client: PostgrestClient,
    table: String,
}

impl PostgrestQuoteRepository {
    pub fn new(client: PostgrestClient, config: &AppConfig) -> Self {
        Self {
            client,
            table: config.quotes_table.clone(),
        }
    }
}

impl QuoteRepository for PostgrestQuoteRepository {
    fn find_visible(
        &self,
        caller: &CallerCredentials,
        quote_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<QuoteRef>>> {
        let access_token = caller.access_token.clone();
        let quote_id = quote_id.to_string();
        Box::pin(async move {
            let query = [
                ("select", QUOTE_COLUMNS.to_string()),
                ("id", eq(&quote_id)),
                ("limit", "1".to_string()),
            ];
            let rows = self
                .client
                .select::<QuoteRow>(&self.table, &query, Credential::Caller(&access_token))
                .await;
            match rows {
                Ok(rows) => Ok(rows.into_iter().next().map(QuoteRef::from)),
                Err(err) if err.is_auth_rejection() => Ok(None),
                Err(PostgrestError::Api { code: Some(code), .. })
                    if code == INVALID_TEXT_REPRESENTATION =>
                {
                    Ok(None)
                }
                Err(err) => Err(err.into()),
            }
        })
    }
}

#[derive(Clone)]
pub struct PostgrestCommentRepository {
    client: PostgrestClient,
    table: String,
}

impl PostgrestCommentRepository {
    pub fn new(client: PostgrestClient, config: &AppConfig) -> Self {
        Self {
            client,
            table: config.comments_table.clone(),
        }
    }
}

impl CommentRepository for PostgrestCommentRepository {
    fn insert(&self, comment: &NewComment) -> BoxFuture<'_, DomainResult<Comment>> {
        let comment = comment.clone();
        Box::pin(async move {
            let row = NewCommentRow::from(&comment);
            let query = [(
                "select",
                comment_columns(comment.team_id.is_some()).to_string(),
            )];
            let stored = self
                .client
                .insert::<_, CommentRow>(
                    &self.table,
                    std::slice::from_ref(&row),
                    &query,
                    Credential::Service,
                )
                .await?;
            stored
                .into_iter()
                .next()
                .map(Comment::from)
                .ok_or_else(|| DomainError::Backend("comment insert returned no row".to_string()))
        })
    }

    fn list_for_quote(
        &self,
        quote_id: &str,
        team_id: Option<&str>,
    ) -> BoxFuture<'_, DomainResult<Vec<Comment>>> {
        let quote_id = quote_id.to_string();
        let team_id = team_id.map(str::to_string);
        Box::pin(async move {
            let mut query = vec![
                ("select", comment_columns(team_id.is_some()).to_string()),
                ("quote_id", eq(&quote_id)),
            ];
            if let Some(team_id) = &team_id {
                query.push(("team_id", eq(team_id)));
            }
            query.push(("order", "created_at.desc".to_string()));

            let rows = self
                .client
                .select::<CommentRow>(&self.table, &query, Credential::Service)
                .await?;
            Ok(rows.into_iter().map(Comment::from).collect())
        })
    }
}

#[derive(Clone)]
pub struct PostgrestTeamDirectory {
    client: PostgrestClient,
    view: String,
}

impl PostgrestTeamDirectory {
    pub fn new(client: PostgrestClient, config: &AppConfig) -> Self {
        Self {
            client,
            view: config.team_members_view.clone(),
        }
    }
}

impl TeamDirectory for PostgrestTeamDirectory {
    fn list_members(
        &self,
        team_id: &str,
        projection: MemberProjection,
    ) -> BoxFuture<'_, DomainResult<Vec<TeamMemberIdentity>>> {
        let team_id = team_id.to_string();
        Box::pin(async move {
            let query = [
                ("select", projection.columns().to_string()),
                ("team_id", eq(&team_id)),
            ];
            let rows = self
                .client
                .select::<MemberRow>(&self.view, &query, Credential::Service)
                .await?;
            Ok(rows.into_iter().map(TeamMemberIdentity::from).collect())
        })
    }
}

#[derive(Clone)]
pub struct PostgrestNotificationRepository {
    client: PostgrestClient,
    table: String,
}

impl PostgrestNotificationRepository {
    pub fn new(client: PostgrestClient, config: &AppConfig) -> Self {
        Self {
            client,
            table: config.notifications_table.clone(),
        }
    }
}

impl NotificationRepository for PostgrestNotificationRepository {
    fn insert_many(&self, notifications: &[Notification]) -> BoxFuture<'_, DomainResult<usize>> {
        let notifications = notifications.to_vec();
        Box::pin(async move {
            if notifications.is_empty() {
                return Ok(0);
            }
            self.client
                .insert_minimal(&self.table, notifications.as_slice(), Credential::Service)
                .await?;
            Ok(notifications.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use quotedesk_domain::notifications::{NotificationLocale, build_mention_notification};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    #[derive(Clone, Debug)]
    struct RecordedRequest {
        path: &'static str,
        query: HashMap<String, String>,
        apikey: Option<String>,
        authorization: Option<String>,
        prefer: Option<String>,
        body: Option<Value>,
    }

    #[derive(Clone, Default)]
    struct FakeBackend {
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        member_failures_left: Arc<Mutex<u32>>,
    }

    impl FakeBackend {
        async fn record(
            &self,
            path: &'static str,
            query: HashMap<String, String>,
            headers: &HeaderMap,
            body: Option<Value>,
        ) {
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            self.requests.lock().await.push(RecordedRequest {
                path,
                query,
                apikey: header("apikey"),
                authorization: header("authorization"),
                prefer: header("prefer"),
                body,
            });
        }

        async fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().await.clone()
        }
    }

    async fn quotes(
        State(backend): State<FakeBackend>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        backend.record("quotes", query.clone(), &headers, None).await;
        let caller_ok = headers
            .get("authorization")
            .is_some_and(|value| value == "Bearer caller-token");
        match query.get("id").map(String::as_str) {
            Some("eq.Q1") if caller_ok => (
                StatusCode::OK,
                Json(json!([{ "id": "Q1", "team_id": "T1", "number": 12 }])),
            ),
            Some("eq.not-a-uuid") => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "code": "22P02",
                    "message": "invalid input syntax for type uuid: \"not-a-uuid\"",
                    "details": null,
                    "hint": null
                })),
            ),
            _ => (StatusCode::OK, Json(json!([]))),
        }
    }

    async fn insert_comment(
        State(backend): State<FakeBackend>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        backend
            .record("quote_comments", query, &headers, Some(body.clone()))
            .await;
        let row = &body[0];
        if row.get("team_id").is_some() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "code": "PGRST204",
                    "message": "Could not find the 'team_id' column of 'quote_comments' in the schema cache",
                    "details": null,
                    "hint": null
                })),
            );
        }
        (
            StatusCode::CREATED,
            Json(json!([{
                "id": "c-1",
                "quote_id": row["quote_id"],
                "body": row["body"],
                "created_by": row["created_by"],
                "created_at": "2026-10-16T10:00:00.123456+00:00"
            }])),
        )
    }

    async fn members(
        State(backend): State<FakeBackend>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        backend
            .record("team_members_view", query, &headers, None)
            .await;
        let mut failures_left = backend.member_failures_left.lock().await;
        if *failures_left > 0 {
            *failures_left -= 1;
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "message": "upstream restarting" })),
            );
        }
        (
            StatusCode::OK,
            Json(json!([{ "user_id": "u-bob", "full_name": "Bob Stone" }])),
        )
    }

    async fn insert_notifications(
        State(backend): State<FakeBackend>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        backend
            .record("notifications", query, &headers, Some(body))
            .await;
        StatusCode::CREATED
    }

    async fn spawn_backend(backend: FakeBackend) -> String {
        let app = Router::new()
            .route("/rest/v1/quotes", get(quotes))
            .route("/rest/v1/quote_comments", post(insert_comment))
            .route("/rest/v1/team_members_view", get(members))
            .route("/rest/v1/notifications", post(insert_notifications))
            .with_state(backend);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake backend");
        });
        format!("http://{addr}")
    }

    async fn setup() -> (FakeBackend, PostgrestClient, AppConfig) {
        let backend = FakeBackend::default();
        let url = spawn_backend(backend.clone()).await;
        let config = AppConfig::for_tests(&url);
        let client = PostgrestClient::from_config(&config).expect("client");
        (backend, client, config)
    }

    #[tokio::test]
    async fn quote_reads_are_signed_with_the_caller_token() {
        let (backend, client, config) = setup().await;
        let repo = PostgrestQuoteRepository::new(client, &config);
        let caller = CallerCredentials::new("u-1", "caller-token");

        let quote = repo
            .find_visible(&caller, "Q1")
            .await
            .expect("read")
            .expect("visible");
        assert_eq!(quote, QuoteRef::new("Q1").with_team("T1").with_number("12"));

        let other = CallerCredentials::new("u-2", "other-token");
        assert!(repo.find_visible(&other, "Q1").await.expect("read").is_none());
        assert!(
            repo.find_visible(&caller, "not-a-uuid")
                .await
                .expect("malformed id reads as invisible")
                .is_none()
        );

        let requests = backend.requests().await;
        assert_eq!(requests[0].apikey.as_deref(), Some("anon-key"));
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer caller-token"));
        assert_eq!(requests[0].query["select"], "id,team_id,number");
        assert_eq!(requests[0].query["limit"], "1");
    }

    #[tokio::test]
    async fn comment_insert_surfaces_missing_team_column() {
        let (backend, client, config) = setup().await;
        let repo = PostgrestCommentRepository::new(client, &config);
        let mut draft = NewComment {
            quote_id: "Q1".into(),
            team_id: Some("T1".into()),
            body: "hello".into(),
            created_by: "u-1".into(),
        };

        let err = repo.insert(&draft).await.expect_err("missing column");
        assert!(err.is_missing_column("team_id"));

        draft.team_id = None;
        let stored = repo.insert(&draft).await.expect("unscoped insert");
        assert_eq!(stored.id, "c-1");
        assert_eq!(stored.team_id, None);
        assert_eq!(stored.body, "hello");

        let requests = backend.requests().await;
        assert_eq!(requests.len(), 2, "writes are never retried");
        let unscoped = &requests[1];
        assert_eq!(unscoped.authorization.as_deref(), Some("Bearer service-key"));
        assert_eq!(unscoped.prefer.as_deref(), Some("return=representation"));
        assert_eq!(unscoped.query["select"], "id,quote_id,body,created_by,created_at");
    }

    #[tokio::test]
    async fn member_reads_retry_server_errors() {
        let (backend, client, config) = setup().await;
        *backend.member_failures_left.lock().await = 1;
        let directory = PostgrestTeamDirectory::new(client, &config);

        let members = directory
            .list_members("T1", MemberProjection::NameOnly)
            .await
            .expect("members after retry");
        assert_eq!(members, vec![TeamMemberIdentity::new("u-bob").with_full_name("Bob Stone")]);

        let requests = backend.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].query["select"], "user_id,full_name");
        assert_eq!(requests[1].query["team_id"], "eq.T1");
    }

    #[tokio::test]
    async fn notifications_are_written_as_one_batch() {
        let (backend, client, config) = setup().await;
        let repo = PostgrestNotificationRepository::new(client, &config);
        let quote = QuoteRef::new("Q1");
        let batch = vec![
            build_mention_notification(NotificationLocale::En, &quote, "hi", "u-1"),
            build_mention_notification(NotificationLocale::En, &quote, "hi", "u-2"),
        ];

        assert_eq!(repo.insert_many(&batch).await.expect("insert"), 2);

        let requests = backend.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prefer.as_deref(), Some("return=minimal"));
        let body = requests[0].body.as_ref().expect("body");
        assert_eq!(body.as_array().map(Vec::len), Some(2));
        assert_eq!(body[0]["type"], "mention");
        assert_eq!(body[1]["href"], "/orders/estimates/Q1");
    }
}
