use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use quotedesk_domain::comments::{CommentPorts, CommentService};
use quotedesk_domain::notifications::NotificationLocale;
use quotedesk_domain::ports::db::BackendAdapter;
use quotedesk_domain::schema::{ColumnSupport, SchemaCapabilities};
use quotedesk_infra::auth::SupabaseAuthService;
use quotedesk_infra::config::AppConfig;
use quotedesk_infra::db::{InMemoryAdapter, PostgrestAdapter};
use quotedesk_infra::postgrest::PostgrestClient;
use quotedesk_infra::repositories::{
    InMemoryCommentRepository, InMemoryNotificationRepository, InMemoryQuoteRepository,
    InMemoryTeamDirectory, MemorySeed, PostgrestCommentRepository, PostgrestNotificationRepository,
    PostgrestQuoteRepository, PostgrestTeamDirectory,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub comments: CommentService,
    pub backend: Arc<dyn BackendAdapter>,
    pub auth_service: Option<SupabaseAuthService>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let (ports, backend): (CommentPorts, Arc<dyn BackendAdapter>) =
            match config.data_backend.trim().to_ascii_lowercase().as_str() {
                "memory" => {
                    tracing::warn!("using in-memory backend; comments are lost on restart");
                    (memory_ports(&config).await?, Arc::new(InMemoryAdapter))
                }
                "postgrest" => {
                    let client =
                        PostgrestClient::from_config(&config).context("build postgrest client")?;
                    let ports = CommentPorts {
                        quotes: Arc::new(PostgrestQuoteRepository::new(client.clone(), &config)),
                        comments: Arc::new(PostgrestCommentRepository::new(
                            client.clone(),
                            &config,
                        )),
                        team: Arc::new(PostgrestTeamDirectory::new(client.clone(), &config)),
                        notifications: Arc::new(PostgrestNotificationRepository::new(
                            client, &config,
                        )),
                    };
                    (ports, Arc::new(PostgrestAdapter::from_app_config(&config)))
                }
                other => bail!("unsupported data_backend '{other}'"),
            };
        Self::from_parts(config, ports, backend)
    }

    pub fn from_parts(
        config: AppConfig,
        ports: CommentPorts,
        backend: Arc<dyn BackendAdapter>,
    ) -> anyhow::Result<Self> {
        let schema = Arc::new(SchemaCapabilities::new(
            column_support("comments_team_scope", &config.comments_team_scope)?,
            column_support("team_members_email", &config.team_members_email)?,
        ));
        let locale = NotificationLocale::parse(&config.notification_locale).ok_or_else(|| {
            anyhow!(
                "unsupported notification_locale '{}'",
                config.notification_locale
            )
        })?;
        let auth_service = if config.uses_remote_auth() {
            Some(SupabaseAuthService::from_config(&config)?)
        } else {
            None
        };

        tracing::info!(
            backend = backend.name(),
            comments_team_scope = schema.comment_team_scope.current().as_str(),
            team_members_email = schema.member_email.current().as_str(),
            remote_auth = auth_service.is_some(),
            "application state ready"
        );

        Ok(Self {
            comments: CommentService::new(ports, schema, locale),
            backend,
            auth_service,
            config,
        })
    }
}

async fn memory_ports(config: &AppConfig) -> anyhow::Result<CommentPorts> {
    let quotes = InMemoryQuoteRepository::new();
    let team = InMemoryTeamDirectory::new();
    match config.memory_seed_path.trim() {
        "" => tracing::warn!("memory_seed_path not set; every quote is invisible until seeded"),
        path => MemorySeed::load(path)?.apply(&quotes, &team).await,
    }
    Ok(CommentPorts {
        quotes: Arc::new(quotes),
        comments: Arc::new(InMemoryCommentRepository::new()),
        team: Arc::new(team),
        notifications: Arc::new(InMemoryNotificationRepository::new()),
    })
}

fn column_support(key: &str, value: &str) -> anyhow::Result<ColumnSupport> {
    ColumnSupport::parse(value)
        .ok_or_else(|| anyhow!("{key} must be auto, enabled or disabled (got '{value}')"))
}
