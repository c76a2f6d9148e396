use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub port: u16,
    pub log_level: String,
    pub data_backend: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub auth_mode: String,
    pub request_timeout_ms: u64,
    pub read_retry_max_attempts: u32,
    pub read_retry_backoff_base_ms: u64,
    pub read_retry_backoff_max_ms: u64,
    pub notification_locale: String,
    pub comments_team_scope: String,
    pub team_members_email: String,
    pub quotes_table: String,
    pub comments_table: String,
    pub team_members_view: String,
    pub notifications_table: String,
    /// JSON fixture loaded into the in-memory backend at startup; empty skips it.
    pub memory_seed_path: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("supabase_url", "http://127.0.0.1:54321")?
            .set_default("supabase_anon_key", "")?
            .set_default("supabase_service_role_key", "")?
            .set_default("jwt_secret", "dev-secret")?
            .set_default("jwt_audience", "authenticated")?
            .set_default("auth_mode", "jwt")?
            .set_default("request_timeout_ms", 10_000)?
            .set_default("read_retry_max_attempts", 3)?
            .set_default("read_retry_backoff_base_ms", 100)?
            .set_default("read_retry_backoff_max_ms", 1_000)?
            .set_default("notification_locale", "en")?
            .set_default("comments_team_scope", "auto")?
            .set_default("team_members_email", "auto")?
            .set_default("quotes_table", "quotes")?
            .set_default("comments_table", "quote_comments")?
            .set_default("team_members_view", "team_members_view")?
            .set_default("notifications_table", "notifications")?
            .set_default("memory_seed_path", "")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn is_test(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("test")
    }

    pub fn uses_remote_auth(&self) -> bool {
        self.auth_mode.eq_ignore_ascii_case("remote")
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url.trim_end_matches('/'))
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
impl AppConfig {
    pub(crate) fn for_tests(supabase_url: &str) -> Self {
        Self {
            app_env: "test".to_string(),
            port: 0,
            log_level: "info".to_string(),
            data_backend: "postgrest".to_string(),
            supabase_url: supabase_url.to_string(),
            supabase_anon_key: "anon-key".to_string(),
            supabase_service_role_key: "service-key".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_audience: "authenticated".to_string(),
            auth_mode: "jwt".to_string(),
            request_timeout_ms: 2_000,
            read_retry_max_attempts: 3,
            read_retry_backoff_base_ms: 1,
            read_retry_backoff_max_ms: 5,
            notification_locale: "en".to_string(),
            comments_team_scope: "auto".to_string(),
            team_members_email: "auto".to_string(),
            quotes_table: "quotes".to_string(),
            comments_table: "quote_comments".to_string(),
            team_members_view: "team_members_view".to_string(),
            notifications_table: "notifications".to_string(),
            memory_seed_path: String::new(),
        }
    }
}
