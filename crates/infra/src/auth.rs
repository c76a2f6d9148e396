use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::postgrest::endpoint_url;

/// Resolves bearer tokens against the auth server instead of checking the
/// signature locally.
#[derive(Clone)]
pub struct SupabaseAuthService {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
}

#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub role: String,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: String,
    email: Option<String>,
    role: Option<String>,
}

impl SupabaseAuthService {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let anon_key = config.supabase_anon_key.trim().to_string();
        if anon_key.is_empty() {
            return Err(anyhow!("supabase_anon_key is required when auth_mode=remote"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("build auth http client")?;
        Ok(Self {
            http,
            auth_url: config.auth_url(),
            anon_key,
        })
    }

    pub async fn validate(&self, access_token: &str) -> anyhow::Result<AuthIdentity> {
        let response = self
            .http
            .get(endpoint_url(&self.auth_url, "user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("request auth user")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("auth server rejected token with status {}", status.as_u16()));
        }

        let user = response
            .json::<UserRow>()
            .await
            .context("decode auth user")?;
        if user.id.trim().is_empty() {
            return Err(anyhow!("auth server returned a user without id"));
        }
        Ok(AuthIdentity {
            user_id: user.id,
            email: user.email,
            role: user.role.unwrap_or_else(|| "authenticated".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    async fn current_user(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        if header("apikey") != "anon-key" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "No API key found in request" })),
            );
        }
        match header("authorization").as_str() {
            "Bearer full" => (
                StatusCode::OK,
                Json(json!({ "id": "u-1", "email": "ana@acme.test", "role": "service_role" })),
            ),
            "Bearer no-role" => (StatusCode::OK, Json(json!({ "id": "u-2" }))),
            "Bearer blank-id" => (StatusCode::OK, Json(json!({ "id": "  ", "role": "authenticated" }))),
            "Bearer no-id" => (StatusCode::OK, Json(json!({ "email": "ghost@acme.test" }))),
            _ => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "code": 401, "msg": "invalid JWT" })),
            ),
        }
    }

    async fn service() -> SupabaseAuthService {
        let app = Router::new().route("/auth/v1/user", get(current_user));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake auth server");
        });
        SupabaseAuthService::from_config(&AppConfig::for_tests(&format!("http://{addr}")))
            .expect("auth service")
    }

    #[tokio::test]
    async fn resolves_the_user_behind_a_token() {
        let identity = service().await.validate("full").await.expect("identity");
        assert_eq!(identity.user_id, "u-1");
        assert_eq!(identity.email.as_deref(), Some("ana@acme.test"));
        assert_eq!(identity.role, "service_role");
    }

    #[tokio::test]
    async fn missing_role_defaults_to_authenticated() {
        let identity = service().await.validate("no-role").await.expect("identity");
        assert_eq!(identity.user_id, "u-2");
        assert_eq!(identity.email, None);
        assert_eq!(identity.role, "authenticated");
    }

    #[tokio::test]
    async fn rejected_tokens_report_the_status() {
        let err = service()
            .await
            .validate("expired")
            .await
            .expect_err("rejected");
        assert!(err.to_string().contains("401"), "{err}");
    }

    #[tokio::test]
    async fn users_without_an_id_are_rejected() {
        let auth = service().await;
        assert!(auth.validate("blank-id").await.is_err());
        assert!(auth.validate("no-id").await.is_err());
    }

    #[test]
    fn anon_key_is_required() {
        let mut config = AppConfig::for_tests("http://127.0.0.1:1");
        config.supabase_anon_key = "  ".to_string();
        assert!(SupabaseAuthService::from_config(&config).is_err());
    }
}
