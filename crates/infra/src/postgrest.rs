use std::time::Duration;

use quotedesk_domain::error::DomainError;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::config::AppConfig;

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_MINIMAL: &str = "return=minimal";

/// Whose key a request is signed with.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    /// The caller's own access token; row-level security applies.
    Caller(&'a str),
    Service,
}

#[derive(Debug, thiserror::Error)]
pub enum PostgrestError {
    #[error("backend configuration error: {0}")]
    Configuration(String),
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },
    #[error("backend transport error: {0}")]
    Transport(String),
    #[error("backend response decode error: {0}")]
    InvalidResponse(String),
}

impl PostgrestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            PostgrestError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

impl From<PostgrestError> for DomainError {
    fn from(err: PostgrestError) -> Self {
        if let PostgrestError::Api {
            status,
            code,
            details,
            hint,
            ..
        } = &err
        {
            tracing::debug!(
                status,
                code = code.as_deref().unwrap_or("-"),
                details = details.as_deref().unwrap_or("-"),
                hint = hint.as_deref().unwrap_or("-"),
                "backend request rejected"
            );
        }
        DomainError::Backend(err.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    #[serde(alias = "error_description", alias = "msg")]
    error: Option<String>,
}

#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
    service_key: Option<String>,
    retry_max_attempts: u32,
    retry_backoff_base: Duration,
    retry_backoff_max: Duration,
}

impl PostgrestClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, PostgrestError> {
        let anon_key = config.supabase_anon_key.trim().to_string();
        if anon_key.is_empty() {
            return Err(PostgrestError::Configuration(
                "supabase_anon_key is required for the postgrest backend".to_string(),
            ));
        }
        let service_key = config.supabase_service_role_key.trim().to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|err| PostgrestError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            rest_url: config.rest_url(),
            anon_key,
            service_key: if service_key.is_empty() {
                None
            } else {
                Some(service_key)
            },
            retry_max_attempts: config.read_retry_max_attempts.max(1),
            retry_backoff_base: Duration::from_millis(config.read_retry_backoff_base_ms),
            retry_backoff_max: Duration::from_millis(config.read_retry_backoff_max_ms),
        })
    }

    fn authorize(
        &self,
        request: RequestBuilder,
        credential: Credential<'_>,
    ) -> Result<RequestBuilder, PostgrestError> {
        let (api_key, bearer) = match credential {
            Credential::Caller(token) => (self.anon_key.as_str(), token),
            Credential::Service => {
                let key = self.service_key.as_deref().ok_or_else(|| {
                    PostgrestError::Configuration(
                        "supabase_service_role_key is not configured".to_string(),
                    )
                })?;
                (key, key)
            }
        };
        Ok(request
            .header("apikey", api_key)
            .bearer_auth(bearer)
            .header("accept", "application/json"))
    }

    /// GET `table` with PostgREST filters. Retried on transport errors, 429
    /// and 5xx.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        credential: Credential<'_>,
    ) -> Result<Vec<T>, PostgrestError> {
        let attempts = self.retry_max_attempts.max(1);
        let url = endpoint_url(&self.rest_url, table);

        for attempt in 0..attempts {
            let last_attempt = attempt + 1 >= attempts;
            let request = self.authorize(self.http.get(&url).query(query), credential)?;

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    if !last_attempt {
                        tracing::debug!(table, attempt, error = %err, "backend read failed; retrying");
                        sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Err(PostgrestError::Transport(err.to_string()));
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<Vec<T>>()
                    .await
                    .map_err(|err| PostgrestError::InvalidResponse(err.to_string()));
            }

            let text = response.text().await.unwrap_or_default();
            if is_retryable(status) && !last_attempt {
                tracing::debug!(table, attempt, status = status.as_u16(), "backend read failed; retrying");
                sleep(self.backoff(attempt)).await;
                continue;
            }
            return Err(decode_error(status, &text));
        }

        Err(PostgrestError::Transport(
            "retry loop exited unexpectedly".to_string(),
        ))
    }

    /// POST rows and decode the stored representation. Never retried.
    pub async fn insert<B, T>(
        &self,
        table: &str,
        rows: &B,
        query: &[(&str, String)],
        credential: Credential<'_>,
    ) -> Result<Vec<T>, PostgrestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = endpoint_url(&self.rest_url, table);
        let request = self.http.post(&url).query(query).json(rows);
        let response = self
            .authorize(request, credential)?
            .header("prefer", PREFER_REPRESENTATION)
            .send()
            .await
            .map_err(|err| PostgrestError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(decode_error(status, &text));
        }
        response
            .json::<Vec<T>>()
            .await
            .map_err(|err| PostgrestError::InvalidResponse(err.to_string()))
    }

    /// POST rows without asking for them back.
    pub async fn insert_minimal<B>(
        &self,
        table: &str,
        rows: &B,
        credential: Credential<'_>,
    ) -> Result<(), PostgrestError>
    where
        B: Serialize + ?Sized,
    {
        let url = endpoint_url(&self.rest_url, table);
        let response = self
            .authorize(self.http.post(&url).json(rows), credential)?
            .header("prefer", PREFER_MINIMAL)
            .send()
            .await
            .map_err(|err| PostgrestError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(decode_error(status, &text))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        backoff_for_attempt(self.retry_backoff_base, self.retry_backoff_max, attempt)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn decode_error(status: StatusCode, text: &str) -> PostgrestError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body
        .message
        .or(body.error)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                format!(
                    "status {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown")
                )
            } else {
                text.trim().to_string()
            }
        });
    PostgrestError::Api {
        status: status.as_u16(),
        code: body.code,
        message,
        details: body.details,
        hint: body.hint,
    }
}

pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn backoff_for_attempt(base: Duration, max: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::from_millis(1);
    }
    let multiplier = 1u64 << attempt.min(8);
    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let delay_ms = base_ms.saturating_mul(multiplier).max(1);
    if max_ms == 0 {
        Duration::from_millis(delay_ms)
    } else {
        Duration::from_millis(delay_ms.min(max_ms))
    }
}
