use quotedesk_domain::ports::BoxFuture;
use quotedesk_domain::ports::db::{BackendAdapter, BackendHealthError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::AppConfig;

/// Health of the hosted PostgREST endpoint, probed with a TCP connect.
#[derive(Debug, Clone)]
pub struct PostgrestAdapter {
    endpoint: String,
}

impl PostgrestAdapter {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.supabase_url.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl BackendAdapter for PostgrestAdapter {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    fn health_check(&self) -> BoxFuture<'_, Result<(), BackendHealthError>> {
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            let address = parse_socket_address(&endpoint)?;
            let connect = timeout(Duration::from_secs(2), TcpStream::connect(address))
                .await
                .map_err(|_| {
                    BackendHealthError::Unavailable("backend connect timed out".to_string())
                })?;
            connect.map_err(|err| {
                BackendHealthError::Unavailable(format!("backend connect failed: {err}"))
            })?;

            tracing::debug!(endpoint, "backend health check succeeded");
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAdapter;

impl BackendAdapter for InMemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn health_check(&self) -> BoxFuture<'_, Result<(), BackendHealthError>> {
        Box::pin(async { Ok(()) })
    }
}

fn parse_socket_address(endpoint: &str) -> Result<String, BackendHealthError> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };
    let parsed = Url::parse(&normalized).map_err(|err| {
        BackendHealthError::Misconfigured(format!("invalid backend url '{endpoint}': {err}"))
    })?;

    let host = parsed.host_str().ok_or_else(|| {
        BackendHealthError::Misconfigured(format!("missing host in backend url '{endpoint}'"))
    })?;
    let port = parsed.port_or_known_default().unwrap_or(443);
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_address_uses_scheme_defaults() {
        assert_eq!(
            parse_socket_address("https://abc.supabase.co").expect("address"),
            "abc.supabase.co:443"
        );
        assert_eq!(
            parse_socket_address("http://127.0.0.1:54321").expect("address"),
            "127.0.0.1:54321"
        );
        assert_eq!(
            parse_socket_address("db.internal").expect("address"),
            "db.internal:443"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_reports_unavailable() {
        let adapter = PostgrestAdapter {
            endpoint: "http://127.0.0.1:1".to_string(),
        };
        let err = adapter.health_check().await.expect_err("nothing listens on port 1");
        assert!(matches!(err, BackendHealthError::Unavailable(_)));
    }
}
