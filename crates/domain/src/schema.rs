//! Optional-column capabilities of the backing schema.
//!
//! Some deployments lack `quote_comments.team_id` or the `email` column of the
//! team membership view. Each optional column gets a [`ColumnFlag`] that is
//! either pinned by configuration or probed on first use and remembered.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::DomainResult;

pub const COMMENTS_TEAM_ID_COLUMN: &str = "team_id";
pub const MEMBERS_EMAIL_COLUMN: &str = "email";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSupport {
    /// Include the column; on a missing-column error fall back and switch to `Disabled`.
    Auto,
    Enabled,
    Disabled,
}

impl ColumnSupport {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(ColumnSupport::Auto),
            "enabled" | "on" | "true" => Some(ColumnSupport::Enabled),
            "disabled" | "off" | "false" => Some(ColumnSupport::Disabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnSupport::Auto => "auto",
            ColumnSupport::Enabled => "enabled",
            ColumnSupport::Disabled => "disabled",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            ColumnSupport::Auto => 0,
            ColumnSupport::Enabled => 1,
            ColumnSupport::Disabled => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ColumnSupport::Enabled,
            2 => ColumnSupport::Disabled,
            _ => ColumnSupport::Auto,
        }
    }
}

#[derive(Debug)]
pub struct ColumnFlag {
    column: &'static str,
    state: AtomicU8,
}

impl ColumnFlag {
    pub fn new(column: &'static str, support: ColumnSupport) -> Self {
        Self {
            column,
            state: AtomicU8::new(support.to_u8()),
        }
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    pub fn current(&self) -> ColumnSupport {
        ColumnSupport::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `Auto` to `Disabled`. Returns true only for the call that flipped it.
    pub fn mark_missing(&self) -> bool {
        self.state
            .compare_exchange(
                ColumnSupport::Auto.to_u8(),
                ColumnSupport::Disabled.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[derive(Debug)]
pub struct SchemaCapabilities {
    pub comment_team_scope: ColumnFlag,
    pub member_email: ColumnFlag,
}

impl SchemaCapabilities {
    pub fn new(comment_team_scope: ColumnSupport, member_email: ColumnSupport) -> Self {
        Self {
            comment_team_scope: ColumnFlag::new(COMMENTS_TEAM_ID_COLUMN, comment_team_scope),
            member_email: ColumnFlag::new(MEMBERS_EMAIL_COLUMN, member_email),
        }
    }
}

impl Default for SchemaCapabilities {
    fn default() -> Self {
        Self::new(ColumnSupport::Auto, ColumnSupport::Auto)
    }
}

/// Runs `attempt(true)` (column included) and, when the flag allows it,
/// retries once with `attempt(false)` after a missing-column error.
///
/// The flag state is read once up front, so a concurrent flip to `Disabled`
/// never turns an in-flight fallback into a hard error.
pub async fn with_column_fallback<T, F, Fut>(flag: &ColumnFlag, mut attempt: F) -> DomainResult<T>
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    match flag.current() {
        ColumnSupport::Disabled => attempt(false).await,
        ColumnSupport::Enabled => attempt(true).await,
        ColumnSupport::Auto => match attempt(true).await {
            Err(err) if err.is_missing_column(flag.column()) => {
                if flag.mark_missing() {
                    tracing::warn!(
                        column = flag.column(),
                        error = %err,
                        "optional column missing from schema; falling back without it"
                    );
                }
                attempt(false).await
            }
            other => other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use std::sync::Mutex;

    #[tokio::test]
    async fn auto_flag_falls_back_once_and_remembers() {
        let flag = ColumnFlag::new("team_id", ColumnSupport::Auto);
        let calls = Mutex::new(Vec::new());

        let result = with_column_fallback(&flag, |include| {
            calls.lock().expect("calls").push(include);
            async move {
                if include {
                    Err(DomainError::Backend(
                        "column quote_comments.team_id does not exist".into(),
                    ))
                } else {
                    Ok("unscoped")
                }
            }
        })
        .await
        .expect("fallback succeeds");

        assert_eq!(result, "unscoped");
        assert_eq!(*calls.lock().expect("calls"), vec![true, false]);
        assert_eq!(flag.current(), ColumnSupport::Disabled);

        calls.lock().expect("calls").clear();
        with_column_fallback(&flag, |include| {
            calls.lock().expect("calls").push(include);
            async move { Ok::<_, DomainError>(()) }
        })
        .await
        .expect("second call");
        assert_eq!(*calls.lock().expect("calls"), vec![false]);
    }

    #[tokio::test]
    async fn other_errors_surface_without_retry() {
        let flag = ColumnFlag::new("team_id", ColumnSupport::Auto);
        let err = with_column_fallback(&flag, |_| async {
            Err::<(), _>(DomainError::Backend("connection reset".into()))
        })
        .await
        .expect_err("error surfaces");

        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(flag.current(), ColumnSupport::Auto);
    }

    #[tokio::test]
    async fn enabled_flag_never_falls_back() {
        let flag = ColumnFlag::new("email", ColumnSupport::Enabled);
        let err = with_column_fallback(&flag, |_| async {
            Err::<(), _>(DomainError::Backend("column team_members.email does not exist".into()))
        })
        .await
        .expect_err("pinned column errors surface");

        assert!(err.is_missing_column("email"));
        assert_eq!(flag.current(), ColumnSupport::Enabled);
    }

    #[test]
    fn parses_support_values() {
        assert_eq!(ColumnSupport::parse(" Auto "), Some(ColumnSupport::Auto));
        assert_eq!(ColumnSupport::parse("off"), Some(ColumnSupport::Disabled));
        assert_eq!(ColumnSupport::parse("maybe"), None);
    }
}
