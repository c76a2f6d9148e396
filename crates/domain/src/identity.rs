use serde::{Deserialize, Serialize};

/// The authenticated caller. `access_token` is forwarded to the backend for
/// reads that must respect the caller's own row visibility.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallerCredentials {
    pub user_id: String,
    pub access_token: String,
}

impl CallerCredentials {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}
