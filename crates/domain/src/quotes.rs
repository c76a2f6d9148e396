use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::CallerCredentials;
use crate::ports::quotes::QuoteRepository;

/// The quote projection the comment flow works against.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteRef {
    pub id: String,
    pub team_id: Option<String>,
    pub number: Option<String>,
}

impl QuoteRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            team_id: None,
            number: None,
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn team_id(&self) -> Option<&str> {
        crate::util::non_empty(self.team_id.as_deref())
    }
}

/// Re-reads the quote with the caller's own credentials. A quote the caller
/// cannot see is indistinguishable from one that does not exist.
pub async fn authorize_quote(
    quotes: &dyn QuoteRepository,
    caller: &CallerCredentials,
    quote_id: &str,
) -> DomainResult<QuoteRef> {
    match quotes.find_visible(caller, quote_id).await {
        Ok(Some(quote)) => Ok(quote),
        Ok(None) | Err(DomainError::Forbidden) | Err(DomainError::NotFound) => {
            tracing::debug!(quote_id, user_id = %caller.user_id, "quote not visible to caller");
            Err(DomainError::Forbidden)
        }
        Err(err) => Err(err),
    }
}
