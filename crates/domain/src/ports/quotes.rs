use crate::DomainResult;
use crate::identity::CallerCredentials;
use crate::quotes::QuoteRef;

pub trait QuoteRepository: Send + Sync {
    /// Reads the quote as `caller`. `Ok(None)` when it does not exist or the
    /// caller's row visibility hides it.
    fn find_visible(
        &self,
        caller: &CallerCredentials,
        quote_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<QuoteRef>>>;
}
