use crate::DomainResult;
use crate::comments::{Comment, NewComment};

pub trait CommentRepository: Send + Sync {
    /// Inserts the row. `comment.team_id = None` omits the column entirely.
    fn insert(&self, comment: &NewComment) -> crate::ports::BoxFuture<'_, DomainResult<Comment>>;

    /// Comments of one quote, newest first. `team_id = Some` adds a team filter.
    fn list_for_quote(
        &self,
        quote_id: &str,
        team_id: Option<&str>,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<Comment>>>;
}
