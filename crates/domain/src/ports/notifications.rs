use crate::DomainResult;
use crate::notifications::Notification;

pub trait NotificationRepository: Send + Sync {
    /// Persists the batch in one write and returns how many rows were stored.
    fn insert_many(
        &self,
        notifications: &[Notification],
    ) -> crate::ports::BoxFuture<'_, DomainResult<usize>>;
}
