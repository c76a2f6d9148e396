pub mod auth;
pub mod comments;
pub mod error;
pub mod identity;
pub mod mentions;
pub mod notifications;
pub mod ports;
pub mod quotes;
pub mod schema;
pub mod team;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
