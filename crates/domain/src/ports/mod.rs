use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod comments;
pub mod db;
pub mod notifications;
pub mod quotes;
pub mod team;
