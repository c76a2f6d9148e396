pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod postgrest;
pub mod repositories;
