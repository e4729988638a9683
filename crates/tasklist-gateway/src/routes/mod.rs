//! HTTP route handlers.

pub mod auth;
pub mod changes;
pub mod health;
pub mod items;
pub mod lists;
