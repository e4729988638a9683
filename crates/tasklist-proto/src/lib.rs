//! tasklist data model and change-feed types.
//!
//! This crate defines the types shared by the platform, the client and the
//! HTTP gateway.
//!
//! # Modules
//!
//! - [`id`] - Typed UUID identifiers
//! - [`model`] - Lists, items, statuses and request payloads
//! - [`change`] - Insert/update/delete change events
//! - [`topic`] - Change-feed topics and channel specs
//! - [`error`] - Validation errors

pub mod change;
pub mod error;
pub mod id;
pub mod model;
pub mod topic;

pub use error::Error;

// Re-export commonly used types at crate root
pub use change::{ChangeEvent, ChangeKind, RowChange};
pub use id::{ItemId, ListId, UserId};
pub use model::{
    NewTodoItem, NewTodoList, Record, Table, TodoItem, TodoList, TodoStatus, UpdateTodoItem,
    UpdateTodoList,
};
pub use topic::{ChannelFilter, ChannelSpec, Topic};
