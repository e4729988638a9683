//! tasklist client.
//!
//! Owner-scoped data access, a change-feed multiplexer that shares one
//! upstream channel per topic between many listeners, and the view
//! controllers built on both.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tasklist_client::{RealtimeManager, TodoClient};
//! use tasklist_core::LocalPlatform;
//!
//! let platform = Arc::new(LocalPlatform::temporary()?);
//! let session = Arc::new(platform.session());
//! session.sign_up("alice@example.com", "password1")?;
//!
//! let client = TodoClient::new(platform.clone(), session);
//! let realtime = RealtimeManager::new(platform.clone());
//!
//! let _sub = realtime.subscribe_lists(|event| println!("{:?}", event.kind()))?;
//! client.create_todo_list(NewTodoList::new("Groceries")).await?;
//! ```

pub mod data;
pub mod error;
pub mod realtime;
pub mod views;

pub use data::TodoClient;
pub use error::{ClientError, ClientResult};
pub use realtime::{Listener, ListenerId, RealtimeManager, Subscription};
pub use views::{
    ListState, ListSummary, ListView, ListsState, ListsView, Navigator, RecordingNavigator, Route,
};

/// Re-export protocol types.
pub use tasklist_proto as proto;
