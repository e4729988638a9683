//! Embedded tasklist platform.
//!
//! Provides the collaborators the client talks to: owner-scoped row
//! storage, password accounts with JWT sessions, and an in-process change
//! feed that delivers every committed row change to matching channels.
//!
//! # Modules
//!
//! - [`store`] - The owner-scoped store contract
//! - [`session`] - Session accessor contract and providers
//! - [`feed`] - Change-feed contract and the in-process hub
//! - [`platform`] - [`LocalPlatform`], which implements all of the above
//! - [`storage`] - sled trees for lists and items
//! - [`auth`] - Accounts and token issuing
//! - [`config`] - Platform configuration
//! - [`error`] - Error types

pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod platform;
pub mod session;
pub mod storage;
pub mod store;

pub use auth::{Authenticator, User};
pub use config::PlatformConfig;
pub use error::{AuthError, AuthResult, Error, FeedError, StoreError, StoreResult};
pub use feed::{ChangeFeed, ChannelHandler, ChannelId, ChannelInfo, ChannelStatus, FeedHub, FeedMessage};
pub use platform::{LocalPlatform, SharedPlatform};
pub use session::{FixedSession, Session, SessionProvider, TokenSession};
pub use storage::Storage;
pub use store::TodoStore;
