//! The embedded platform: storage, accounts and change feed in one place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use tasklist_proto::{
    ChangeEvent, ChannelSpec, ItemId, ListId, NewTodoItem, NewTodoList, RowChange, Table,
    TodoItem, TodoList, TodoStatus, UpdateTodoItem, UpdateTodoList, UserId,
};

use crate::auth::Authenticator;
use crate::config::PlatformConfig;
use crate::error::{Error, FeedError, StoreError, StoreResult};
use crate::feed::{ChangeFeed, ChannelHandler, ChannelId, FeedHub};
use crate::session::TokenSession;
use crate::storage::{newest_first, Storage};

/// Storage, accounts and change feed backed by one sled database.
///
/// Every successful write publishes its row changes on the feed before
/// the write returns. Writes are serialized and changes are published
/// while the write lock is held, so feed order equals commit order.
/// Feed handlers therefore must not write through the platform
/// synchronously.
pub struct LocalPlatform {
    storage: Storage,
    feed: FeedHub,
    auth: Arc<Authenticator>,
    available: AtomicBool,
    write_lock: Mutex<()>,
}

/// Shared platform handle.
pub type SharedPlatform = Arc<LocalPlatform>;

impl LocalPlatform {
    /// Open a platform with the given configuration.
    pub fn open(config: PlatformConfig) -> Result<Self, Error> {
        let storage = Storage::open(&config)?;
        let auth = Authenticator::open(storage.db(), &config)?;

        tracing::info!(
            data_path = ?config.data_path,
            persistent = config.data_path.is_some(),
            "platform opened"
        );

        Ok(Self {
            storage,
            feed: FeedHub::new(),
            auth: Arc::new(auth),
            available: AtomicBool::new(true),
            write_lock: Mutex::new(()),
        })
    }

    /// Open a platform backed by a temporary database.
    pub fn temporary() -> Result<Self, Error> {
        Self::open(PlatformConfig::temporary())
    }

    /// The account registry.
    pub fn auth(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    /// A fresh client-side session bound to this platform.
    pub fn session(&self) -> TokenSession {
        TokenSession::new(self.auth.clone())
    }

    /// The change feed.
    pub fn feed(&self) -> &FeedHub {
        &self.feed
    }

    /// The row storage.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Simulate the platform becoming unreachable (or reachable again).
    ///
    /// While unavailable every query fails with [`StoreError::Unavailable`]
    /// and no channel can be opened. Open channels are left alone.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        self.feed.set_available(available);
        tracing::warn!(available, "platform availability changed");
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn publish(&self, change: impl Into<RowChange>) {
        self.feed.publish(&change.into());
    }

    fn owned_list(&self, owner: UserId, id: ListId) -> StoreResult<Option<TodoList>> {
        Ok(self.storage.get_list(id)?.filter(|list| list.user_id == owner))
    }

    fn owned_item(&self, owner: UserId, id: ItemId) -> StoreResult<Option<TodoItem>> {
        Ok(self.storage.get_item(id)?.filter(|item| item.user_id == owner))
    }

    fn lists_of(&self, owner: UserId) -> StoreResult<Vec<TodoList>> {
        self.check_available()?;
        let mut lists: Vec<TodoList> = self
            .storage
            .scan_lists()?
            .into_iter()
            .filter(|list| list.user_id == owner)
            .collect();
        newest_first(&mut lists);
        Ok(lists)
    }

    fn create_list(&self, owner: UserId, payload: NewTodoList) -> StoreResult<TodoList> {
        self.check_available()?;
        let payload = payload.normalized()?;
        let _guard = self.write_lock.lock();

        let list = TodoList {
            id: ListId::new(),
            created_at: Utc::now(),
            user_id: owner,
            name: payload.name,
        };
        self.storage.put_list(&list)?;
        tracing::debug!(list_id = %list.id, user_id = %owner, "list created");

        self.publish(ChangeEvent::insert(list.clone()));
        Ok(list)
    }

    fn rename_list(
        &self,
        owner: UserId,
        id: ListId,
        patch: UpdateTodoList,
    ) -> StoreResult<TodoList> {
        self.check_available()?;
        let patch = patch.normalized()?;
        let _guard = self.write_lock.lock();

        let old = self
            .owned_list(owner, id)?
            .ok_or_else(|| StoreError::not_found(Table::TodoLists, id))?;
        let mut list = old.clone();
        list.name = patch.name;
        self.storage.put_list(&list)?;
        tracing::debug!(list_id = %id, user_id = %owner, "list renamed");

        self.publish(ChangeEvent::update(Some(old), list.clone()));
        Ok(list)
    }

    fn remove_list(&self, owner: UserId, id: ListId) -> StoreResult<()> {
        self.check_available()?;
        let _guard = self.write_lock.lock();

        let Some(list) = self.owned_list(owner, id)? else {
            return Ok(());
        };

        let items = self.storage.remove_list_with_items(id)?;
        tracing::debug!(
            list_id = %id,
            user_id = %owner,
            cascaded_items = items.len(),
            "list deleted"
        );

        for item in items {
            self.publish(ChangeEvent::delete(item));
        }
        self.publish(ChangeEvent::delete(list));
        Ok(())
    }

    fn items_of(&self, owner: UserId, list_id: ListId) -> StoreResult<Vec<TodoItem>> {
        self.check_available()?;
        let mut items: Vec<TodoItem> = self
            .storage
            .items_of_list(list_id)?
            .into_iter()
            .filter(|item| item.user_id == owner)
            .collect();
        newest_first(&mut items);
        Ok(items)
    }

    fn create_item(&self, owner: UserId, payload: NewTodoItem) -> StoreResult<TodoItem> {
        self.check_available()?;
        let payload = payload.normalized()?;
        let _guard = self.write_lock.lock();

        if self.owned_list(owner, payload.list_id)?.is_none() {
            return Err(StoreError::not_found(Table::TodoLists, payload.list_id));
        }

        let item = TodoItem {
            id: ItemId::new(),
            user_id: owner,
            created_at: Utc::now(),
            status: TodoStatus::default(),
            name: payload.name,
            description: payload.description,
            list_id: payload.list_id,
        };
        self.storage.put_item(&item)?;
        tracing::debug!(item_id = %item.id, list_id = %item.list_id, "item created");

        self.publish(ChangeEvent::insert(item.clone()));
        Ok(item)
    }

    fn patch_item(
        &self,
        owner: UserId,
        id: ItemId,
        patch: UpdateTodoItem,
    ) -> StoreResult<TodoItem> {
        self.check_available()?;
        let patch = patch.normalized()?;
        let _guard = self.write_lock.lock();

        let old = self
            .owned_item(owner, id)?
            .ok_or_else(|| StoreError::not_found(Table::TodoItems, id))?;
        let mut item = old.clone();
        patch.apply_to(&mut item);
        self.storage.put_item(&item)?;
        tracing::debug!(item_id = %id, status = %item.status, "item updated");

        self.publish(ChangeEvent::update(Some(old), item.clone()));
        Ok(item)
    }

    fn remove_item(&self, owner: UserId, id: ItemId) -> StoreResult<()> {
        self.check_available()?;
        let _guard = self.write_lock.lock();

        let Some(item) = self.owned_item(owner, id)? else {
            return Ok(());
        };
        self.storage.remove_item(&item)?;
        tracing::debug!(item_id = %id, list_id = %item.list_id, "item deleted");

        self.publish(ChangeEvent::delete(item));
        Ok(())
    }
}

#[async_trait]
impl crate::store::TodoStore for LocalPlatform {
    async fn select_lists(&self, owner: UserId) -> StoreResult<Vec<TodoList>> {
        self.lists_of(owner)
    }

    async fn insert_list(&self, owner: UserId, list: NewTodoList) -> StoreResult<TodoList> {
        self.create_list(owner, list)
    }

    async fn update_list(
        &self,
        owner: UserId,
        id: ListId,
        patch: UpdateTodoList,
    ) -> StoreResult<TodoList> {
        self.rename_list(owner, id, patch)
    }

    async fn delete_list(&self, owner: UserId, id: ListId) -> StoreResult<()> {
        self.remove_list(owner, id)
    }

    async fn select_items(&self, owner: UserId, list_id: ListId) -> StoreResult<Vec<TodoItem>> {
        self.items_of(owner, list_id)
    }

    async fn insert_item(&self, owner: UserId, item: NewTodoItem) -> StoreResult<TodoItem> {
        self.create_item(owner, item)
    }

    async fn update_item(
        &self,
        owner: UserId,
        id: ItemId,
        patch: UpdateTodoItem,
    ) -> StoreResult<TodoItem> {
        self.patch_item(owner, id, patch)
    }

    async fn delete_item(&self, owner: UserId, id: ItemId) -> StoreResult<()> {
        self.remove_item(owner, id)
    }
}

impl ChangeFeed for LocalPlatform {
    fn open_channel(
        &self,
        name: &str,
        spec: ChannelSpec,
        handler: ChannelHandler,
    ) -> Result<ChannelId, FeedError> {
        self.feed.open_channel(name, spec, handler)
    }

    fn remove_channel(&self, id: ChannelId) -> bool {
        self.feed.remove_channel(id)
    }
}
