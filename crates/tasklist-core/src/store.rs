//! The store collaborator contract.

use std::sync::Arc;

use async_trait::async_trait;

use tasklist_proto::{
    ItemId, ListId, NewTodoItem, NewTodoList, TodoItem, TodoList, UpdateTodoItem, UpdateTodoList,
    UserId,
};

use crate::error::StoreResult;

/// Row access scoped to an owner.
///
/// Every query shape takes the acting user: selects are filtered by
/// owner, inserts are stamped with it, and updates/deletes match on
/// id and owner together. A row owned by someone else behaves exactly
/// like a missing row.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Lists owned by `owner`, newest first.
    async fn select_lists(&self, owner: UserId) -> StoreResult<Vec<TodoList>>;

    /// Insert a list owned by `owner`.
    async fn insert_list(&self, owner: UserId, list: NewTodoList) -> StoreResult<TodoList>;

    /// Rename a list.
    async fn update_list(
        &self,
        owner: UserId,
        id: ListId,
        patch: UpdateTodoList,
    ) -> StoreResult<TodoList>;

    /// Delete a list and its items. Deleting a missing list is not an error.
    async fn delete_list(&self, owner: UserId, id: ListId) -> StoreResult<()>;

    /// Items of `list_id` owned by `owner`, newest first.
    async fn select_items(&self, owner: UserId, list_id: ListId) -> StoreResult<Vec<TodoItem>>;

    /// Insert an item into one of `owner`'s lists.
    async fn insert_item(&self, owner: UserId, item: NewTodoItem) -> StoreResult<TodoItem>;

    /// Patch an item.
    async fn update_item(
        &self,
        owner: UserId,
        id: ItemId,
        patch: UpdateTodoItem,
    ) -> StoreResult<TodoItem>;

    /// Delete an item. Deleting a missing item is not an error.
    async fn delete_item(&self, owner: UserId, id: ItemId) -> StoreResult<()>;
}

#[async_trait]
impl<S: TodoStore + ?Sized> TodoStore for Arc<S> {
    async fn select_lists(&self, owner: UserId) -> StoreResult<Vec<TodoList>> {
        (**self).select_lists(owner).await
    }

    async fn insert_list(&self, owner: UserId, list: NewTodoList) -> StoreResult<TodoList> {
        (**self).insert_list(owner, list).await
    }

    async fn update_list(
        &self,
        owner: UserId,
        id: ListId,
        patch: UpdateTodoList,
    ) -> StoreResult<TodoList> {
        (**self).update_list(owner, id, patch).await
    }

    async fn delete_list(&self, owner: UserId, id: ListId) -> StoreResult<()> {
        (**self).delete_list(owner, id).await
    }

    async fn select_items(&self, owner: UserId, list_id: ListId) -> StoreResult<Vec<TodoItem>> {
        (**self).select_items(owner, list_id).await
    }

    async fn insert_item(&self, owner: UserId, item: NewTodoItem) -> StoreResult<TodoItem> {
        (**self).insert_item(owner, item).await
    }

    async fn update_item(
        &self,
        owner: UserId,
        id: ItemId,
        patch: UpdateTodoItem,
    ) -> StoreResult<TodoItem> {
        (**self).update_item(owner, id, patch).await
    }

    async fn delete_item(&self, owner: UserId, id: ItemId) -> StoreResult<()> {
        (**self).delete_item(owner, id).await
    }
}
