//! Owner-scoped data access.

use std::sync::Arc;

use tasklist_core::{SessionProvider, TodoStore};
use tasklist_proto::{
    ItemId, ListId, NewTodoItem, NewTodoList, TodoItem, TodoList, UpdateTodoItem, UpdateTodoList,
    UserId,
};

use crate::error::{ClientError, ClientResult};

/// Typed access to the signed-in user's lists and items.
///
/// Every call resolves the current session first and fails with
/// [`ClientError::Unauthenticated`] when there is none. Nothing is
/// retried; a failure surfaces exactly once.
#[derive(Clone)]
pub struct TodoClient {
    store: Arc<dyn TodoStore>,
    session: Arc<dyn SessionProvider>,
}

impl TodoClient {
    pub fn new(store: Arc<dyn TodoStore>, session: Arc<dyn SessionProvider>) -> Self {
        Self { store, session }
    }

    /// The acting user.
    pub async fn current_user(&self) -> ClientResult<UserId> {
        match self.session.current_session().await? {
            Some(session) => Ok(session.user_id),
            None => Err(ClientError::Unauthenticated),
        }
    }

    /// All of the user's lists, newest first.
    pub async fn get_todo_lists(&self) -> ClientResult<Vec<TodoList>> {
        let owner = self.current_user().await?;
        Ok(self.store.select_lists(owner).await?)
    }

    /// One of the user's lists, or `None` if it does not exist.
    pub async fn get_todo_list(&self, id: ListId) -> ClientResult<Option<TodoList>> {
        let lists = self.get_todo_lists().await?;
        Ok(lists.into_iter().find(|list| list.id == id))
    }

    pub async fn create_todo_list(&self, list: NewTodoList) -> ClientResult<TodoList> {
        let owner = self.current_user().await?;
        let created = self.store.insert_list(owner, list).await?;
        tracing::debug!(list_id = %created.id, "created todo list");
        Ok(created)
    }

    pub async fn update_todo_list(
        &self,
        id: ListId,
        patch: UpdateTodoList,
    ) -> ClientResult<TodoList> {
        let owner = self.current_user().await?;
        Ok(self.store.update_list(owner, id, patch).await?)
    }

    /// Delete a list together with its items.
    pub async fn delete_todo_list(&self, id: ListId) -> ClientResult<()> {
        let owner = self.current_user().await?;
        self.store.delete_list(owner, id).await?;
        tracing::debug!(list_id = %id, "deleted todo list");
        Ok(())
    }

    /// Items of one list, newest first.
    pub async fn get_todo_items(&self, list_id: ListId) -> ClientResult<Vec<TodoItem>> {
        let owner = self.current_user().await?;
        Ok(self.store.select_items(owner, list_id).await?)
    }

    pub async fn create_todo_item(&self, item: NewTodoItem) -> ClientResult<TodoItem> {
        let owner = self.current_user().await?;
        let created = self.store.insert_item(owner, item).await?;
        tracing::debug!(item_id = %created.id, list_id = %created.list_id, "created todo item");
        Ok(created)
    }

    pub async fn update_todo_item(
        &self,
        id: ItemId,
        patch: UpdateTodoItem,
    ) -> ClientResult<TodoItem> {
        let owner = self.current_user().await?;
        Ok(self.store.update_item(owner, id, patch).await?)
    }

    pub async fn delete_todo_item(&self, id: ItemId) -> ClientResult<()> {
        let owner = self.current_user().await?;
        self.store.delete_item(owner, id).await?;
        Ok(())
    }
}
