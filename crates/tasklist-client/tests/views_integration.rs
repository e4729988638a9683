//! End-to-end tests of the client against the embedded platform.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use tasklist_client::{
    ClientError, ListView, ListsView, RealtimeManager, RecordingNavigator, Route, TodoClient,
};
use tasklist_core::{LocalPlatform, StoreResult, TodoStore, TokenSession};
use tasklist_proto::{
    ChangeKind, ItemId, ListId, NewTodoItem, NewTodoList, TodoItem, TodoList, TodoStatus,
    UpdateTodoItem, UpdateTodoList, UserId,
};

struct TestContext {
    platform: Arc<LocalPlatform>,
    realtime: RealtimeManager,
    session: Arc<TokenSession>,
    client: TodoClient,
    navigator: Arc<RecordingNavigator>,
}

impl TestContext {
    fn new() -> Self {
        let platform = Arc::new(LocalPlatform::temporary().unwrap());
        let session = Arc::new(platform.session());
        session.sign_up("alice@example.com", "password1").unwrap();

        Self {
            realtime: RealtimeManager::new(platform.clone()),
            client: TodoClient::new(platform.clone(), session.clone()),
            navigator: Arc::new(RecordingNavigator::new()),
            platform,
            session,
        }
    }

    /// A second device signed in as the same user.
    fn other_device(&self) -> TodoClient {
        let session = Arc::new(self.platform.session());
        session
            .sign_in_with_password("alice@example.com", "password1")
            .unwrap();
        TodoClient::new(self.platform.clone(), session)
    }
}

/// Store that commits one write of its own right after the first read of
/// each kind, as if another device wrote while a view was loading.
struct WriteDuringRead {
    platform: Arc<LocalPlatform>,
    list_to_add: Mutex<Option<NewTodoList>>,
    item_to_add: Mutex<Option<NewTodoItem>>,
}

impl WriteDuringRead {
    fn new(platform: Arc<LocalPlatform>) -> Self {
        Self {
            platform,
            list_to_add: Mutex::new(None),
            item_to_add: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TodoStore for WriteDuringRead {
    async fn select_lists(&self, owner: UserId) -> StoreResult<Vec<TodoList>> {
        let lists = self.platform.select_lists(owner).await?;
        let pending = self.list_to_add.lock().take();
        if let Some(list) = pending {
            self.platform.insert_list(owner, list).await?;
        }
        Ok(lists)
    }

    async fn insert_list(&self, owner: UserId, list: NewTodoList) -> StoreResult<TodoList> {
        self.platform.insert_list(owner, list).await
    }

    async fn update_list(
        &self,
        owner: UserId,
        id: ListId,
        patch: UpdateTodoList,
    ) -> StoreResult<TodoList> {
        self.platform.update_list(owner, id, patch).await
    }

    async fn delete_list(&self, owner: UserId, id: ListId) -> StoreResult<()> {
        self.platform.delete_list(owner, id).await
    }

    async fn select_items(&self, owner: UserId, list_id: ListId) -> StoreResult<Vec<TodoItem>> {
        let items = self.platform.select_items(owner, list_id).await?;
        let pending = self.item_to_add.lock().take();
        if let Some(item) = pending {
            self.platform.insert_item(owner, item).await?;
        }
        Ok(items)
    }

    async fn insert_item(&self, owner: UserId, item: NewTodoItem) -> StoreResult<TodoItem> {
        self.platform.insert_item(owner, item).await
    }

    async fn update_item(
        &self,
        owner: UserId,
        id: ItemId,
        patch: UpdateTodoItem,
    ) -> StoreResult<TodoItem> {
        self.platform.update_item(owner, id, patch).await
    }

    async fn delete_item(&self, owner: UserId, id: ItemId) -> StoreResult<()> {
        self.platform.delete_item(owner, id).await
    }
}

async fn wait_until<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

#[tokio::test]
async fn test_groceries_scenario() {
    let ctx = TestContext::new();
    let lists = ListsView::mount(ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();

    let groceries = lists.create_list("Groceries").await.unwrap();
    let state = lists.state();
    assert_eq!(state.lists.len(), 1);
    assert_eq!(state.lists[0].list.name, "Groceries");
    assert_eq!(state.lists[0].item_count, 0);

    let view = ListView::mount(
        groceries.id,
        ctx.client.clone(),
        &ctx.realtime,
        ctx.navigator.clone(),
    )
    .await
    .unwrap();

    let milk = view.create_item("Milk", None).await.unwrap();
    assert_eq!(milk.status, TodoStatus::Pending);
    assert_eq!(view.state().total, 1);
    assert_eq!(view.state().completed, 0);

    let milk = view.toggle_item(milk.id, true).await.unwrap();
    assert_eq!(milk.status, TodoStatus::Completed);
    let state = view.state();
    assert_eq!((state.completed, state.total), (1, 1));

    let mut rx = lists.watch();
    wait_until(&mut rx, |s| s.lists.first().map(|l| l.item_count) == Some(1)).await;

    let milk = view.toggle_item(milk.id, false).await.unwrap();
    assert_eq!(milk.status, TodoStatus::Pending);
    assert_eq!(view.state().completed, 0);
}

#[tokio::test]
async fn test_insert_reaches_every_listener_before_write_returns() {
    let ctx = TestContext::new();
    let list = ctx
        .client
        .create_todo_list(NewTodoList::new("Work"))
        .await
        .unwrap();

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let a = first.clone();
    let b = second.clone();
    let _sub_a = ctx
        .realtime
        .subscribe_all_items(move |event| {
            assert_eq!(event.kind(), ChangeKind::Insert);
            a.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let _sub_b = ctx
        .realtime
        .subscribe_all_items(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    ctx.client
        .create_todo_item(NewTodoItem::new(list.id, "Report"))
        .await
        .unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.platform.feed().channel_count(), 1);
}

#[tokio::test]
async fn test_remote_changes_refresh_overview() {
    let ctx = TestContext::new();
    let lists = ListsView::mount(ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    assert!(lists.state().lists.is_empty());

    let phone = ctx.other_device();
    let list = phone
        .create_todo_list(NewTodoList::new("From phone"))
        .await
        .unwrap();
    phone
        .create_todo_item(NewTodoItem::new(list.id, "Charge"))
        .await
        .unwrap();

    let mut rx = lists.watch();
    wait_until(&mut rx, |s| {
        s.lists.len() == 1 && s.lists[0].list.name == "From phone" && s.lists[0].item_count == 1
    })
    .await;
}

#[tokio::test]
async fn test_deleting_viewed_list_redirects() {
    let ctx = TestContext::new();
    let list = ctx
        .client
        .create_todo_list(NewTodoList::new("Trip"))
        .await
        .unwrap();
    ctx.client
        .create_todo_item(NewTodoItem::new(list.id, "Passport"))
        .await
        .unwrap();

    let view = ListView::mount(list.id, ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    assert_eq!(view.state().total, 1);

    ctx.other_device().delete_todo_list(list.id).await.unwrap();

    assert_eq!(ctx.navigator.last(), Some(Route::Lists));
    assert!(view.state().list.is_none());
}

#[tokio::test]
async fn test_mounting_missing_list_redirects() {
    let ctx = TestContext::new();
    let missing = tasklist_proto::ListId::new();

    let result =
        ListView::mount(missing, ctx.client.clone(), &ctx.realtime, ctx.navigator.clone()).await;
    assert!(matches!(result, Err(ClientError::NotFound { .. })));
    assert_eq!(ctx.navigator.routes(), vec![Route::Lists]);
    assert_eq!(ctx.realtime.channel_count(), 0);
}

#[tokio::test]
async fn test_optimistic_delete_is_reverted_on_failure() {
    let ctx = TestContext::new();
    let list = ctx
        .client
        .create_todo_list(NewTodoList::new("Chores"))
        .await
        .unwrap();
    let view = ListView::mount(list.id, ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    let dishes = view.create_item("Dishes", Some("after dinner")).await.unwrap();

    ctx.platform.set_available(false);
    let err = view.delete_item(dishes.id).await.unwrap_err();
    assert!(matches!(err, ClientError::Request(_)));

    let state = view.state();
    assert_eq!(state.total, 1);
    assert_eq!(state.items[0].id, dishes.id);
    assert_eq!(
        state.error.as_deref(),
        Some("Failed to delete todo item. Please try again.")
    );

    ctx.platform.set_available(true);
    view.delete_item(dishes.id).await.unwrap();
    assert_eq!(view.state().total, 0);
}

#[tokio::test]
async fn test_load_failure_sets_error_banner() {
    let ctx = TestContext::new();
    ctx.platform.set_available(false);

    let lists = ListsView::mount(ctx.client.clone(), &ctx.realtime, ctx.navigator.clone()).await;
    // The feed is unavailable too, so subscribing fails.
    assert!(matches!(lists, Err(ClientError::Realtime(_))));

    ctx.platform.feed().set_available(true);
    let lists = ListsView::mount(ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    assert_eq!(
        lists.state().error.as_deref(),
        Some("Failed to load todo lists. Please try again.")
    );

    ctx.platform.set_available(true);
    lists.refresh().await.unwrap();
    assert!(lists.state().error.is_none());
}

#[tokio::test]
async fn test_signed_out_user_is_sent_to_login() {
    let ctx = TestContext::new();
    ctx.session.sign_out();

    let lists = ListsView::mount(ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    assert_eq!(ctx.navigator.last(), Some(Route::Login));
    assert!(lists.state().error.is_some());
}

#[tokio::test]
async fn test_unmount_releases_channels() {
    let ctx = TestContext::new();
    let list = ctx
        .client
        .create_todo_list(NewTodoList::new("Temp"))
        .await
        .unwrap();

    let lists = ListsView::mount(ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    let view = ListView::mount(list.id, ctx.client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();

    // all-lists is shared by both views.
    assert_eq!(ctx.realtime.channel_count(), 3);
    assert_eq!(
        ctx.realtime
            .listener_count(&tasklist_proto::Topic::AllLists),
        2
    );

    view.unmount();
    assert_eq!(ctx.realtime.channel_count(), 2);
    lists.unmount();
    assert_eq!(ctx.realtime.channel_count(), 0);
    assert_eq!(ctx.platform.feed().channel_count(), 0);
}

#[tokio::test]
async fn test_change_during_initial_load_is_picked_up() {
    let ctx = TestContext::new();
    let store = Arc::new(WriteDuringRead::new(ctx.platform.clone()));
    *store.list_to_add.lock() = Some(NewTodoList::new("From phone"));
    let client = TodoClient::new(store.clone(), ctx.session.clone());

    let lists = ListsView::mount(client.clone(), &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    let mut rx = lists.watch();
    wait_until(&mut rx, |s| {
        s.lists.iter().any(|summary| summary.list.name == "From phone")
    })
    .await;

    let groceries = ctx
        .client
        .create_todo_list(NewTodoList::new("Groceries"))
        .await
        .unwrap();
    *store.item_to_add.lock() = Some(NewTodoItem::new(groceries.id, "Eggs"));

    let view = ListView::mount(groceries.id, client, &ctx.realtime, ctx.navigator.clone())
        .await
        .unwrap();
    let mut rx = view.watch();
    wait_until(&mut rx, |s| s.items.iter().any(|item| item.name == "Eggs")).await;
    assert_eq!(view.state().total, 1);
}
