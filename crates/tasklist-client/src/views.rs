//! View controllers for the list overview and a single list.
//!
//! A view loads its data through [`TodoClient`], keeps it in a
//! [`watch`] channel and reloads whenever the multiplexer reports a
//! change on one of its topics. Reloads triggered by changes run as
//! spawned tasks; a reload that completes after a newer one, or after the
//! view was unmounted, is discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use tasklist_proto::{
    ItemId, ListId, NewTodoItem, NewTodoList, TodoItem, TodoList, TodoStatus, UpdateTodoItem,
    UpdateTodoList,
};

use crate::data::TodoClient;
use crate::error::{ClientError, ClientResult};
use crate::realtime::{RealtimeManager, Subscription};

const LOAD_LISTS_FAILED: &str = "Failed to load todo lists. Please try again.";
const CREATE_LIST_FAILED: &str = "Failed to create todo list. Please try again.";
const UPDATE_LIST_FAILED: &str = "Failed to update todo list. Please try again.";
const DELETE_LIST_FAILED: &str = "Failed to delete todo list. Please try again.";
const LOAD_LIST_FAILED: &str = "Failed to load todo list. Please try again.";
const LOAD_ITEMS_FAILED: &str = "Failed to load todo items. Please try again.";
const CREATE_ITEM_FAILED: &str = "Failed to create todo item. Please try again.";
const UPDATE_ITEM_FAILED: &str = "Failed to update todo item. Please try again.";
const DELETE_ITEM_FAILED: &str = "Failed to delete todo item. Please try again.";

/// Application routes a view can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Lists,
    List(ListId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/auth/login".to_string(),
            Route::Lists => "/todo".to_string(),
            Route::List(id) => format!("/todo/{}", id),
        }
    }
}

/// Receives navigation requests from views.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that only records the requested routes.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.routes.lock().last().copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        tracing::debug!(path = %route.path(), "navigate");
        self.routes.lock().push(route);
    }
}

/// Orders reloads of one resource and drops stale or late results.
#[derive(Default)]
struct ReloadGate {
    mounted: AtomicBool,
    issued: AtomicU64,
    applied: Mutex<u64>,
}

impl ReloadGate {
    fn mounted() -> Self {
        Self {
            mounted: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `apply` if `seq` is the newest completed reload and the view is
    /// still mounted.
    fn commit(&self, seq: u64, apply: impl FnOnce()) -> bool {
        if !self.mounted.load(Ordering::SeqCst) {
            return false;
        }
        let mut applied = self.applied.lock();
        if seq <= *applied {
            return false;
        }
        *applied = seq;
        apply();
        true
    }

    fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

/// A list together with the number of items in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSummary {
    pub list: TodoList,
    pub item_count: usize,
}

/// State of the list overview.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListsState {
    pub lists: Vec<ListSummary>,
    pub loading: bool,
    pub error: Option<String>,
}

struct ListsShared {
    client: TodoClient,
    navigator: Arc<dyn Navigator>,
    runtime: Handle,
    state: watch::Sender<ListsState>,
    gate: ReloadGate,
}

impl ListsShared {
    async fn reload(&self) -> ClientResult<()> {
        let seq = self.gate.begin();
        match self.fetch().await {
            Ok(lists) => {
                self.gate.commit(seq, || {
                    self.state.send_modify(|state| {
                        state.lists = lists;
                        state.loading = false;
                        state.error = None;
                    })
                });
                Ok(())
            }
            Err(err) => {
                self.gate.commit(seq, || self.fail(&err, LOAD_LISTS_FAILED));
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> ClientResult<Vec<ListSummary>> {
        let lists = self.client.get_todo_lists().await?;
        let mut summaries = Vec::with_capacity(lists.len());
        for list in lists {
            let item_count = self.client.get_todo_items(list.id).await?.len();
            summaries.push(ListSummary { list, item_count });
        }
        Ok(summaries)
    }

    fn spawn_reload(self: &Arc<Self>) {
        if !self.gate.is_mounted() {
            return;
        }
        let shared = self.clone();
        self.runtime.spawn(async move {
            if let Err(err) = shared.reload().await {
                tracing::debug!(error = %err, "background reload of todo lists failed");
            }
        });
    }

    fn fail(&self, err: &ClientError, message: &str) {
        if err.is_unauthenticated() {
            self.navigator.navigate(Route::Login);
        }
        tracing::warn!(error = %err, "{}", message);
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(message.to_string());
        });
    }

    fn report(&self, err: ClientError, message: &str) -> ClientError {
        if self.gate.is_mounted() {
            self.fail(&err, message);
        }
        err
    }
}

/// Overview of all of the user's lists (`/todo`).
///
/// Reloads on every change to any list or item.
pub struct ListsView {
    shared: Arc<ListsShared>,
    subscriptions: Vec<Subscription>,
}

impl ListsView {
    /// Start listening for changes and load the overview.
    ///
    /// A failed initial load is reported in the state, not returned.
    /// Failing to subscribe is returned.
    pub async fn mount(
        client: TodoClient,
        realtime: &RealtimeManager,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        let (state, _) = watch::channel(ListsState {
            loading: true,
            ..ListsState::default()
        });
        let shared = Arc::new(ListsShared {
            client,
            navigator,
            runtime: Handle::current(),
            state,
            gate: ReloadGate::mounted(),
        });

        // Subscribed before the first load so a change committed while it
        // runs still triggers a reload; the gate drops the older result.
        let on_lists = shared.clone();
        let on_items = shared.clone();
        let subscriptions = vec![
            realtime.subscribe_lists(move |_| on_lists.spawn_reload())?,
            realtime.subscribe_all_items(move |_| on_items.spawn_reload())?,
        ];

        // A failure is already on the state's error banner.
        let _ = shared.reload().await;

        Ok(Self {
            shared,
            subscriptions,
        })
    }

    pub fn state(&self) -> ListsState {
        self.shared.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ListsState> {
        self.shared.state.subscribe()
    }

    /// Reload now and wait for the result.
    pub async fn refresh(&self) -> ClientResult<()> {
        self.shared.reload().await
    }

    pub async fn create_list(&self, name: &str) -> ClientResult<TodoList> {
        let list = self
            .shared
            .client
            .create_todo_list(NewTodoList::new(name))
            .await
            .map_err(|err| self.shared.report(err, CREATE_LIST_FAILED))?;
        self.refresh().await?;
        Ok(list)
    }

    pub async fn rename_list(&self, id: ListId, name: &str) -> ClientResult<TodoList> {
        let list = self
            .shared
            .client
            .update_todo_list(id, UpdateTodoList::new(name))
            .await
            .map_err(|err| self.shared.report(err, UPDATE_LIST_FAILED))?;
        self.refresh().await?;
        Ok(list)
    }

    pub async fn delete_list(&self, id: ListId) -> ClientResult<()> {
        self.shared
            .client
            .delete_todo_list(id)
            .await
            .map_err(|err| self.shared.report(err, DELETE_LIST_FAILED))?;
        self.refresh().await
    }

    /// Stop listening. Reloads still in flight are ignored when they finish.
    pub fn unmount(self) {}
}

impl Drop for ListsView {
    fn drop(&mut self) {
        self.shared.gate.unmount();
        self.subscriptions.clear();
    }
}

/// State of a single list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    pub list: Option<TodoList>,
    pub items: Vec<TodoItem>,
    pub completed: usize,
    pub total: usize,
    pub loading: bool,
    pub error: Option<String>,
}

impl ListState {
    fn set_items(&mut self, items: Vec<TodoItem>) {
        self.completed = items.iter().filter(|i| i.status.is_completed()).count();
        self.total = items.len();
        self.items = items;
    }
}

struct ListShared {
    list_id: ListId,
    client: TodoClient,
    navigator: Arc<dyn Navigator>,
    runtime: Handle,
    state: watch::Sender<ListState>,
    list_gate: ReloadGate,
    items_gate: ReloadGate,
}

impl ListShared {
    async fn reload_list(&self) -> ClientResult<()> {
        let seq = self.list_gate.begin();
        match self.client.get_todo_list(self.list_id).await {
            Ok(Some(list)) => {
                self.list_gate.commit(seq, || {
                    self.state.send_modify(|state| {
                        state.list = Some(list);
                        state.error = None;
                    })
                });
                Ok(())
            }
            Ok(None) => {
                let err = ClientError::NotFound {
                    table: tasklist_proto::Table::TodoLists,
                    id: self.list_id.to_string(),
                };
                self.list_gate.commit(seq, || self.leave());
                Err(err)
            }
            Err(err) => {
                self.list_gate.commit(seq, || self.fail(&err, LOAD_LIST_FAILED));
                Err(err)
            }
        }
    }

    async fn reload_items(&self) -> ClientResult<()> {
        let seq = self.items_gate.begin();
        match self.client.get_todo_items(self.list_id).await {
            Ok(items) => {
                self.items_gate.commit(seq, || {
                    self.state.send_modify(|state| {
                        state.set_items(items);
                        state.loading = false;
                        state.error = None;
                    })
                });
                Ok(())
            }
            Err(err) => {
                self.items_gate.commit(seq, || {
                    if err.is_not_found() {
                        self.leave();
                    } else {
                        self.fail(&err, LOAD_ITEMS_FAILED);
                    }
                });
                Err(err)
            }
        }
    }

    fn spawn_reload_items(self: &Arc<Self>) {
        if !self.items_gate.is_mounted() {
            return;
        }
        let shared = self.clone();
        self.runtime.spawn(async move {
            if let Err(err) = shared.reload_items().await {
                tracing::debug!(
                    list_id = %shared.list_id,
                    error = %err,
                    "background reload of items failed"
                );
            }
        });
    }

    fn spawn_reload_list(self: &Arc<Self>) {
        if !self.list_gate.is_mounted() {
            return;
        }
        let shared = self.clone();
        self.runtime.spawn(async move {
            if let Err(err) = shared.reload_list().await {
                tracing::debug!(
                    list_id = %shared.list_id,
                    error = %err,
                    "background reload of list failed"
                );
            }
        });
    }

    fn on_list_change(self: &Arc<Self>, deleted: bool) {
        if deleted {
            tracing::info!(list_id = %self.list_id, "viewed list was deleted");
            if self.list_gate.is_mounted() {
                self.leave();
            }
        } else {
            self.spawn_reload_list();
        }
    }

    /// The list is gone: clear it and go back to the overview.
    fn leave(&self) {
        self.state.send_modify(|state| {
            state.list = None;
            state.loading = false;
        });
        self.navigator.navigate(Route::Lists);
    }

    fn fail(&self, err: &ClientError, message: &str) {
        if err.is_unauthenticated() {
            self.navigator.navigate(Route::Login);
        }
        tracing::warn!(list_id = %self.list_id, error = %err, "{}", message);
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(message.to_string());
        });
    }

    fn report(&self, err: ClientError, message: &str) -> ClientError {
        if self.items_gate.is_mounted() {
            self.fail(&err, message);
        }
        err
    }
}

/// A single list and its items (`/todo/<id>`).
///
/// Reloads its items on every change to the list's items, and leaves for
/// the overview when the list itself is deleted.
pub struct ListView {
    shared: Arc<ListShared>,
    subscriptions: Vec<Subscription>,
}

impl ListView {
    /// Load the list and start listening for changes.
    ///
    /// If the list does not exist the navigator is sent to the overview
    /// and [`ClientError::NotFound`] is returned.
    pub async fn mount(
        list_id: ListId,
        client: TodoClient,
        realtime: &RealtimeManager,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        let (state, _) = watch::channel(ListState {
            loading: true,
            ..ListState::default()
        });
        let shared = Arc::new(ListShared {
            list_id,
            client,
            navigator,
            runtime: Handle::current(),
            state,
            list_gate: ReloadGate::mounted(),
            items_gate: ReloadGate::mounted(),
        });

        let on_items = shared.clone();
        let on_lists = shared.clone();
        let subscriptions = vec![
            realtime.subscribe_list_items(list_id, move |_| on_items.spawn_reload_items())?,
            realtime.subscribe_lists(move |event| {
                on_lists.on_list_change(event.is_delete_of(list_id));
            })?,
        ];

        if let Err(err) = shared.reload_list().await {
            if err.is_not_found() || err.is_unauthenticated() {
                shared.list_gate.unmount();
                shared.items_gate.unmount();
                drop(subscriptions);
                return Err(err);
            }
        }
        // A failure is already on the state's error banner.
        let _ = shared.reload_items().await;

        Ok(Self {
            shared,
            subscriptions,
        })
    }

    pub fn list_id(&self) -> ListId {
        self.shared.list_id
    }

    pub fn state(&self) -> ListState {
        self.shared.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ListState> {
        self.shared.state.subscribe()
    }

    /// Reload the list and its items and wait for the result.
    pub async fn refresh(&self) -> ClientResult<()> {
        self.shared.reload_list().await?;
        self.shared.reload_items().await
    }

    pub async fn create_item(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> ClientResult<TodoItem> {
        let mut payload = NewTodoItem::new(self.shared.list_id, name);
        if let Some(description) = description {
            payload = payload.with_description(description);
        }

        let item = self
            .shared
            .client
            .create_todo_item(payload)
            .await
            .map_err(|err| self.shared.report(err, CREATE_ITEM_FAILED))?;
        self.shared.reload_items().await?;
        Ok(item)
    }

    pub async fn update_item(&self, id: ItemId, patch: UpdateTodoItem) -> ClientResult<TodoItem> {
        let item = self
            .shared
            .client
            .update_todo_item(id, patch)
            .await
            .map_err(|err| self.shared.report(err, UPDATE_ITEM_FAILED))?;
        self.shared.reload_items().await?;
        Ok(item)
    }

    /// Mark an item completed (`checked`) or pending.
    pub async fn toggle_item(&self, id: ItemId, checked: bool) -> ClientResult<TodoItem> {
        self.update_item(id, UpdateTodoItem::status(TodoStatus::from_checked(checked)))
            .await
    }

    /// Remove an item from the state at once, then delete it.
    ///
    /// If the delete fails the previous items are restored.
    pub async fn delete_item(&self, id: ItemId) -> ClientResult<()> {
        let previous = self.shared.state.borrow().items.clone();
        self.shared.state.send_modify(|state| {
            let remaining = state.items.iter().filter(|i| i.id != id).cloned().collect();
            state.set_items(remaining);
        });

        if let Err(err) = self.shared.client.delete_todo_item(id).await {
            self.shared.state.send_modify(|state| state.set_items(previous));
            return Err(self.shared.report(err, DELETE_ITEM_FAILED));
        }
        Ok(())
    }

    /// Stop listening. Reloads still in flight are ignored when they finish.
    pub fn unmount(self) {}
}

impl Drop for ListView {
    fn drop(&mut self) {
        self.shared.list_gate.unmount();
        self.shared.items_gate.unmount();
        self.subscriptions.clear();
    }
}
