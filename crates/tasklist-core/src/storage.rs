//! sled-backed row storage.
//!
//! Rows are JSON-encoded and keyed by their 16-byte id. Items are also
//! indexed by list so a list's items can be found without a full scan.
//! Writes touching more than one tree run in a single sled transaction.

use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};

use tasklist_proto::{ItemId, ListId, Record, TodoItem, TodoList};

use crate::config::PlatformConfig;
use crate::error::{StoreError, StoreResult};

/// Tree name for list rows.
const LISTS_TREE: &str = "todo_lists";

/// Tree name for item rows.
const ITEMS_TREE: &str = "todo_items";

/// Tree name for the list -> item index (list_id ++ item_id -> empty).
const LIST_ITEMS_INDEX_TREE: &str = "index:list_items";

/// Row storage for lists and items.
pub struct Storage {
    db: Db,
    lists: Tree,
    items: Tree,
    list_items: Tree,
}

impl Storage {
    /// Open storage with the given configuration.
    pub fn open(config: &PlatformConfig) -> StoreResult<Self> {
        let db = config.to_sled_config().open()?;
        Self::from_db(db)
    }

    /// Wrap an already opened database.
    pub fn from_db(db: Db) -> StoreResult<Self> {
        let lists = db.open_tree(LISTS_TREE)?;
        let items = db.open_tree(ITEMS_TREE)?;
        let list_items = db.open_tree(LIST_ITEMS_INDEX_TREE)?;

        Ok(Self {
            db,
            lists,
            items,
            list_items,
        })
    }

    /// The underlying sled database.
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn get_list(&self, id: ListId) -> StoreResult<Option<TodoList>> {
        get_row(&self.lists, id.as_bytes())
    }

    pub fn put_list(&self, list: &TodoList) -> StoreResult<()> {
        put_row(&self.lists, list.id.as_bytes(), list)
    }

    /// Remove a list together with all of its items and index entries.
    ///
    /// Returns the removed items. Either everything is removed or nothing.
    pub fn remove_list_with_items(&self, id: ListId) -> StoreResult<Vec<TodoItem>> {
        let items = self.items_of_list(id)?;

        let result: TransactionResult<(), StoreError> =
            (&self.lists, &self.items, &self.list_items).transaction(
                |(lists, rows, index)| {
                    for item in &items {
                        rows.remove(item.id.as_bytes().as_slice())?;
                        index.remove(&index_key(item.list_id, item.id)[..])?;
                    }
                    lists.remove(id.as_bytes().as_slice())?;
                    Ok::<_, ConflictableTransactionError<StoreError>>(())
                },
            );
        committed(result)?;
        Ok(items)
    }

    /// All lists, unordered.
    pub fn scan_lists(&self) -> StoreResult<Vec<TodoList>> {
        scan_rows(&self.lists)
    }

    pub fn get_item(&self, id: ItemId) -> StoreResult<Option<TodoItem>> {
        get_row(&self.items, id.as_bytes())
    }

    /// Store an item row and its list index entry atomically.
    pub fn put_item(&self, item: &TodoItem) -> StoreResult<()> {
        let bytes = serde_json::to_vec(item)?;
        let key = index_key(item.list_id, item.id);

        let result: TransactionResult<(), StoreError> =
            (&self.items, &self.list_items).transaction(|(rows, index)| {
                rows.insert(item.id.as_bytes().as_slice(), bytes.as_slice())?;
                index.insert(&key[..], &[] as &[u8])?;
                Ok::<_, ConflictableTransactionError<StoreError>>(())
            });
        committed(result)
    }

    /// Remove an item row and its list index entry atomically.
    pub fn remove_item(&self, item: &TodoItem) -> StoreResult<()> {
        let key = index_key(item.list_id, item.id);

        let result: TransactionResult<(), StoreError> =
            (&self.items, &self.list_items).transaction(|(rows, index)| {
                rows.remove(item.id.as_bytes().as_slice())?;
                index.remove(&key[..])?;
                Ok::<_, ConflictableTransactionError<StoreError>>(())
            });
        committed(result)
    }

    /// Items of one list, unordered.
    pub fn items_of_list(&self, list_id: ListId) -> StoreResult<Vec<TodoItem>> {
        let mut items = Vec::new();
        for entry in self.list_items.scan_prefix(list_id.as_bytes()) {
            let (key, _) = entry?;
            if let Some(item) = get_row::<TodoItem>(&self.items, &key[16..])? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Number of stored rows per table, for diagnostics.
    pub fn row_counts(&self) -> (usize, usize) {
        (self.lists.len(), self.items.len())
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn committed<T>(result: TransactionResult<T, StoreError>) -> StoreResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(StoreError::Storage(err)),
    }
}

fn index_key(list_id: ListId, item_id: ItemId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(list_id.as_bytes());
    key[16..].copy_from_slice(item_id.as_bytes());
    key
}

fn get_row<T: Record>(tree: &Tree, key: &[u8]) -> StoreResult<Option<T>> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn put_row<T: Record>(tree: &Tree, key: &[u8], row: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec(row)?;
    tree.insert(key, bytes)?;
    Ok(())
}

fn scan_rows<T: Record>(tree: &Tree) -> StoreResult<Vec<T>> {
    tree.iter()
        .values()
        .map(|value| -> StoreResult<T> { Ok(serde_json::from_slice(&value?)?) })
        .collect()
}

/// Sort rows newest first, breaking ties by id for a stable order.
pub fn newest_first<T: Record>(rows: &mut [T])
where
    T::Id: Ord,
{
    rows.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
}
