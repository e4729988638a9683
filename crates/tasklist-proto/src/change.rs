//! Change events published by the platform's change feed.

use serde::{Deserialize, Serialize};

use crate::id::{ListId, UserId};
use crate::model::{Record, Table, TodoItem, TodoList};

/// Kind of a row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

/// A single insert, update or delete on a table of `T` rows.
///
/// Deletes always carry the id of the removed row; the full previous
/// row is included when the feed has it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "UPPERCASE")]
#[serde(bound = "")]
pub enum ChangeEvent<T: Record> {
    Insert {
        new: T,
    },
    Update {
        new: T,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old: Option<T>,
    },
    Delete {
        old_id: T::Id,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old: Option<T>,
    },
}

impl<T: Record> ChangeEvent<T> {
    /// Insert of `new`.
    pub fn insert(new: T) -> Self {
        ChangeEvent::Insert { new }
    }

    /// Update from `old` to `new`.
    pub fn update(old: Option<T>, new: T) -> Self {
        ChangeEvent::Update { new, old }
    }

    /// Delete of a full row.
    pub fn delete(old: T) -> Self {
        ChangeEvent::Delete {
            old_id: old.id(),
            old: Some(old),
        }
    }

    /// Delete where only the id of the removed row is known.
    pub fn delete_id(old_id: T::Id) -> Self {
        ChangeEvent::Delete { old_id, old: None }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Row state after the change. Absent on delete.
    pub fn new_record(&self) -> Option<&T> {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } => Some(new),
            ChangeEvent::Delete { .. } => None,
        }
    }

    /// Row state before the change. Absent on insert.
    pub fn old_record(&self) -> Option<&T> {
        match self {
            ChangeEvent::Insert { .. } => None,
            ChangeEvent::Update { old, .. } | ChangeEvent::Delete { old, .. } => old.as_ref(),
        }
    }

    /// Id of the affected row.
    pub fn record_id(&self) -> T::Id {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } => new.id(),
            ChangeEvent::Delete { old_id, .. } => *old_id,
        }
    }

    /// Whether this event deletes the row with `id`.
    pub fn is_delete_of(&self, id: T::Id) -> bool {
        matches!(self, ChangeEvent::Delete { old_id, .. } if *old_id == id)
    }

    /// Any known version of the affected row, newest first.
    pub fn any_record(&self) -> Option<&T> {
        self.new_record().or_else(|| self.old_record())
    }

    /// Owner of the affected row, when a row state is present.
    pub fn owner(&self) -> Option<UserId> {
        self.any_record().map(Record::owner)
    }
}

impl ChangeEvent<TodoItem> {
    /// List the affected item belongs to, when a row state is present.
    pub fn list_id(&self) -> Option<ListId> {
        self.any_record().map(|item| item.list_id)
    }
}

/// A change on any platform table, as delivered by a raw feed channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "payload", rename_all = "snake_case")]
pub enum RowChange {
    TodoLists(ChangeEvent<TodoList>),
    TodoItems(ChangeEvent<TodoItem>),
}

impl RowChange {
    pub fn table(&self) -> Table {
        match self {
            RowChange::TodoLists(_) => Table::TodoLists,
            RowChange::TodoItems(_) => Table::TodoItems,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            RowChange::TodoLists(event) => event.kind(),
            RowChange::TodoItems(event) => event.kind(),
        }
    }

    pub fn owner(&self) -> Option<UserId> {
        match self {
            RowChange::TodoLists(event) => event.owner(),
            RowChange::TodoItems(event) => event.owner(),
        }
    }

    pub fn as_lists(&self) -> Option<&ChangeEvent<TodoList>> {
        match self {
            RowChange::TodoLists(event) => Some(event),
            RowChange::TodoItems(_) => None,
        }
    }

    pub fn as_items(&self) -> Option<&ChangeEvent<TodoItem>> {
        match self {
            RowChange::TodoItems(event) => Some(event),
            RowChange::TodoLists(_) => None,
        }
    }
}

impl From<ChangeEvent<TodoList>> for RowChange {
    fn from(event: ChangeEvent<TodoList>) -> Self {
        RowChange::TodoLists(event)
    }
}

impl From<ChangeEvent<TodoItem>> for RowChange {
    fn from(event: ChangeEvent<TodoItem>) -> Self {
        RowChange::TodoItems(event)
    }
}
