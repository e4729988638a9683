//! Todo lists, todo items and their request payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::id::{ItemId, ListId, UserId};

/// A stored table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// The `todo_lists` table.
    TodoLists,
    /// The `todo_items` table.
    TodoItems,
}

impl Table {
    /// Table name as exposed by the platform.
    pub fn name(&self) -> &'static str {
        match self {
            Table::TodoLists => "todo_lists",
            Table::TodoItems => "todo_items",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row type stored in one of the platform tables.
pub trait Record: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier type of the row.
    type Id: Copy
        + Eq
        + std::hash::Hash
        + fmt::Debug
        + fmt::Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Table the row lives in.
    const TABLE: Table;

    /// Row identifier.
    fn id(&self) -> Self::Id;

    /// Owning user.
    fn owner(&self) -> UserId;

    /// Creation timestamp.
    fn created_at(&self) -> DateTime<Utc>;
}

/// A named todo list owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: ListId,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub name: String,
}

impl Record for TodoList {
    type Id = ListId;
    const TABLE: Table = Table::TodoLists;

    fn id(&self) -> ListId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.user_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Progress of a todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    /// Wire value (`pending`, `inProgress`, `completed`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "inProgress",
            TodoStatus::Completed => "completed",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "Pending",
            TodoStatus::InProgress => "In Progress",
            TodoStatus::Completed => "Completed",
        }
    }

    /// Status a completion checkbox maps to.
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            TodoStatus::Completed
        } else {
            TodoStatus::Pending
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TodoStatus::Completed)
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TodoStatus::Pending),
            "inProgress" => Ok(TodoStatus::InProgress),
            "completed" => Ok(TodoStatus::Completed),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// A single entry of a todo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: ItemId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub status: TodoStatus,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub list_id: ListId,
}

impl Record for TodoItem {
    type Id = ItemId;
    const TABLE: Table = Table::TodoItems;

    fn id(&self) -> ItemId {
        self.id
    }

    fn owner(&self) -> UserId {
        self.user_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Trim a name, rejecting names that are empty afterwards.
pub fn normalize_name(field: &'static str, name: &str) -> Result<String, Error> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyName { field });
    }
    Ok(trimmed.to_string())
}

/// Trim a description; blank descriptions collapse to `None`.
pub fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

/// Payload for creating a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodoList {
    pub name: String,
}

impl NewTodoList {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Validate and trim the payload.
    pub fn normalized(self) -> Result<Self, Error> {
        Ok(Self {
            name: normalize_name("list name", &self.name)?,
        })
    }
}

/// Payload for renaming a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTodoList {
    pub name: String,
}

impl UpdateTodoList {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Validate and trim the payload.
    pub fn normalized(self) -> Result<Self, Error> {
        Ok(Self {
            name: normalize_name("list name", &self.name)?,
        })
    }
}

/// Payload for creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodoItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub list_id: ListId,
}

impl NewTodoItem {
    pub fn new(list_id: ListId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            list_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate and trim the payload.
    pub fn normalized(self) -> Result<Self, Error> {
        Ok(Self {
            name: normalize_name("item name", &self.name)?,
            description: normalize_description(self.description.as_deref()),
            list_id: self.list_id,
        })
    }
}

/// Partial update of an item. Absent fields are left untouched.
///
/// A description that is blank after trimming clears the stored
/// description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTodoItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
}

impl UpdateTodoItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that only changes the status.
    pub fn status(status: TodoStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TodoStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Validate the name if present.
    pub fn normalized(self) -> Result<Self, Error> {
        let name = match self.name {
            Some(name) => Some(normalize_name("item name", &name)?),
            None => None,
        };
        Ok(Self {
            name,
            description: self.description.map(|d| d.trim().to_string()),
            status: self.status,
        })
    }

    /// Apply the patch to an item in place.
    pub fn apply_to(&self, item: &mut TodoItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = normalize_description(Some(description));
        }
        if let Some(status) = self.status {
            item.status = status;
        }
    }
}
