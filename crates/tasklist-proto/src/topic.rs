//! Change-feed topics and the channel specs they map to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::change::RowChange;
use crate::error::Error;
use crate::id::ListId;
use crate::model::Table;

/// A logical change-feed subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "topic", content = "list_id", rename_all = "kebab-case")]
pub enum Topic {
    /// Every change on the list table.
    AllLists,
    /// Every change on the item table, across all lists.
    AllItems,
    /// Changes on items belonging to one list.
    ItemsForList(ListId),
}

impl Topic {
    /// Name of the upstream channel backing this topic.
    pub fn channel_name(&self) -> String {
        match self {
            Topic::AllLists => "todo_lists_global".to_string(),
            Topic::AllItems => "todo_items_global".to_string(),
            Topic::ItemsForList(list_id) => format!("todo_items_{}", list_id),
        }
    }

    /// Table/filter spec the upstream channel is opened with.
    pub fn channel_spec(&self) -> ChannelSpec {
        match self {
            Topic::AllLists => ChannelSpec::table(Table::TodoLists),
            Topic::AllItems => ChannelSpec::table(Table::TodoItems),
            Topic::ItemsForList(list_id) => ChannelSpec::table(Table::TodoItems)
                .with_filter(ChannelFilter::ListIdEq(*list_id)),
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Topic::AllLists => Table::TodoLists,
            Topic::AllItems | Topic::ItemsForList(_) => Table::TodoItems,
        }
    }

    /// Parse the short names used on the HTTP surface
    /// (`lists`, `items`, `list` with a list id).
    pub fn parse(name: &str, list_id: Option<ListId>) -> Result<Self, Error> {
        match (name, list_id) {
            ("lists" | "all-lists", _) => Ok(Topic::AllLists),
            ("items" | "all-items", _) => Ok(Topic::AllItems),
            ("list" | "items-for-list", Some(list_id)) => Ok(Topic::ItemsForList(list_id)),
            (other, _) => Err(Error::UnknownTopic(other.to_string())),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::AllLists => f.write_str("all-lists"),
            Topic::AllItems => f.write_str("all-items"),
            Topic::ItemsForList(list_id) => write!(f, "items-for-list({})", list_id),
        }
    }
}

/// Row filter applied by the feed before delivering to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelFilter {
    /// `list_id=eq.<id>` on item rows.
    ListIdEq(ListId),
}

impl ChannelFilter {
    pub fn matches(&self, change: &RowChange) -> bool {
        match self {
            ChannelFilter::ListIdEq(list_id) => change
                .as_items()
                .and_then(|event| event.list_id())
                .is_some_and(|id| id == *list_id),
        }
    }
}

impl fmt::Display for ChannelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelFilter::ListIdEq(list_id) => write!(f, "list_id=eq.{}", list_id),
        }
    }
}

/// What an upstream channel listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub table: Table,
    pub filter: Option<ChannelFilter>,
}

impl ChannelSpec {
    /// All changes on `table`.
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: ChannelFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether `change` should be delivered on a channel with this spec.
    pub fn matches(&self, change: &RowChange) -> bool {
        change.table() == self.table
            && self.filter.map_or(true, |filter| filter.matches(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeEvent;
    use crate::id::{ItemId, UserId};
    use crate::model::{TodoItem, TodoList, TodoStatus};
    use chrono::Utc;

    fn item(list_id: ListId) -> TodoItem {
        TodoItem {
            id: ItemId::new(),
            user_id: UserId::new(),
            created_at: Utc::now(),
            status: TodoStatus::Pending,
            name: "Milk".to_string(),
            description: None,
            list_id,
        }
    }

    #[test]
    fn test_channel_names() {
        let list_id = ListId::new();
        assert_eq!(Topic::AllLists.channel_name(), "todo_lists_global");
        assert_eq!(Topic::AllItems.channel_name(), "todo_items_global");
        assert_eq!(
            Topic::ItemsForList(list_id).channel_name(),
            format!("todo_items_{}", list_id)
        );
    }

    #[test]
    fn test_filter_display() {
        let list_id = ListId::new();
        let spec = Topic::ItemsForList(list_id).channel_spec();
        assert_eq!(spec.table, Table::TodoItems);
        assert_eq!(
            spec.filter.unwrap().to_string(),
            format!("list_id=eq.{}", list_id)
        );
    }

    #[test]
    fn test_spec_matching() {
        let list_id = ListId::new();
        let ours: RowChange = ChangeEvent::insert(item(list_id)).into();
        let theirs: RowChange = ChangeEvent::insert(item(ListId::new())).into();
        let list_change: RowChange = ChangeEvent::insert(TodoList {
            id: list_id,
            created_at: Utc::now(),
            user_id: UserId::new(),
            name: "Groceries".to_string(),
        })
        .into();

        let scoped = Topic::ItemsForList(list_id).channel_spec();
        assert!(scoped.matches(&ours));
        assert!(!scoped.matches(&theirs));
        assert!(!scoped.matches(&list_change));

        let all_items = Topic::AllItems.channel_spec();
        assert!(all_items.matches(&ours));
        assert!(all_items.matches(&theirs));
        assert!(!all_items.matches(&list_change));

        assert!(Topic::AllLists.channel_spec().matches(&list_change));
    }

    #[test]
    fn test_id_only_delete_does_not_match_filter() {
        let list_id = ListId::new();
        let change: RowChange = ChangeEvent::<TodoItem>::delete_id(ItemId::new()).into();
        assert!(!Topic::ItemsForList(list_id).channel_spec().matches(&change));
        assert!(Topic::AllItems.channel_spec().matches(&change));
    }

    #[test]
    fn test_parse() {
        let list_id = ListId::new();
        assert_eq!(Topic::parse("lists", None).unwrap(), Topic::AllLists);
        assert_eq!(Topic::parse("items", Some(list_id)).unwrap(), Topic::AllItems);
        assert_eq!(
            Topic::parse("list", Some(list_id)).unwrap(),
            Topic::ItemsForList(list_id)
        );
        assert!(Topic::parse("list", None).is_err());
        assert!(Topic::parse("users", None).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Topic::AllLists.to_string(), "all-lists");
        assert_eq!(Topic::AllItems.to_string(), "all-items");
    }
}
