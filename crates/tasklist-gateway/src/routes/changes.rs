//! Change stream endpoint.
//!
//! `GET /ws/changes?topic=lists|items|list&list_id=<id>` upgrades to a
//! WebSocket that receives every change on the topic that belongs to the
//! caller, as JSON text frames:
//!
//! ```json
//! {"table":"todo_items","payload":{"eventType":"INSERT","new":{...}}}
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use tasklist_client::Subscription;
use tasklist_proto::{RowChange, Topic, UserId};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::json::ChangesQuery;
use crate::AppState;

/// Change stream routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws/changes", get(ws_changes))
}

/// Serialize `change` if it belongs to `owner`.
pub(crate) fn encode_for(change: &RowChange, owner: UserId) -> Option<String> {
    if change.owner() != Some(owner) {
        return None;
    }
    match serde_json::to_string(change) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode change");
            None
        }
    }
}

/// WebSocket upgrade handler.
///
/// The listener is registered before the upgrade completes, so no change
/// committed after a successful response is missed.
async fn ws_changes(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, AppError> {
    let topic = Topic::parse(&query.topic, query.list_id)?;
    let ws = ws.ok_or_else(|| AppError::BadRequest("expected a websocket upgrade".to_string()))?;
    let owner = session.user_id;

    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = state.realtime.subscribe(topic, move |change| {
        if let Some(json) = encode_for(change, owner) {
            let _ = tx.send(json);
        }
    })?;

    tracing::debug!(user_id = %owner, topic = %topic, "change stream requested");
    Ok(ws.on_upgrade(move |socket| stream_changes(socket, subscription, rx)))
}

async fn stream_changes(
    socket: WebSocket,
    subscription: Subscription,
    mut changes: mpsc::UnboundedReceiver<String>,
) {
    let topic = subscription.topic();
    let (mut sender, mut receiver) = socket.split();

    let mut forward = tokio::spawn(async move {
        while let Some(json) = changes.recv().await {
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut inbound = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    tracing::debug!(error = %err, "websocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut forward => inbound.abort(),
        _ = &mut inbound => forward.abort(),
    }

    subscription.unsubscribe();
    tracing::debug!(topic = %topic, "change stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tasklist_proto::{ChangeEvent, ListId, TodoList};

    #[test]
    fn test_only_own_changes_are_encoded() {
        let owner = UserId::new();
        let list = TodoList {
            id: ListId::new(),
            created_at: Utc::now(),
            user_id: owner,
            name: "Mine".to_string(),
        };
        let change: RowChange = ChangeEvent::insert(list.clone()).into();

        let json = encode_for(&change, owner).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["table"], "todo_lists");
        assert_eq!(value["payload"]["eventType"], "INSERT");
        assert_eq!(value["payload"]["new"]["name"], "Mine");

        assert!(encode_for(&change, UserId::new()).is_none());
    }
}
