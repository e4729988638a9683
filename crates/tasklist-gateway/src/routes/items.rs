//! Item endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::patch,
    Json, Router,
};

use tasklist_proto::{ItemId, TodoItem, UpdateTodoItem};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::AppState;

/// Item routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/items/:id", patch(update_item).delete(delete_item))
}

async fn update_item(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
    Json(patch): Json<UpdateTodoItem>,
) -> Result<Json<TodoItem>, AppError> {
    let item = state.client_for(session).update_todo_item(id, patch).await?;
    Ok(Json(item))
}

async fn delete_item(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<StatusCode, AppError> {
    state.client_for(session).delete_todo_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
