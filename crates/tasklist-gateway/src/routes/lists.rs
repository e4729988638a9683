//! List endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};

use tasklist_proto::{ListId, NewTodoItem, NewTodoList, TodoItem, TodoList, UpdateTodoList};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::json::CreateItemRequest;
use crate::AppState;

/// List routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lists", get(get_lists).post(create_list))
        .route("/lists/:id", patch(update_list).delete(delete_list))
        .route("/lists/:id/items", get(get_items).post(create_item))
}

async fn get_lists(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TodoList>>, AppError> {
    let lists = state.client_for(session).get_todo_lists().await?;
    Ok(Json(lists))
}

async fn create_list(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Json(list): Json<NewTodoList>,
) -> Result<(StatusCode, Json<TodoList>), AppError> {
    let list = state.client_for(session).create_todo_list(list).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

async fn update_list(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ListId>,
    Json(patch): Json<UpdateTodoList>,
) -> Result<Json<TodoList>, AppError> {
    let list = state.client_for(session).update_todo_list(id, patch).await?;
    Ok(Json(list))
}

async fn delete_list(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ListId>,
) -> Result<StatusCode, AppError> {
    state.client_for(session).delete_todo_list(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_items(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ListId>,
) -> Result<Json<Vec<TodoItem>>, AppError> {
    let items = state.client_for(session).get_todo_items(id).await?;
    Ok(Json(items))
}

async fn create_item(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ListId>,
    Json(request): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<TodoItem>), AppError> {
    let mut item = NewTodoItem::new(id, request.name);
    item.description = request.description;

    let item = state.client_for(session).create_todo_item(item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
