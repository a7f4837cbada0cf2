use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;
use libra_auth::{AuthService, Permissions, RequirePermission};
use libra_core::{Author, Book, ResponseList};
use libra_error::{LibraError, Result};
use serde::Deserialize;
use sqlx::Row;
use uuid::Uuid;

use crate::AppState;

/// 图书/作者资源路由，按 book.* / author.* 权限逐路由设卡
pub fn router(auth: Arc<AuthService>) -> Router<AppState> {
    let gate = |permission: &'static str| RequirePermission::layer(auth.clone(), permission);

    Router::new()
        .route(
            "/books",
            get(list_books)
                .layer(gate(Permissions::BOOK_LIST))
                .merge(post(create_book).layer(gate(Permissions::BOOK_CREATE))),
        )
        .route(
            "/books/:id",
            get(get_book)
                .layer(gate(Permissions::BOOK_SHOW))
                .merge(patch(update_book).layer(gate(Permissions::BOOK_UPDATE)))
                .merge(delete(delete_book).layer(gate(Permissions::BOOK_DELETE))),
        )
        .route(
            "/authors",
            get(list_authors)
                .layer(gate(Permissions::AUTHOR_LIST))
                .merge(post(create_author).layer(gate(Permissions::AUTHOR_CREATE))),
        )
        .route(
            "/authors/:id",
            get(get_author)
                .layer(gate(Permissions::AUTHOR_SHOW))
                .merge(patch(update_author).layer(gate(Permissions::AUTHOR_UPDATE)))
                .merge(delete(delete_author).layer(gate(Permissions::AUTHOR_DELETE))),
        )
}

fn db_err(operation: &str, e: sqlx::Error) -> LibraError {
    tracing::error!(operation = operation, error = %e, "数据库操作失败");
    LibraError::Database {
        message: format!("{}: {}", operation, e),
    }
}

fn book_not_found(id: Uuid) -> LibraError {
    LibraError::NotFound {
        resource: format!("Book [{}]", id),
    }
}

fn author_not_found(id: Uuid) -> LibraError {
    LibraError::NotFound {
        resource: format!("Author [{}]", id),
    }
}

fn map_book(row: &sqlx::postgres::PgRow) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        page: row.get("page"),
        is_available: row.get("is_available"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn map_author(row: &sqlx::postgres::PgRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        deleted_at: row.get("deleted_at"),
    }
}

const BOOK_COLUMNS: &str =
    "id, title, description, page, is_available, author_id, created_at, updated_at, deleted_at";

// === 图书 ===

#[derive(Debug, Deserialize)]
struct BookCreate {
    title: String,
    description: Option<String>,
    page: i32,
    author_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct BookUpdate {
    title: String,
    description: Option<String>,
    page: i32,
    is_available: bool,
    author_id: Option<Uuid>,
}

async fn list_books(State(state): State<AppState>) -> Result<Json<ResponseList<Book>>> {
    let sql = format!(
        "SELECT {} FROM books WHERE deleted_at IS NULL ORDER BY created_at DESC",
        BOOK_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(&state.pool)
        .await
        .map_err(|e| db_err("list_books", e))?;
    Ok(Json(ResponseList::new(rows.iter().map(map_book).collect())))
}

async fn get_book(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Book>> {
    let sql = format!(
        "SELECT {} FROM books WHERE id = $1 AND deleted_at IS NULL",
        BOOK_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| db_err("get_book", e))?
        .ok_or_else(|| book_not_found(id))?;
    Ok(Json(map_book(&row)))
}

async fn create_book(
    State(state): State<AppState>,
    Json(input): Json<BookCreate>,
) -> Result<(StatusCode, Json<Book>)> {
    let sql = format!(
        "INSERT INTO books (id, title, description, page, is_available, author_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, TRUE, $5, $6, $6) RETURNING {}",
        BOOK_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.page)
        .bind(input.author_id)
        .bind(Utc::now())
        .fetch_one(&state.pool)
        .await
        .map_err(|e| db_err("create_book", e))?;
    Ok((StatusCode::CREATED, Json(map_book(&row))))
}

async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<BookUpdate>,
) -> Result<Json<Book>> {
    let sql = format!(
        "UPDATE books SET title = $2, description = $3, page = $4, is_available = $5, \
         author_id = $6, updated_at = $7 WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
        BOOK_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.page)
        .bind(input.is_available)
        .bind(input.author_id)
        .bind(Utc::now())
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| db_err("update_book", e))?
        .ok_or_else(|| book_not_found(id))?;
    Ok(Json(map_book(&row)))
}

async fn delete_book(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let result = sqlx::query(
        "UPDATE books SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(Utc::now())
    .execute(&state.pool)
    .await
    .map_err(|e| db_err("delete_book", e))?;

    if result.rows_affected() == 0 {
        return Err(book_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// === 作者 ===

#[derive(Debug, Deserialize)]
struct AuthorCreate {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorUpdate {
    name: String,
    description: Option<String>,
}

async fn list_authors(State(state): State<AppState>) -> Result<Json<ResponseList<Author>>> {
    let rows = sqlx::query(
        "SELECT id, name, description, deleted_at FROM authors WHERE deleted_at IS NULL ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await
    .map_err(|e| db_err("list_authors", e))?;
    Ok(Json(ResponseList::new(
        rows.iter().map(map_author).collect(),
    )))
}

async fn get_author(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Author>> {
    let row = sqlx::query(
        "SELECT id, name, description, deleted_at FROM authors WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| db_err("get_author", e))?
    .ok_or_else(|| author_not_found(id))?;
    Ok(Json(map_author(&row)))
}

async fn create_author(
    State(state): State<AppState>,
    Json(input): Json<AuthorCreate>,
) -> Result<(StatusCode, Json<Author>)> {
    let row = sqlx::query(
        "INSERT INTO authors (id, name, description) VALUES ($1, $2, $3) \
         RETURNING id, name, description, deleted_at",
    )
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(&input.description)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| db_err("create_author", e))?;
    Ok((StatusCode::CREATED, Json(map_author(&row))))
}

async fn update_author(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<AuthorUpdate>,
) -> Result<Json<Author>> {
    let row = sqlx::query(
        "UPDATE authors SET name = $2, description = $3 WHERE id = $1 AND deleted_at IS NULL \
         RETURNING id, name, description, deleted_at",
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| db_err("update_author", e))?
    .ok_or_else(|| author_not_found(id))?;
    Ok(Json(map_author(&row)))
}

async fn delete_author(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let result = sqlx::query(
        "UPDATE authors SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(Utc::now())
    .execute(&state.pool)
    .await
    .map_err(|e| db_err("delete_author", e))?;

    if result.rows_affected() == 0 {
        return Err(author_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
