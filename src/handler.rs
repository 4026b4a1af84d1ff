use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use tracing::info;

use crate::api::{BookResponse, CreateBookRequest, HealthResponse, StatusUpdateRequest};
use crate::db::Database;
use crate::error::CatalogueError;
use crate::records::BookRecords;
use crate::validation;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

type HandlerResult<T> = Result<T, CatalogueError>;

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(HealthResponse::ok())
}

pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> HandlerResult<(StatusCode, Json<BookResponse>)> {
    let Json(payload) = payload?;
    let new_book = validation::validate_create(payload)?;

    let session = state.db.session().await?;
    let book = BookRecords::new(&session).create(new_book).await?;

    info!(serial_number = %book.serial_number, "book created");
    Ok((StatusCode::CREATED, Json(book.into())))
}

pub async fn list_books(State(state): State<AppState>) -> HandlerResult<Json<Vec<BookResponse>>> {
    let session = state.db.session().await?;
    let books = BookRecords::new(&session).list().await?;

    info!(count = books.len(), "got books");
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

pub async fn delete_book(
    State(state): State<AppState>,
    serial_number: Result<Path<String>, PathRejection>,
) -> HandlerResult<StatusCode> {
    let Path(serial_number) = serial_number?;
    let serial_number = validation::validate_serial(&serial_number)?;

    let session = state.db.session().await?;
    BookRecords::new(&session).delete(&serial_number).await?;

    info!(serial_number = %serial_number, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_status(
    State(state): State<AppState>,
    serial_number: Result<Path<String>, PathRejection>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> HandlerResult<Json<BookResponse>> {
    let received_at = Utc::now();
    let Path(serial_number) = serial_number?;
    let serial_number = validation::validate_serial(&serial_number)?;
    let Json(payload) = payload?;
    let action = payload.action;
    let command = validation::validate_status_update(payload, received_at)?;

    let session = state.db.session().await?;
    let book = BookRecords::new(&session)
        .update_status(&serial_number, command)
        .await?;

    info!(
        serial_number = %serial_number,
        action = ?action,
        is_borrowed = book.is_borrowed(),
        "book status updated"
    );
    Ok(Json(book.into()))
}
