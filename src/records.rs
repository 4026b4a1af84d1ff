//! Book Record Manager
//!
//! Owns the state transitions of book records on top of a [`Session`].
//! Every mutation that reads before it writes runs inside one
//! `BEGIN IMMEDIATE` transaction, so the uniqueness check on create and the
//! borrowed check on a status update cannot race another writer.
//!
//! ```rust,ignore
//! let session = db.session().await?;
//! let records = BookRecords::new(&session);
//! let book = records.create(new_book).await?;
//! ```

use anyhow::{Context, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Row};

use crate::db::Session;
use crate::error::CatalogueError;
use crate::model::{Book, CardNumber, Loan, SerialNumber};
use crate::validation::{NewBook, StatusCommand};

const BOOK_COLUMNS: &str = "serial_number, title, author, is_borrowed, borrowed_at, borrower_card";

pub struct BookRecords<'a> {
    conn: &'a Connection,
}

impl<'a> BookRecords<'a> {
    pub fn new(session: &'a Session<'_>) -> Self {
        Self {
            conn: session.connection(),
        }
    }

    pub async fn create(&self, new_book: NewBook) -> Result<Book, CatalogueError> {
        let book = Book::new(new_book.serial_number, &new_book.title, &new_book.author);

        self.begin().await?;
        let result = self.create_internal(&book).await;
        self.finish(result).await
    }

    async fn create_internal(&self, book: &Book) -> Result<Book, CatalogueError> {
        if self.find(&book.serial_number).await?.is_some() {
            return Err(duplicate(&book.serial_number));
        }

        self.insert(book).await?;
        self.refresh(&book.serial_number).await
    }

    /// A primary-key violation is reported as a conflict, with or without
    /// the lookup in `create_internal` before it.
    async fn insert(&self, book: &Book) -> Result<(), CatalogueError> {
        let insert = r#"
            INSERT INTO books (serial_number, title, author, is_borrowed, borrowed_at, borrower_card)
            VALUES (?, ?, ?, 0, NULL, NULL)
        "#;
        let params = libsql::params![
            book.serial_number.as_str(),
            book.title.as_str(),
            book.author.as_str()
        ];

        match self.conn.execute(insert, params).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                Err(duplicate(&book.serial_number))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All books, ascending by serial number.
    pub async fn list(&self) -> Result<Vec<Book>, CatalogueError> {
        let query = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY serial_number");
        let mut rows = self.conn.query(&query, ()).await?;

        let mut books = vec![];
        while let Some(row) = rows.next().await? {
            books.push(row_to_book(&row)?);
        }

        Ok(books)
    }

    pub async fn find(&self, serial_number: &SerialNumber) -> Result<Option<Book>, CatalogueError> {
        let query = format!("SELECT {BOOK_COLUMNS} FROM books WHERE serial_number = ?");
        let mut rows = self
            .conn
            .query(&query, libsql::params![serial_number.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_book(&row)?)),
            None => Ok(None),
        }
    }

    /// A single statement, so it is atomic without an explicit transaction.
    pub async fn delete(&self, serial_number: &SerialNumber) -> Result<(), CatalogueError> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM books WHERE serial_number = ?",
                libsql::params![serial_number.as_str()],
            )
            .await?;

        if deleted == 0 {
            return Err(not_found(serial_number));
        }
        Ok(())
    }

    pub async fn update_status(
        &self,
        serial_number: &SerialNumber,
        command: StatusCommand,
    ) -> Result<Book, CatalogueError> {
        self.begin().await?;
        let result = self.update_status_internal(serial_number, command).await;
        self.finish(result).await
    }

    async fn update_status_internal(
        &self,
        serial_number: &SerialNumber,
        command: StatusCommand,
    ) -> Result<Book, CatalogueError> {
        let mut book = self
            .find(serial_number)
            .await?
            .ok_or_else(|| not_found(serial_number))?;

        match command {
            StatusCommand::Borrow {
                borrower_card,
                borrowed_at,
            } => book.borrow(borrower_card, borrowed_at)?,
            StatusCommand::Return if !book.is_borrowed() => return Ok(book),
            StatusCommand::Return => book.give_back(),
        }

        self.write_loan(&book).await?;
        self.refresh(serial_number).await
    }

    async fn write_loan(&self, book: &Book) -> Result<(), CatalogueError> {
        let (is_borrowed, borrowed_at, borrower_card) = match &book.loan {
            Some(loan) => (
                1i64,
                Some(format_timestamp(&loan.borrowed_at)),
                Some(loan.card.as_str().to_owned()),
            ),
            None => (0i64, None, None),
        };

        let update = r#"
            UPDATE books
            SET is_borrowed = ?, borrowed_at = ?, borrower_card = ?
            WHERE serial_number = ?
        "#;
        self.conn
            .execute(
                update,
                libsql::params![
                    is_borrowed,
                    borrowed_at,
                    borrower_card,
                    book.serial_number.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    /// Re-reads a record written in the current transaction.
    async fn refresh(&self, serial_number: &SerialNumber) -> Result<Book, CatalogueError> {
        self.find(serial_number)
            .await?
            .ok_or_else(|| anyhow!("book {serial_number} missing right after write").into())
    }

    async fn begin(&self) -> Result<(), CatalogueError> {
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        Ok(())
    }

    async fn finish<T>(&self, result: Result<T, CatalogueError>) -> Result<T, CatalogueError> {
        let result = match result {
            Ok(value) => match self.conn.execute("COMMIT", ()).await {
                Ok(_) => return Ok(value),
                Err(e) => Err(CatalogueError::from(e)),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = self.conn.execute("ROLLBACK", ()).await {
            tracing::warn!(error = %e, "failed to roll back transaction");
        }
        result
    }
}

fn duplicate(serial_number: &SerialNumber) -> CatalogueError {
    CatalogueError::Conflict(format!(
        "a book with serial number {serial_number} already exists"
    ))
}

fn not_found(serial_number: &SerialNumber) -> CatalogueError {
    CatalogueError::NotFound(format!("book {serial_number} not found"))
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let at = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid borrowed_at {raw:?} in store"))?;
    Ok(at.with_timezone(&Utc))
}

fn row_to_book(row: &Row) -> Result<Book, CatalogueError> {
    let serial_number: String = row.get(0)?;
    let title: String = row.get(1)?;
    let author: String = row.get(2)?;
    let is_borrowed: i64 = row.get(3)?;
    let borrowed_at: Option<String> = row.get(4)?;
    let borrower_card: Option<String> = row.get(5)?;

    let serial = SerialNumber::parse(&serial_number)
        .map_err(|e| anyhow!("stored serial number is corrupt: {e}"))?;

    let loan = match (is_borrowed != 0, borrower_card, borrowed_at) {
        (false, _, _) => None,
        (true, Some(card), Some(at)) => Some(Loan {
            card: CardNumber::parse(&card)
                .map_err(|e| anyhow!("stored borrower card of {serial} is corrupt: {e}"))?,
            borrowed_at: parse_timestamp(&at)?,
        }),
        (true, _, _) => {
            return Err(anyhow!("book {serial} is marked borrowed without loan details").into());
        }
    };

    Ok(Book {
        serial_number: serial,
        title,
        author,
        loan,
    })
}
