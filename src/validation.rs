//! Input boundary between the wire types in [`crate::api`] and the record
//! manager. Everything the record manager receives has passed through here,
//! including the `borrowed_at` default, so the manager never reads the clock.

use chrono::{DateTime, Utc};

use crate::api::{Action, CreateBookRequest, StatusUpdateRequest};
use crate::error::CatalogueError;
use crate::model::{CardNumber, SerialNumber};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub serial_number: SerialNumber,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCommand {
    /// The card stays optional here: a borrowed book must answer with a
    /// conflict before a missing card is reported.
    Borrow {
        borrower_card: Option<CardNumber>,
        borrowed_at: DateTime<Utc>,
    },
    Return,
}

pub fn validate_serial(raw: &str) -> Result<SerialNumber, CatalogueError> {
    SerialNumber::parse(raw)
}

pub fn validate_create(req: CreateBookRequest) -> Result<NewBook, CatalogueError> {
    Ok(NewBook {
        serial_number: validate_serial(&req.serial_number)?,
        title: req.title,
        author: req.author,
    })
}

/// `now` is the time the request was received; it becomes `borrowed_at`
/// when a borrow does not carry one.
pub fn validate_status_update(
    req: StatusUpdateRequest,
    now: DateTime<Utc>,
) -> Result<StatusCommand, CatalogueError> {
    let borrower_card = req
        .borrower_card
        .as_deref()
        .map(CardNumber::parse)
        .transpose()?;

    match req.action {
        Action::Borrow => Ok(StatusCommand::Borrow {
            borrower_card,
            borrowed_at: req.borrowed_at.unwrap_or(now),
        }),
        // a stray card or timestamp on a return is accepted and dropped
        Action::Return => Ok(StatusCommand::Return),
    }
}
