use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Book;

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub serial_number: String,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Borrow,
    Return,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub action: Action,
    #[serde(default)]
    pub borrower_card: Option<String>,
    /// RFC 3339 with an offset; normalized to UTC.
    #[serde(default)]
    pub borrowed_at: Option<DateTime<Utc>>,
}

/// Wire shape of a book: the loan is flattened into three nullable fields.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BookResponse {
    pub serial_number: String,
    pub title: String,
    pub author: String,
    pub is_borrowed: bool,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub borrower_card: Option<String>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        let is_borrowed = book.is_borrowed();
        let (borrowed_at, borrower_card) = match book.loan {
            Some(loan) => (Some(loan.borrowed_at), Some(loan.card.as_str().to_owned())),
            None => (None, None),
        };

        BookResponse {
            serial_number: book.serial_number.as_str().to_owned(),
            title: book.title,
            author: book.author,
            is_borrowed,
            borrowed_at,
            borrower_card,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        HealthResponse { status: "ok" }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardNumber, SerialNumber};
    use chrono::TimeZone;

    #[test]
    fn test_available_book_serializes_nulls() {
        let book = Book::new(SerialNumber::parse("012345").unwrap(), "Dune", "Herbert");
        let json = serde_json::to_value(BookResponse::from(book)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "serial_number": "012345",
                "title": "Dune",
                "author": "Herbert",
                "is_borrowed": false,
                "borrowed_at": null,
                "borrower_card": null,
            })
        );
    }

    #[test]
    fn test_borrowed_book_serializes_rfc3339() {
        let mut book = Book::new(SerialNumber::parse("100001").unwrap(), "Foo", "Bar");
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        book.borrow(Some(CardNumber::parse("222222").unwrap()), at).unwrap();

        let json = serde_json::to_value(BookResponse::from(book)).unwrap();
        assert_eq!(json["is_borrowed"], true);
        assert_eq!(json["borrower_card"], "222222");
        assert_eq!(json["borrowed_at"], "2024-03-01T12:30:00Z");
    }

    #[test]
    fn test_status_update_deserialize() {
        let req: StatusUpdateRequest = serde_json::from_str(
            r#"{"action": "borrow", "borrower_card": "222222", "borrowed_at": "2024-03-01T14:30:00+02:00"}"#,
        )
        .unwrap();
        assert_eq!(req.action, Action::Borrow);
        assert_eq!(req.borrower_card.as_deref(), Some("222222"));
        assert_eq!(
            req.borrowed_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        );

        let req: StatusUpdateRequest = serde_json::from_str(r#"{"action": "return"}"#).unwrap();
        assert_eq!(req.action, Action::Return);
        assert!(req.borrower_card.is_none());
        assert!(req.borrowed_at.is_none());
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let res = serde_json::from_str::<StatusUpdateRequest>(r#"{"action": "renew"}"#);
        assert!(res.is_err());
        let res = serde_json::from_str::<StatusUpdateRequest>(r#"{"action": "Borrow"}"#);
        assert!(res.is_err());
    }
}
