use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::CatalogueError;

const CODE_LEN: usize = 6;

fn six_digits(field: &str, value: &str) -> Result<String, CatalogueError> {
    if value.len() == CODE_LEN && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(value.to_owned())
    } else {
        Err(CatalogueError::Validation(format!(
            "{field} must be exactly {CODE_LEN} digits, got {value:?}"
        )))
    }
}

/// Six-digit primary key of a book. Leading zeros are significant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn parse(value: &str) -> Result<Self, CatalogueError> {
        six_digits("serial_number", value).map(SerialNumber)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Six-digit library card of the person holding a book.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardNumber(String);

impl CardNumber {
    pub fn parse(value: &str) -> Result<Self, CatalogueError> {
        six_digits("borrower_card", value).map(CardNumber)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    pub card: CardNumber,
    pub borrowed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookStatus {
    Available,
    Borrowed,
}

/// A catalogued book. The borrow fields only exist together, as a [`Loan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub serial_number: SerialNumber,
    pub title: String,
    pub author: String,
    pub loan: Option<Loan>,
}

impl Book {
    /// A freshly catalogued, available book. Title and author are trimmed.
    pub fn new(serial_number: SerialNumber, title: &str, author: &str) -> Self {
        Book {
            serial_number,
            title: title.trim().to_owned(),
            author: author.trim().to_owned(),
            loan: None,
        }
    }

    pub fn status(&self) -> BookStatus {
        match self.loan {
            Some(_) => BookStatus::Borrowed,
            None => BookStatus::Available,
        }
    }

    pub fn is_borrowed(&self) -> bool {
        self.status() == BookStatus::Borrowed
    }

    /// Available -> Borrowed. A borrowed book is rejected before the card is
    /// looked at, and a rejected borrow leaves the book untouched.
    pub fn borrow(
        &mut self,
        card: Option<CardNumber>,
        borrowed_at: DateTime<Utc>,
    ) -> Result<(), CatalogueError> {
        if self.is_borrowed() {
            return Err(CatalogueError::Conflict(format!(
                "book {} is already borrowed",
                self.serial_number
            )));
        }

        let card = card.ok_or_else(|| {
            CatalogueError::Validation(format!(
                "borrower_card ({CODE_LEN} digits) is required to borrow a book"
            ))
        })?;

        self.loan = Some(Loan { card, borrowed_at });
        Ok(())
    }

    /// Borrowed -> Available. Returning an available book is a no-op.
    pub fn give_back(&mut self) {
        self.loan = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn serial(s: &str) -> SerialNumber {
        SerialNumber::parse(s).unwrap()
    }

    fn card(s: &str) -> CardNumber {
        CardNumber::parse(s).unwrap()
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_serial_number_accepts_six_digits() {
        assert_eq!(serial("012345").as_str(), "012345");
        assert_eq!(serial("000000").to_string(), "000000");
    }

    #[test]
    fn test_serial_number_rejects_bad_format() {
        for bad in ["", "12345", "1234567", "12a456", " 12345", "12 345", "١٢٣٤٥٦", "+12345"] {
            let err = SerialNumber::parse(bad).unwrap_err();
            assert!(matches!(err, CatalogueError::Validation(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_card_number_rejects_bad_format() {
        assert!(CardNumber::parse("22222").is_err());
        assert!(CardNumber::parse("22222x").is_err());
        assert_eq!(card("222222").as_str(), "222222");
    }

    #[test]
    fn test_new_book_is_available_and_trimmed() {
        let book = Book::new(serial("012345"), "  Dune ", "\tHerbert\n");
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Herbert");
        assert_eq!(book.status(), BookStatus::Available);
        assert!(book.loan.is_none());
    }

    #[test]
    fn test_blank_title_is_kept_empty() {
        let book = Book::new(serial("012345"), "   ", "");
        assert_eq!(book.title, "");
        assert_eq!(book.author, "");
    }

    #[test]
    fn test_borrow_records_card_and_time() {
        let mut book = Book::new(serial("100001"), "Foo", "Bar");
        book.borrow(Some(card("222222")), noon()).unwrap();

        assert_eq!(book.status(), BookStatus::Borrowed);
        let loan = book.loan.as_ref().unwrap();
        assert_eq!(loan.card, card("222222"));
        assert_eq!(loan.borrowed_at, noon());
    }

    #[test]
    fn test_borrow_without_card_is_rejected() {
        let mut book = Book::new(serial("100001"), "Foo", "Bar");
        let err = book.borrow(None, noon()).unwrap_err();

        assert!(matches!(err, CatalogueError::Validation(_)));
        assert_eq!(book.status(), BookStatus::Available);
    }

    #[test]
    fn test_borrow_twice_conflicts_without_mutation() {
        let mut book = Book::new(serial("100001"), "Foo", "Bar");
        book.borrow(Some(card("222222")), noon()).unwrap();
        let before = book.clone();

        let err = book.borrow(Some(card("333333")), Utc::now()).unwrap_err();
        assert!(matches!(err, CatalogueError::Conflict(_)));
        assert_eq!(book, before);

        // conflict wins over a missing card
        let err = book.borrow(None, Utc::now()).unwrap_err();
        assert!(matches!(err, CatalogueError::Conflict(_)));
    }

    #[test]
    fn test_give_back_cycles_the_state_machine() {
        let mut book = Book::new(serial("100001"), "Foo", "Bar");
        let fresh = book.clone();

        book.give_back();
        assert_eq!(book, fresh);

        book.borrow(Some(card("222222")), noon()).unwrap();
        book.give_back();
        assert_eq!(book, fresh);

        book.borrow(Some(card("333333")), noon()).unwrap();
        assert_eq!(book.loan.as_ref().unwrap().card, card("333333"));
    }
}
