//! Error taxonomy for the storage engine.
//!
//! Mirrors simpledb-style exercises: a single concrete error type carrying a
//! discriminant plus a message, rather than one type per failure site.

use std::fmt;

/// Discriminant for every failure kind the engine can raise.
///
/// `PageOutOfRange`, `PageFull`, and `NotOnThisPage` are internal-invariant
/// violations and should never surface past a correctly used `BufferPool`;
/// callers that see them have a bug to fix, not a condition to recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    NoSuchTable,
    NoSuchField,
    PageOutOfRange,
    PageFull,
    SlotEmpty,
    SchemaMismatch,
    NotOnThisPage,
    BufferFull,
    IoError,
    TransactionAborted,
    IllegalState,
    NoSuchElement,
    UnsupportedOperation,
    TableIdCollision,
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbErrorKind::NoSuchTable => "NoSuchTable",
            DbErrorKind::NoSuchField => "NoSuchField",
            DbErrorKind::PageOutOfRange => "PageOutOfRange",
            DbErrorKind::PageFull => "PageFull",
            DbErrorKind::SlotEmpty => "SlotEmpty",
            DbErrorKind::SchemaMismatch => "SchemaMismatch",
            DbErrorKind::NotOnThisPage => "NotOnThisPage",
            DbErrorKind::BufferFull => "BufferFull",
            DbErrorKind::IoError => "IoError",
            DbErrorKind::TransactionAborted => "TransactionAborted",
            DbErrorKind::IllegalState => "IllegalState",
            DbErrorKind::NoSuchElement => "NoSuchElement",
            DbErrorKind::UnsupportedOperation => "UnsupportedOperation",
            DbErrorKind::TableIdCollision => "TableIdCollision",
        };
        write!(f, "{}", name)
    }
}

/// The engine's single error type, used as the `Err` variant everywhere.
#[derive(Debug, Clone)]
pub struct DbError {
    kind: DbErrorKind,
    message: String,
}

impl DbError {
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> DbError {
        DbError {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> DbErrorKind {
        self.kind
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DbError {}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> DbError {
        DbError::new(DbErrorKind::IoError, e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
