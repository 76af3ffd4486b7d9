//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the persistence contracts the timeline services consume.
//! - Keep SQL details out of service/business orchestration.
//!
//! # Invariants
//! - Repositories are built over a `&Connection`; passing a
//!   `rusqlite::Transaction` (which derefs to `Connection`) runs every call
//!   inside that caller-owned transaction.
//! - Status sets are always supplied by the caller from `model::status`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::assignment::ValidationError;
use chrono::NaiveDate;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod assignment_repo;
pub mod directory_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence failure shared by all repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Targeted assignment row does not exist. Only the assignment store
    /// returns this.
    NotFound(Uuid),
    InvalidData(String),
    /// Input that cannot be stored as given.
    Rejected(ValidationError),
}

impl RepoError {
    /// See [`DbError::is_busy`].
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_busy())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "row not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Rejected(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Rejected(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_date(value: &str, column: &'static str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

pub(crate) fn uuid_value(id: Uuid) -> Value {
    Value::Text(id.to_string())
}

pub(crate) fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}
