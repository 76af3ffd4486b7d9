//! Timeline error taxonomy.
//!
//! # Invariants
//! - `Validation`, `Conflict` and `NotFound` are expected outcomes returned to
//!   callers with enough detail to correct the request.
//! - `Integrity` means the stored timeline is not in the shape the
//!   invariants promise. It is logged with full context and never patched
//!   over by guessing.
//! - Nothing in this crate retries an operation after an error.

use crate::model::assignment::{AssignmentId, ValidationError};
use crate::model::directory::{AddressId, UserId};
use crate::model::status::Channel;
use crate::repo::RepoError;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TimelineResult<T> = Result<T, TimelineError>;

/// Message returned to callers in place of operational failure detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "address timeline is temporarily unavailable";

#[derive(Debug)]
pub enum TimelineError {
    Validation(ValidationError),
    /// Proposed temporary range overlaps an existing temporary row.
    Conflict {
        conflicting_id: AssignmentId,
        conflicting_start: NaiveDate,
        conflicting_end: Option<NaiveDate>,
    },
    NotFound(Missing),
    Integrity(IntegrityViolation),
    Repo(RepoError),
}

impl TimelineError {
    /// Returns whether the error describes the caller's request rather than
    /// an operational failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict { .. } | Self::NotFound(_)
        )
    }

    /// Returns whether the operation gave up waiting for another writer.
    /// Nothing was written; the caller may retry with fresh reads.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::Repo(err) if err.is_busy())
    }

    /// Message safe to hand back to a caller.
    pub fn public_message(&self) -> String {
        if self.is_user_facing() {
            self.to_string()
        } else {
            GENERIC_FAILURE_MESSAGE.to_string()
        }
    }
}

impl Display for TimelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict {
                conflicting_id,
                conflicting_start,
                conflicting_end,
            } => write!(
                f,
                "dates conflict with temporary address {conflicting_id} ({conflicting_start} to {}); temporary addresses must not overlap",
                format_end(*conflicting_end)
            ),
            Self::NotFound(missing) => write!(f, "{missing}"),
            Self::Integrity(violation) => write!(f, "timeline integrity violation: {violation}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TimelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Conflict { .. } | Self::NotFound(_) | Self::Integrity(_) => None,
        }
    }
}

impl From<ValidationError> for TimelineError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TimelineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(Missing::Assignment(id)),
            RepoError::Rejected(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for TimelineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// What a `NotFound` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Assignment(AssignmentId),
    User(UserId),
    Address(AddressId),
    SmartId(String),
    /// No live assignment is in effect for the channel on that date.
    EffectiveAddress {
        user_id: UserId,
        channel: Channel,
        date: NaiveDate,
    },
}

impl Display for Missing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assignment(id) => write!(f, "address assignment not found: {id}"),
            Self::User(id) => write!(f, "user not found: {id}"),
            Self::Address(id) => write!(f, "address not found: {id}"),
            Self::SmartId(smart_id) => write!(f, "unable to find smart id: {smart_id}"),
            Self::EffectiveAddress {
                user_id,
                channel,
                date,
            } => write!(
                f,
                "no {channel} address in effect for user {user_id} on {date}"
            ),
        }
    }
}

/// Stored timeline shapes that the invariants rule out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// More than one open-ended permanent row for one user.
    MultipleOpenPermanent {
        user_id: UserId,
        assignment_ids: Vec<AssignmentId>,
    },
    /// More than one permanent row ends on the day before `successor_id` starts.
    DuplicatePredecessor {
        successor_id: AssignmentId,
        predecessor_ids: Vec<AssignmentId>,
    },
    /// An earlier permanent row exists but none ends the day before the start.
    MissingPredecessor {
        assignment_id: AssignmentId,
        expected_end: NaiveDate,
    },
    /// A corrected start date would put the predecessor's end before its start.
    StartNotAfterPredecessor {
        assignment_id: AssignmentId,
        predecessor_id: AssignmentId,
        predecessor_start: NaiveDate,
        requested_start: NaiveDate,
    },
    /// More than one live row matched a resolution query.
    AmbiguousResolution {
        user_id: UserId,
        channel: Channel,
        date: NaiveDate,
        assignment_ids: Vec<AssignmentId>,
    },
    /// A live assignment references a user or address row that is gone.
    DanglingReference { assignment_id: AssignmentId },
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultipleOpenPermanent {
                user_id,
                assignment_ids,
            } => write!(
                f,
                "user {user_id} has {} open permanent assignments: {}",
                assignment_ids.len(),
                join_ids(assignment_ids)
            ),
            Self::DuplicatePredecessor {
                successor_id,
                predecessor_ids,
            } => write!(
                f,
                "assignment {successor_id} has {} predecessors: {}",
                predecessor_ids.len(),
                join_ids(predecessor_ids)
            ),
            Self::MissingPredecessor {
                assignment_id,
                expected_end,
            } => write!(
                f,
                "assignment {assignment_id} has earlier permanent rows but none ends on {expected_end}"
            ),
            Self::StartNotAfterPredecessor {
                assignment_id,
                predecessor_id,
                predecessor_start,
                requested_start,
            } => write!(
                f,
                "start {requested_start} for assignment {assignment_id} is not after predecessor {predecessor_id} start {predecessor_start}"
            ),
            Self::AmbiguousResolution {
                user_id,
                channel,
                date,
                assignment_ids,
            } => write!(
                f,
                "{} {channel} assignments in effect for user {user_id} on {date}: {}",
                assignment_ids.len(),
                join_ids(assignment_ids)
            ),
            Self::DanglingReference { assignment_id } => write!(
                f,
                "assignment {assignment_id} references a missing user or address"
            ),
        }
    }
}

fn join_ids(ids: &[AssignmentId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn format_end(end: Option<NaiveDate>) -> String {
    end.map_or_else(|| "open".to_string(), |date| date.to_string())
}
