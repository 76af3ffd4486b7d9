//! Transactional timeline mutations.
//!
//! # Responsibility
//! - Create, correct, delete, expire and purge assignments.
//! - Keep the permanent chain contiguous while doing so.
//!
//! # Invariants
//! - Every operation runs in one `BEGIN IMMEDIATE` transaction. The write
//!   lock is taken before the first read, so two writers for the same user
//!   serialize and the second one sees the first one's committed rows.
//! - Any error drops the transaction uncommitted, which rolls back every
//!   row change made so far.
//! - Create closes the current open permanent row before inserting the new
//!   one; delete marks the row deleted before reopening its predecessor.
//!   Both orders keep `ux_address_assignments_open_permanent` satisfied at
//!   every statement.
//!
//! # See also
//! - `service::overlap` for temporary-range conflicts.
//! - `error` for which failures are user facing.

use crate::error::{IntegrityViolation, Missing, TimelineError, TimelineResult};
use crate::model::assignment::{
    day_before, ensure_supported, validate_dates, AddressAssignment, AssignmentDetail,
    AssignmentId, NewAssignment, ValidatedAssignment, ValidationError,
};
use crate::model::directory::UserId;
use crate::model::status::AssignmentStatus;
use crate::repo::assignment_repo::{AssignmentStore, SqliteAssignmentStore};
use crate::repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
use crate::service::overlap::OverlapValidator;
use chrono::NaiveDate;
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    pub assignment: AssignmentDetail,
    /// Previous open permanent row, now ending the day before the new start.
    pub closed_predecessor: Option<AddressAssignment>,
}

/// Result of a successful date correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionOutcome {
    pub assignment: AddressAssignment,
    /// Predecessor whose end date moved with the corrected start.
    pub repaired_predecessor: Option<AddressAssignment>,
}

/// Result of a successful soft delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub deleted: AddressAssignment,
    /// Predecessor whose end date now covers the deleted row's range.
    pub repaired_predecessor: Option<AddressAssignment>,
}

/// Writes assignment rows over one SQLite connection.
pub struct AssignmentWriter<'conn> {
    conn: &'conn Connection,
}

impl<'conn> AssignmentWriter<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates one assignment.
    ///
    /// Permanent-class rows become the user's current permanent address and
    /// close the previous one on the day before `start_date`. Temporary-class
    /// rows must not overlap another live temporary row.
    ///
    /// # Errors
    /// - `Validation` for malformed input or a permanent start that is not
    ///   after the current permanent start.
    /// - `NotFound` when the user or address does not exist.
    /// - `Conflict` for overlapping temporary ranges.
    /// - `Integrity` when the user already has several open permanent rows.
    pub fn create(&self, request: &NewAssignment) -> TimelineResult<CreateOutcome> {
        let started_at = Instant::now();
        let result = request
            .validate()
            .map_err(TimelineError::from)
            .and_then(|validated| {
                let tx = self.begin()?;
                let outcome = {
                    let store = SqliteAssignmentStore::new(&tx);
                    let directory = SqliteDirectoryRepository::new(&tx);
                    create_in(&store, &directory, validated)?
                };
                tx.commit()?;
                Ok(outcome)
            });

        match &result {
            Ok(outcome) => info!(
                "event=assignment_create module=timeline status=ok user_id={} assignment_id={} assignment_status={} closed_predecessor={} duration_ms={}",
                outcome.assignment.assignment.user_id,
                outcome.assignment.assignment.id,
                outcome.assignment.assignment.status,
                outcome
                    .closed_predecessor
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |row| row.id.to_string()),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("assignment_create", Some(request.user_id), None, err),
        }
        result
    }

    /// Changes the dates of one live assignment.
    ///
    /// Temporary rows are re-checked for overlaps. For permanent rows only
    /// the start date may change; the predecessor's end date follows it.
    ///
    /// # Errors
    /// - `NotFound` when the row does not exist or is terminal.
    /// - `Validation` for malformed dates or a changed permanent end date.
    /// - `Conflict` for overlapping temporary ranges.
    /// - `Integrity` when the predecessor chain is broken, or the new start
    ///   would not leave the predecessor a valid range.
    pub fn correct_dates(
        &self,
        assignment_id: AssignmentId,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> TimelineResult<CorrectionOutcome> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|tx| {
            let outcome = {
                let store = SqliteAssignmentStore::new(&tx);
                correct_dates_in(&store, assignment_id, start_date, end_date)?
            };
            tx.commit()?;
            Ok(outcome)
        });

        match &result {
            Ok(outcome) => info!(
                "event=assignment_correct module=timeline status=ok user_id={} assignment_id={} start_date={} end_date={} repaired_predecessor={} duration_ms={}",
                outcome.assignment.user_id,
                assignment_id,
                outcome.assignment.start_date,
                format_end(outcome.assignment.end_date),
                outcome
                    .repaired_predecessor
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |row| row.id.to_string()),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("assignment_correct", None, Some(assignment_id), err),
        }
        result
    }

    /// Soft-deletes one live assignment.
    ///
    /// Deleting a permanent row hands its range to the predecessor, so an
    /// open-ended row's predecessor becomes open-ended again.
    ///
    /// # Errors
    /// - `NotFound` when the row does not exist or is already terminal.
    /// - `Integrity` when the predecessor chain is broken.
    pub fn delete(&self, assignment_id: AssignmentId) -> TimelineResult<DeletionOutcome> {
        let started_at = Instant::now();
        let result = self.begin().and_then(|tx| {
            let outcome = {
                let store = SqliteAssignmentStore::new(&tx);
                delete_in(&store, assignment_id)?
            };
            tx.commit()?;
            Ok(outcome)
        });

        match &result {
            Ok(outcome) => info!(
                "event=assignment_delete module=timeline status=ok user_id={} assignment_id={} repaired_predecessor={} duration_ms={}",
                outcome.deleted.user_id,
                assignment_id,
                outcome
                    .repaired_predecessor
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |row| row.id.to_string()),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("assignment_delete", None, Some(assignment_id), err),
        }
        result
    }

    /// Marks bounded permanent rows that ended before `as_of` as expired and
    /// returns their ids in timeline order.
    ///
    /// # Errors
    /// - `Validation(DateOutOfRange)` for an `as_of` outside `0001..=9999`.
    pub fn expire_elapsed_permanent(
        &self,
        user_id: UserId,
        as_of: NaiveDate,
    ) -> TimelineResult<Vec<AssignmentId>> {
        let result = ensure_supported(as_of)
            .map_err(TimelineError::from)
            .and_then(|()| self.begin())
            .and_then(|tx| {
                let expired = {
                    let store = SqliteAssignmentStore::new(&tx);
                    let elapsed = store.find_ended_before(
                        user_id,
                        &AssignmentStatus::permanent_class(),
                        as_of,
                    )?;
                    let mut expired = Vec::with_capacity(elapsed.len());
                    for row in elapsed {
                        store.update_status(row.id, AssignmentStatus::Expired)?;
                        expired.push(row.id);
                    }
                    expired
                };
                tx.commit()?;
                Ok(expired)
            });

        match &result {
            Ok(expired) => info!(
                "event=assignment_expire module=timeline status=ok user_id={} as_of={} expired_count={}",
                user_id,
                as_of,
                expired.len()
            ),
            Err(err) => log_failure("assignment_expire", Some(user_id), None, err),
        }
        result
    }

    /// Physically removes a row that was already soft-deleted.
    ///
    /// # Errors
    /// - `NotFound` when the row does not exist.
    /// - `Validation` when the row is not in `deleted` status.
    pub fn purge(&self, assignment_id: AssignmentId) -> TimelineResult<()> {
        let result = self.begin().and_then(|tx| {
            {
                let store = SqliteAssignmentStore::new(&tx);
                let row = store
                    .get(assignment_id, true)?
                    .ok_or(TimelineError::NotFound(Missing::Assignment(assignment_id)))?;
                if row.status != AssignmentStatus::Deleted {
                    return Err(ValidationError::PurgeRequiresDeleted {
                        assignment_id,
                        status: row.status,
                    }
                    .into());
                }
                store.purge(assignment_id)?;
            }
            tx.commit()?;
            Ok(())
        });

        match &result {
            Ok(()) => info!(
                "event=assignment_purge module=timeline status=ok assignment_id={}",
                assignment_id
            ),
            Err(err) => log_failure("assignment_purge", None, Some(assignment_id), err),
        }
        result
    }

    fn begin(&self) -> TimelineResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

fn create_in<S, D>(
    store: &S,
    directory: &D,
    validated: ValidatedAssignment,
) -> TimelineResult<CreateOutcome>
where
    S: AssignmentStore + ?Sized,
    D: DirectoryRepository + ?Sized,
{
    let user = directory
        .get_user(validated.user_id)?
        .ok_or(TimelineError::NotFound(Missing::User(validated.user_id)))?;
    let address = directory
        .get_address(validated.address_id)?
        .ok_or(TimelineError::NotFound(Missing::Address(validated.address_id)))?;

    let mut closed_predecessor = None;
    if validated.status.is_temporary_class() {
        OverlapValidator::new(store).check_conflict(
            validated.user_id,
            validated.status,
            validated.start_date,
            validated.end_date,
            None,
        )?;
    } else {
        let open = store.find_by_end_date(
            validated.user_id,
            &AssignmentStatus::permanent_class(),
            None,
            None,
        )?;
        match open.as_slice() {
            [] => {}
            [current] => {
                if validated.start_date <= current.start_date {
                    return Err(ValidationError::StartNotAfterCurrent {
                        current_id: current.id,
                        current_start: current.start_date,
                        requested_start: validated.start_date,
                    }
                    .into());
                }
                store.update_end_date(current.id, Some(day_before(validated.start_date)?))?;
                closed_predecessor = store.get(current.id, true)?;
            }
            rows => {
                return Err(TimelineError::Integrity(
                    IntegrityViolation::MultipleOpenPermanent {
                        user_id: validated.user_id,
                        assignment_ids: ids_of(rows),
                    },
                ));
            }
        }
    }

    let assignment = store.insert(&validated)?;
    Ok(CreateOutcome {
        assignment: AssignmentDetail {
            assignment,
            address,
            user,
        },
        closed_predecessor,
    })
}

fn correct_dates_in<S>(
    store: &S,
    assignment_id: AssignmentId,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> TimelineResult<CorrectionOutcome>
where
    S: AssignmentStore + ?Sized,
{
    let current = store
        .get(assignment_id, false)?
        .ok_or(TimelineError::NotFound(Missing::Assignment(assignment_id)))?;

    let mut repaired_predecessor = None;
    if current.status.is_temporary_class() {
        OverlapValidator::new(store).check_conflict(
            current.user_id,
            current.status,
            start_date,
            end_date,
            Some(assignment_id),
        )?;
    } else {
        if end_date != current.end_date {
            return Err(ValidationError::PermanentEndDateManaged.into());
        }
        validate_dates(current.status, start_date, end_date)?;
        if start_date != current.start_date {
            repaired_predecessor = move_predecessor_end(store, &current, start_date)?;
        }
    }

    store.update_dates(assignment_id, start_date, end_date)?;
    let assignment = store
        .get(assignment_id, true)?
        .ok_or(TimelineError::NotFound(Missing::Assignment(assignment_id)))?;
    Ok(CorrectionOutcome {
        assignment,
        repaired_predecessor,
    })
}

/// Moves the predecessor of `current` so it ends the day before `new_start`.
fn move_predecessor_end<S>(
    store: &S,
    current: &AddressAssignment,
    new_start: NaiveDate,
) -> TimelineResult<Option<AddressAssignment>>
where
    S: AssignmentStore + ?Sized,
{
    let Some(predecessor) = find_predecessor(store, current)? else {
        return Ok(None);
    };

    if new_start <= predecessor.start_date {
        return Err(TimelineError::Integrity(
            IntegrityViolation::StartNotAfterPredecessor {
                assignment_id: current.id,
                predecessor_id: predecessor.id,
                predecessor_start: predecessor.start_date,
                requested_start: new_start,
            },
        ));
    }

    store.update_end_date(predecessor.id, Some(day_before(new_start)?))?;
    Ok(store.get(predecessor.id, true)?)
}

fn delete_in<S>(store: &S, assignment_id: AssignmentId) -> TimelineResult<DeletionOutcome>
where
    S: AssignmentStore + ?Sized,
{
    let current = store
        .get(assignment_id, false)?
        .ok_or(TimelineError::NotFound(Missing::Assignment(assignment_id)))?;

    let predecessor = if current.status.is_permanent_class() {
        find_predecessor(store, &current)?
    } else {
        None
    };

    store.update_status(assignment_id, AssignmentStatus::Deleted)?;

    let mut repaired_predecessor = None;
    if let Some(predecessor) = predecessor {
        store.update_end_date(predecessor.id, current.end_date)?;
        repaired_predecessor = store.get(predecessor.id, true)?;
    }

    let deleted = store
        .get(assignment_id, true)?
        .ok_or(TimelineError::NotFound(Missing::Assignment(assignment_id)))?;
    Ok(DeletionOutcome {
        deleted,
        repaired_predecessor,
    })
}

/// Finds the live permanent row ending the day before `current` starts.
///
/// `None` is only returned when `current` is the earliest live permanent
/// row of its user.
fn find_predecessor<S>(
    store: &S,
    current: &AddressAssignment,
) -> TimelineResult<Option<AddressAssignment>>
where
    S: AssignmentStore + ?Sized,
{
    let permanent = AssignmentStatus::permanent_class();
    let has_earlier = store.exists_starting_before(
        current.user_id,
        &permanent,
        current.start_date,
        Some(current.id),
    )?;
    // The first representable day has no day before it.
    let Ok(expected_end) = day_before(current.start_date) else {
        return Ok(None);
    };

    let mut candidates = store.find_by_end_date(
        current.user_id,
        &permanent,
        Some(expected_end),
        Some(current.id),
    )?;
    match candidates.len() {
        0 if has_earlier => Err(TimelineError::Integrity(
            IntegrityViolation::MissingPredecessor {
                assignment_id: current.id,
                expected_end,
            },
        )),
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => Err(TimelineError::Integrity(
            IntegrityViolation::DuplicatePredecessor {
                successor_id: current.id,
                predecessor_ids: ids_of(&candidates),
            },
        )),
    }
}

fn ids_of(rows: &[AddressAssignment]) -> Vec<AssignmentId> {
    rows.iter().map(|row| row.id).collect()
}

fn format_end(end: Option<NaiveDate>) -> String {
    end.map_or_else(|| "open".to_string(), |date| date.to_string())
}

/// Caller mistakes log at info and lock timeouts at warn. Anything else is
/// logged at error with full detail.
fn log_failure(
    event: &str,
    user_id: Option<UserId>,
    assignment_id: Option<AssignmentId>,
    err: &TimelineError,
) {
    let user = user_id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let assignment = assignment_id.map_or_else(|| "-".to_string(), |id| id.to_string());
    if err.is_user_facing() {
        info!(
            "event={event} module=timeline status=rejected user_id={user} assignment_id={assignment} reason=\"{err}\""
        );
    } else if err.is_lock_timeout() {
        warn!(
            "event={event} module=timeline status=error user_id={user} assignment_id={assignment} error_code=lock_timeout"
        );
    } else {
        error!(
            "event={event} module=timeline status=error user_id={user} assignment_id={assignment} error=\"{err}\""
        );
    }
}
