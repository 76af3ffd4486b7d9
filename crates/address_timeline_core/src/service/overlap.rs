//! Temporary-range conflict detection.
//!
//! # Invariants
//! - Only live temporary-class rows take part; terminal rows never conflict,
//!   so a deleted range is free for reuse immediately.
//! - Ranges `[s1, e1]` and `[s2, e2]` conflict iff `s1 <= e2 && s2 <= e1`.
//! - The validator never resolves a conflict; it reports the first one.

use crate::error::{TimelineError, TimelineResult};
use crate::model::assignment::{validate_dates, AssignmentId, ValidationError};
use crate::model::directory::UserId;
use crate::model::status::AssignmentStatus;
use crate::repo::assignment_repo::AssignmentStore;
use chrono::NaiveDate;
use log::info;

/// Read-only checker for temporary-range conflicts.
pub struct OverlapValidator<'s, S: AssignmentStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: AssignmentStore + ?Sized> OverlapValidator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Checks `[proposed_start, proposed_end]` for a row of temporary-class
    /// `status` against the user's live temporary rows, ignoring `exclude`
    /// (the row being corrected).
    ///
    /// # Errors
    /// - `Validation` when `proposed_end` is missing or precedes the start.
    /// - `Conflict` naming the earliest overlapping row.
    pub fn check_conflict(
        &self,
        user_id: UserId,
        status: AssignmentStatus,
        proposed_start: NaiveDate,
        proposed_end: Option<NaiveDate>,
        exclude: Option<AssignmentId>,
    ) -> TimelineResult<()> {
        debug_assert!(status.is_temporary_class());
        let proposed_end = proposed_end.ok_or(ValidationError::MissingEndDate { status })?;
        validate_dates(status, proposed_start, Some(proposed_end))?;

        let conflicts = self.store.find_overlapping(
            user_id,
            &AssignmentStatus::temporary_class(),
            proposed_start,
            proposed_end,
            exclude,
        )?;

        match conflicts.first() {
            Some(conflict) => {
                info!(
                    "event=overlap_check module=timeline status=conflict user_id={} proposed_start={} proposed_end={} conflicting_id={}",
                    user_id, proposed_start, proposed_end, conflict.id
                );
                Err(TimelineError::Conflict {
                    conflicting_id: conflict.id,
                    conflicting_start: conflict.start_date,
                    conflicting_end: conflict.end_date,
                })
            }
            None => Ok(()),
        }
    }
}
