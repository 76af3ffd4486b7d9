//! Effective-address resolution.
//!
//! # Responsibility
//! - Answer "which address serves this user for this channel on this date".
//!
//! # Invariants
//! - A temporary override for the channel wins over any permanent row.
//! - A row is in effect on `date` iff `start_date < date` and its end date
//!   is absent or `> date`. Start and end days themselves never match.
//! - More than one match in either pass is an integrity failure, not a
//!   choice to make.
//!
//! # See also
//! - `model::status` for the channel status sets of both passes.

use crate::error::{IntegrityViolation, Missing, TimelineError, TimelineResult};
use crate::model::assignment::{ensure_supported, AddressAssignment, AssignmentDetail};
use crate::model::directory::UserId;
use crate::model::smart_id::normalize_smart_id;
use crate::model::status::{AssignmentStatus, Channel};
use crate::repo::assignment_repo::AssignmentStore;
use crate::repo::directory_repo::DirectoryRepository;
use chrono::NaiveDate;
use log::{debug, error};

/// Read-only resolver over an assignment store and the user directory.
pub struct EffectiveAddressResolver<'a, S, D>
where
    S: AssignmentStore + ?Sized,
    D: DirectoryRepository + ?Sized,
{
    store: &'a S,
    directory: &'a D,
}

impl<'a, S, D> EffectiveAddressResolver<'a, S, D>
where
    S: AssignmentStore + ?Sized,
    D: DirectoryRepository + ?Sized,
{
    pub fn new(store: &'a S, directory: &'a D) -> Self {
        Self { store, directory }
    }

    /// Resolves the address serving `user_id` for `channel` on `date`.
    ///
    /// # Errors
    /// - `Validation(DateOutOfRange)` for a date outside `0001..=9999`.
    /// - `NotFound` when the user is unknown or nothing is in effect.
    /// - `Integrity` when several rows match, or a matched row points at a
    ///   missing address.
    pub fn resolve(
        &self,
        user_id: UserId,
        channel: Channel,
        date: NaiveDate,
    ) -> TimelineResult<AssignmentDetail> {
        ensure_supported(date)?;
        let user = self
            .directory
            .get_user(user_id)?
            .ok_or(TimelineError::NotFound(Missing::User(user_id)))?;

        let overrides = self.store.find_by_user_and_status_and_date(
            user_id,
            &AssignmentStatus::temporary_overrides_for(channel),
            date,
        )?;
        let assignment = match single_match(user_id, channel, date, overrides)? {
            Some(found) => found,
            None => {
                let candidates = self.store.find_by_user_and_status_and_date(
                    user_id,
                    &AssignmentStatus::valid_statuses_for(channel),
                    date,
                )?;
                single_match(user_id, channel, date, candidates)?.ok_or(
                    TimelineError::NotFound(Missing::EffectiveAddress {
                        user_id,
                        channel,
                        date,
                    }),
                )?
            }
        };

        let Some(address) = self.directory.get_address(assignment.address_id)? else {
            error!(
                "event=address_resolve module=timeline status=error user_id={} assignment_id={} address_id={} error=dangling_address",
                user_id, assignment.id, assignment.address_id
            );
            return Err(TimelineError::Integrity(
                IntegrityViolation::DanglingReference {
                    assignment_id: assignment.id,
                },
            ));
        };

        debug!(
            "event=address_resolve module=timeline status=ok user_id={} channel={} date={} assignment_id={} assignment_status={}",
            user_id, channel, date, assignment.id, assignment.status
        );
        Ok(AssignmentDetail {
            assignment,
            address,
            user,
        })
    }

    /// Resolves by a carrier-entered smart id.
    ///
    /// The raw value is normalized first, so `ab1o-sz9k` finds `AB10529K`.
    ///
    /// # Errors
    /// - `Validation` when the value cannot be a smart id.
    /// - `NotFound` when no user carries it.
    /// - Everything [`Self::resolve`] returns.
    pub fn resolve_by_smart_id(
        &self,
        raw_smart_id: &str,
        channel: Channel,
        date: NaiveDate,
    ) -> TimelineResult<AssignmentDetail> {
        let smart_id = normalize_smart_id(raw_smart_id)?;
        let user = self
            .directory
            .find_user_by_smart_id(&smart_id)?
            .ok_or(TimelineError::NotFound(Missing::SmartId(smart_id)))?;
        self.resolve(user.id, channel, date)
    }
}

fn single_match(
    user_id: UserId,
    channel: Channel,
    date: NaiveDate,
    mut rows: Vec<AddressAssignment>,
) -> TimelineResult<Option<AddressAssignment>> {
    if rows.len() > 1 {
        let assignment_ids: Vec<_> = rows.iter().map(|row| row.id).collect();
        let violation = IntegrityViolation::AmbiguousResolution {
            user_id,
            channel,
            date,
            assignment_ids,
        };
        error!(
            "event=address_resolve module=timeline status=error user_id={} channel={} date={} error=\"{}\"",
            user_id, channel, date, violation
        );
        return Err(TimelineError::Integrity(violation));
    }
    Ok(rows.pop())
}
