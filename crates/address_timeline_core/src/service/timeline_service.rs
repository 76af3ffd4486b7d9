//! Address timeline use-case facade.
//!
//! # Responsibility
//! - Expose the in-process interface used by account management, carrier
//!   lookup and HTTP handlers.
//! - Route writes through `AssignmentWriter` and reads through the resolver
//!   or the store, each over the same connection.
//!
//! # Invariants
//! - `AssignmentWriter` is the only writer of assignment rows.
//! - Reads that combine several lookups share one deferred transaction.

use crate::error::TimelineResult;
use crate::model::assignment::{
    ensure_supported, AddressAssignment, AssignmentDetail, AssignmentId, NewAssignment,
    ValidationError,
};
use crate::model::directory::UserId;
use crate::model::status::{AssignmentStatus, Channel};
use crate::repo::assignment_repo::{AssignmentStore, SqliteAssignmentStore};
use crate::repo::directory_repo::SqliteDirectoryRepository;
use crate::service::resolver::EffectiveAddressResolver;
use crate::service::writer::{
    AssignmentWriter, CorrectionOutcome, CreateOutcome, DeletionOutcome,
};
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Row cap of the active listing.
pub const ACTIVE_LISTING_LIMIT: u32 = 100;

/// Both parties of one shipment, resolved from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyAddresses {
    pub sender: Option<AssignmentDetail>,
    pub recipient: Option<AssignmentDetail>,
}

/// Timeline operations over one SQLite connection.
pub struct TimelineService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TimelineService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// See [`AssignmentWriter::create`].
    pub fn create_assignment(&self, request: &NewAssignment) -> TimelineResult<CreateOutcome> {
        AssignmentWriter::new(self.conn).create(request)
    }

    /// See [`AssignmentWriter::correct_dates`].
    pub fn correct_assignment_dates(
        &self,
        assignment_id: AssignmentId,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> TimelineResult<CorrectionOutcome> {
        AssignmentWriter::new(self.conn).correct_dates(assignment_id, start_date, end_date)
    }

    /// See [`AssignmentWriter::delete`].
    pub fn delete_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> TimelineResult<DeletionOutcome> {
        AssignmentWriter::new(self.conn).delete(assignment_id)
    }

    /// See [`AssignmentWriter::expire_elapsed_permanent`].
    pub fn expire_elapsed_permanent(
        &self,
        user_id: UserId,
        as_of: NaiveDate,
    ) -> TimelineResult<Vec<AssignmentId>> {
        AssignmentWriter::new(self.conn).expire_elapsed_permanent(user_id, as_of)
    }

    /// See [`AssignmentWriter::purge`].
    pub fn purge_assignment(&self, assignment_id: AssignmentId) -> TimelineResult<()> {
        AssignmentWriter::new(self.conn).purge(assignment_id)
    }

    /// Resolves the address serving `user_id` for `channel` on `date`.
    pub fn resolve_effective_address(
        &self,
        user_id: UserId,
        channel: Channel,
        date: NaiveDate,
    ) -> TimelineResult<AssignmentDetail> {
        let store = SqliteAssignmentStore::new(self.conn);
        let directory = SqliteDirectoryRepository::new(self.conn);
        EffectiveAddressResolver::new(&store, &directory).resolve(user_id, channel, date)
    }

    /// Resolves by a carrier-entered smart id.
    pub fn resolve_by_smart_id(
        &self,
        smart_id: &str,
        channel: Channel,
        date: NaiveDate,
    ) -> TimelineResult<AssignmentDetail> {
        let store = SqliteAssignmentStore::new(self.conn);
        let directory = SqliteDirectoryRepository::new(self.conn);
        EffectiveAddressResolver::new(&store, &directory)
            .resolve_by_smart_id(smart_id, channel, date)
    }

    /// Resolves sender and recipient smart ids in one read transaction.
    ///
    /// # Errors
    /// - `Validation(NoPartyRequested)` when both sides are `None`.
    /// - Any resolution error of either side; the first failure wins.
    pub fn resolve_sender_and_recipient(
        &self,
        sender_smart_id: Option<&str>,
        recipient_smart_id: Option<&str>,
        channel: Channel,
        date: NaiveDate,
    ) -> TimelineResult<PartyAddresses> {
        if sender_smart_id.is_none() && recipient_smart_id.is_none() {
            return Err(ValidationError::NoPartyRequested.into());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let parties = {
            let store = SqliteAssignmentStore::new(&tx);
            let directory = SqliteDirectoryRepository::new(&tx);
            let resolver = EffectiveAddressResolver::new(&store, &directory);
            let resolve = |smart_id: Option<&str>| {
                smart_id
                    .map(|smart_id| resolver.resolve_by_smart_id(smart_id, channel, date))
                    .transpose()
            };
            PartyAddresses {
                sender: resolve(sender_smart_id)?,
                recipient: resolve(recipient_smart_id)?,
            }
        };
        tx.commit()?;
        Ok(parties)
    }

    /// Live rows of `user_id` in timeline order, for history display.
    pub fn list_non_terminal_assignments(
        &self,
        user_id: UserId,
    ) -> TimelineResult<Vec<AddressAssignment>> {
        let store = SqliteAssignmentStore::new(self.conn);
        Ok(store.list_for_user(user_id, &AssignmentStatus::non_terminal(), None, None)?)
    }

    /// Live rows still running after `as_of`, capped at
    /// [`ACTIVE_LISTING_LIMIT`].
    pub fn list_active_assignments(
        &self,
        user_id: UserId,
        as_of: NaiveDate,
    ) -> TimelineResult<Vec<AddressAssignment>> {
        ensure_supported(as_of)?;
        let store = SqliteAssignmentStore::new(self.conn);
        Ok(store.list_for_user(
            user_id,
            &AssignmentStatus::non_terminal(),
            Some(as_of),
            Some(ACTIVE_LISTING_LIMIT),
        )?)
    }
}
