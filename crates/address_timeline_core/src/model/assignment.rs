//! Address assignment domain model.
//!
//! # Responsibility
//! - Define the persisted assignment record binding a user to an address.
//! - Provide the pure validation step that turns caller input into a
//!   `ValidatedAssignment` before any storage access.
//!
//! # Invariants
//! - `start_date` is always set.
//! - Temporary-class rows always carry `end_date >= start_date`.
//! - `end_date = None` means open-ended (the current permanent address).
//!
//! # See also
//! - `model::status` for classification.

use crate::model::directory::{Address, AddressId, User, UserId};
use crate::model::status::AssignmentStatus;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one assignment row.
pub type AssignmentId = Uuid;

const MIN_SUPPORTED_YEAR: i32 = 1;
const MAX_SUPPORTED_YEAR: i32 = 9999;

/// Persisted assignment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAssignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub status: AssignmentStatus,
    pub start_date: NaiveDate,
    /// `None` while the assignment is open-ended.
    pub end_date: Option<NaiveDate>,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

impl AddressAssignment {
    /// Returns whether this row is the open-ended permanent row of its user.
    pub fn is_open_permanent(&self) -> bool {
        self.status.is_permanent_class() && self.end_date.is_none()
    }

    /// Inclusive overlap test against `[start, end]`.
    ///
    /// An open-ended row overlaps every range that ends on or after its start.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let own_end_reaches = self.end_date.map_or(true, |own_end| start <= own_end);
        own_end_reaches && self.start_date <= end
    }
}

/// Assignment joined with the user and address rows it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentDetail {
    pub assignment: AddressAssignment,
    pub address: Address,
    pub user: User,
}

impl AssignmentDetail {
    /// Name printed on the label.
    pub fn recipient_name(&self) -> String {
        self.user.full_name()
    }

    /// Address phone when present and non-blank, otherwise the profile phone.
    pub fn contact_phone(&self) -> &str {
        self.address
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
            .unwrap_or(self.user.phone.as_str())
    }

    pub fn zip_code(&self) -> &str {
        &self.address.zip_code
    }
}

/// Caller input for creating an assignment.
///
/// `status` and `start_date` are optional here so that missing fields are
/// reported as validation failures instead of being unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub status: Option<AssignmentStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl NewAssignment {
    /// Builds a permanent-class request starting on `start_date`.
    pub fn permanent(
        user_id: UserId,
        address_id: AddressId,
        status: AssignmentStatus,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            user_id,
            address_id,
            status: Some(status),
            start_date: Some(start_date),
            end_date: None,
        }
    }

    /// Builds a temporary-class request covering `[start_date, end_date]`.
    pub fn temporary(
        user_id: UserId,
        address_id: AddressId,
        status: AssignmentStatus,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            user_id,
            address_id,
            status: Some(status),
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    /// Validates required fields and date ordering.
    ///
    /// # Errors
    /// - `MissingStatus` / `MissingStartDate` when required fields are absent.
    /// - `TerminalStatus` when a caller tries to create an expired/deleted row.
    /// - `MissingEndDate` for temporary-class rows without an end date.
    /// - `PermanentEndDateManaged` for permanent-class rows with an end date.
    /// - `EndBeforeStart` when the range is inverted.
    /// - `DateOutOfRange` for years outside `0001..=9999`.
    pub fn validate(&self) -> Result<ValidatedAssignment, ValidationError> {
        let status = self.status.ok_or(ValidationError::MissingStatus)?;
        if status.is_terminal() {
            return Err(ValidationError::TerminalStatus(status));
        }
        let start_date = self.start_date.ok_or(ValidationError::MissingStartDate)?;
        if status.is_permanent_class() && self.end_date.is_some() {
            return Err(ValidationError::PermanentEndDateManaged);
        }
        validate_dates(status, start_date, self.end_date)?;

        Ok(ValidatedAssignment {
            user_id: self.user_id,
            address_id: self.address_id,
            status,
            start_date,
            end_date: self.end_date,
        })
    }
}

/// Assignment input that passed [`NewAssignment::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAssignment {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub status: AssignmentStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Checks the date rules shared by create and date correction.
pub fn validate_dates(
    status: AssignmentStatus,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    ensure_supported(start_date)?;
    if let Some(end_date) = end_date {
        ensure_supported(end_date)?;
        if end_date < start_date {
            return Err(ValidationError::EndBeforeStart {
                start_date,
                end_date,
            });
        }
    } else if status.is_temporary_class() {
        return Err(ValidationError::MissingEndDate { status });
    }
    Ok(())
}

/// Returns the day before `date`.
pub fn day_before(date: NaiveDate) -> Result<NaiveDate, ValidationError> {
    date.pred_opt()
        .filter(|previous| previous.year() >= MIN_SUPPORTED_YEAR)
        .ok_or(ValidationError::DateOutOfRange(date))
}

/// Rejects dates outside `0001..=9999`. Stored dates compare as
/// `%Y-%m-%d` text, which only orders correctly inside that range.
pub(crate) fn ensure_supported(date: NaiveDate) -> Result<(), ValidationError> {
    if (MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&date.year()) {
        Ok(())
    } else {
        Err(ValidationError::DateOutOfRange(date))
    }
}

/// Caller-input problems. These are user-facing and carry enough detail to
/// correct the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingStatus,
    MissingStartDate,
    /// Temporary-class rows must be bounded.
    MissingEndDate { status: AssignmentStatus },
    EndBeforeStart {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    /// Expired/deleted can only be reached through the timeline itself.
    TerminalStatus(AssignmentStatus),
    DateOutOfRange(NaiveDate),
    /// A new permanent row must start after the current permanent row.
    StartNotAfterCurrent {
        current_id: AssignmentId,
        current_start: NaiveDate,
        requested_start: NaiveDate,
    },
    /// Permanent end dates are set only by the successor row.
    PermanentEndDateManaged,
    /// Only soft-deleted rows can be purged.
    PurgeRequiresDeleted {
        assignment_id: AssignmentId,
        status: AssignmentStatus,
    },
    InvalidSmartId(String),
    /// A two-party lookup was requested without either party.
    NoPartyRequested,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingStatus => write!(f, "status required"),
            Self::MissingStartDate => write!(f, "start date required"),
            Self::MissingEndDate { status } => {
                write!(f, "end date required for {status} address")
            }
            Self::EndBeforeStart {
                start_date,
                end_date,
            } => write!(f, "end date {end_date} is before start date {start_date}"),
            Self::TerminalStatus(status) => {
                write!(f, "status `{status}` cannot be assigned directly")
            }
            Self::DateOutOfRange(date) => write!(f, "date {date} is outside the supported range"),
            Self::StartNotAfterCurrent {
                current_id,
                current_start,
                requested_start,
            } => write!(
                f,
                "permanent address must start after {current_start} (current assignment {current_id}), got {requested_start}"
            ),
            Self::PermanentEndDateManaged => write!(
                f,
                "end date of a permanent address is set by the address that replaces it"
            ),
            Self::PurgeRequiresDeleted {
                assignment_id,
                status,
            } => write!(
                f,
                "assignment {assignment_id} must be deleted before purge, status is `{status}`"
            ),
            Self::InvalidSmartId(value) => write!(f, "invalid smart id `{value}`"),
            Self::NoPartyRequested => {
                write!(f, "either a sender or a recipient smart id must be provided")
            }
        }
    }
}

impl Error for ValidationError {}
