//! Assignment status taxonomy.
//!
//! # Responsibility
//! - Define the closed set of assignment statuses and delivery channels.
//! - Classify every status along two axes: tenure and channel scope.
//! - Derive every status group used by storage queries and services.
//!
//! # Invariants
//! - Status groups are computed from `AssignmentStatus::ALL` through the
//!   predicates below; no other module declares its own status list.
//! - Terminal statuses (`expired`, `deleted`) have neither tenure nor scope.
//! - The persisted string form is stable; changing it requires a migration.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Delivery context an assignment can apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Letters and flats.
    Mail,
    /// Parcels.
    Package,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Package => "package",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Duration axis of a live status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tenure {
    /// Open-ended until superseded by a later permanent assignment.
    Permanent,
    /// Bounded by a mandatory end date.
    Temporary,
}

/// Channel-restriction axis of a live status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelScope {
    /// Serves both mail and package.
    Full,
    MailOnly,
    PackageOnly,
}

impl ChannelScope {
    /// Returns whether this scope delivers on `channel`.
    pub fn covers(self, channel: Channel) -> bool {
        matches!(
            (self, channel),
            (Self::Full, _) | (Self::MailOnly, Channel::Mail) | (Self::PackageOnly, Channel::Package)
        )
    }
}

/// Closed set of statuses an address assignment can carry.
///
/// Serialized with the same names used in storage, so `FullPermanent` is
/// `"permanent"` and `FullTemporary` is `"temporary"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentStatus {
    #[serde(rename = "permanent")]
    FullPermanent,
    #[serde(rename = "mail_only_permanent")]
    MailOnlyPermanent,
    #[serde(rename = "package_only_permanent")]
    PackageOnlyPermanent,
    #[serde(rename = "temporary")]
    FullTemporary,
    #[serde(rename = "mail_only_temporary")]
    MailOnlyTemporary,
    #[serde(rename = "package_only_temporary")]
    PackageOnlyTemporary,
    #[serde(rename = "expired")]
    Expired,
    #[serde(rename = "deleted")]
    Deleted,
}

impl AssignmentStatus {
    /// Every status, in declaration order.
    pub const ALL: [AssignmentStatus; 8] = [
        Self::FullPermanent,
        Self::MailOnlyPermanent,
        Self::PackageOnlyPermanent,
        Self::FullTemporary,
        Self::MailOnlyTemporary,
        Self::PackageOnlyTemporary,
        Self::Expired,
        Self::Deleted,
    ];

    /// Returns the tenure axis, or `None` for terminal statuses.
    pub fn tenure(self) -> Option<Tenure> {
        match self {
            Self::FullPermanent | Self::MailOnlyPermanent | Self::PackageOnlyPermanent => {
                Some(Tenure::Permanent)
            }
            Self::FullTemporary | Self::MailOnlyTemporary | Self::PackageOnlyTemporary => {
                Some(Tenure::Temporary)
            }
            Self::Expired | Self::Deleted => None,
        }
    }

    /// Returns the channel-scope axis, or `None` for terminal statuses.
    pub fn scope(self) -> Option<ChannelScope> {
        match self {
            Self::FullPermanent | Self::FullTemporary => Some(ChannelScope::Full),
            Self::MailOnlyPermanent | Self::MailOnlyTemporary => Some(ChannelScope::MailOnly),
            Self::PackageOnlyPermanent | Self::PackageOnlyTemporary => {
                Some(ChannelScope::PackageOnly)
            }
            Self::Expired | Self::Deleted => None,
        }
    }

    pub fn is_temporary_class(self) -> bool {
        self.tenure() == Some(Tenure::Temporary)
    }

    pub fn is_permanent_class(self) -> bool {
        self.tenure() == Some(Tenure::Permanent)
    }

    /// Terminal rows are excluded from overlap checks and resolution.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Deleted)
    }

    /// Returns whether a live assignment with this status delivers on `channel`.
    pub fn serves(self, channel: Channel) -> bool {
        self.scope().is_some_and(|scope| scope.covers(channel))
    }

    /// Stable storage/wire name.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::FullPermanent => "permanent",
            Self::MailOnlyPermanent => "mail_only_permanent",
            Self::PackageOnlyPermanent => "package_only_permanent",
            Self::FullTemporary => "temporary",
            Self::MailOnlyTemporary => "mail_only_temporary",
            Self::PackageOnlyTemporary => "package_only_temporary",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        }
    }

    /// Parses a storage name; `None` for unknown values.
    pub fn from_db_str(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_db_str() == value)
    }

    /// Temporary-class statuses.
    pub fn temporary_class() -> Vec<AssignmentStatus> {
        Self::matching(Self::is_temporary_class)
    }

    /// Permanent-class statuses.
    pub fn permanent_class() -> Vec<AssignmentStatus> {
        Self::matching(Self::is_permanent_class)
    }

    /// Every status that is not terminal.
    pub fn non_terminal() -> Vec<AssignmentStatus> {
        Self::matching(|status| !status.is_terminal())
    }

    /// Live statuses that deliver on `channel`, permanent and temporary.
    pub fn valid_statuses_for(channel: Channel) -> Vec<AssignmentStatus> {
        Self::matching(|status| status.serves(channel))
    }

    /// Temporary statuses consulted before falling back to
    /// [`AssignmentStatus::valid_statuses_for`]: the channel-only temporary
    /// status plus the full temporary status.
    pub fn temporary_overrides_for(channel: Channel) -> Vec<AssignmentStatus> {
        Self::matching(|status| status.is_temporary_class() && status.serves(channel))
    }

    fn matching(predicate: impl Fn(AssignmentStatus) -> bool) -> Vec<AssignmentStatus> {
        Self::ALL
            .into_iter()
            .filter(|status| predicate(*status))
            .collect()
    }
}

impl Display for AssignmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{AssignmentStatus, Channel, ChannelScope, Tenure};

    #[test]
    fn every_live_status_has_both_axes() {
        for status in AssignmentStatus::ALL {
            assert_eq!(status.tenure().is_some(), !status.is_terminal());
            assert_eq!(status.scope().is_some(), !status.is_terminal());
        }
    }

    #[test]
    fn class_groups_partition_live_statuses() {
        let temporary = AssignmentStatus::temporary_class();
        let permanent = AssignmentStatus::permanent_class();
        assert_eq!(temporary.len(), 3);
        assert_eq!(permanent.len(), 3);
        assert!(temporary.iter().all(|status| !permanent.contains(status)));
        assert_eq!(
            AssignmentStatus::non_terminal().len(),
            temporary.len() + permanent.len()
        );
    }

    #[test]
    fn mail_statuses_exclude_package_only() {
        let mail = AssignmentStatus::valid_statuses_for(Channel::Mail);
        assert_eq!(
            mail,
            vec![
                AssignmentStatus::FullPermanent,
                AssignmentStatus::MailOnlyPermanent,
                AssignmentStatus::FullTemporary,
                AssignmentStatus::MailOnlyTemporary,
            ]
        );
        assert!(!mail.contains(&AssignmentStatus::PackageOnlyTemporary));
        assert!(!mail.contains(&AssignmentStatus::Expired));
    }

    #[test]
    fn package_overrides_are_channel_only_plus_full_temporary() {
        assert_eq!(
            AssignmentStatus::temporary_overrides_for(Channel::Package),
            vec![
                AssignmentStatus::FullTemporary,
                AssignmentStatus::PackageOnlyTemporary,
            ]
        );
    }

    #[test]
    fn db_names_round_trip_and_reject_unknown() {
        for status in AssignmentStatus::ALL {
            assert_eq!(AssignmentStatus::from_db_str(status.as_db_str()), Some(status));
        }
        assert_eq!(AssignmentStatus::from_db_str("Permanent"), None);
        assert_eq!(AssignmentStatus::from_db_str(""), None);
    }

    #[test]
    fn serde_names_match_storage_names() {
        for status in AssignmentStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_db_str()));
        }
    }

    #[test]
    fn scope_coverage() {
        assert!(ChannelScope::Full.covers(Channel::Mail));
        assert!(ChannelScope::Full.covers(Channel::Package));
        assert!(!ChannelScope::MailOnly.covers(Channel::Package));
        assert!(ChannelScope::PackageOnly.covers(Channel::Package));
        assert_eq!(
            AssignmentStatus::MailOnlyTemporary.tenure(),
            Some(Tenure::Temporary)
        );
    }
}
