//! Core domain logic for the address assignment timeline.
//! This crate is the single source of truth for timeline invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, DatabaseConfig, LoggingConfig, TimelineConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use error::{
    IntegrityViolation, Missing, TimelineError, TimelineResult, GENERIC_FAILURE_MESSAGE,
};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::assignment::{
    AddressAssignment, AssignmentDetail, AssignmentId, NewAssignment, ValidationError,
};
pub use model::directory::{Address, AddressId, NewAddress, NewUser, User, UserId};
pub use model::smart_id::normalize_smart_id;
pub use model::status::{AssignmentStatus, Channel, ChannelScope, Tenure};
pub use repo::assignment_repo::{AssignmentStore, SqliteAssignmentStore};
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use repo::{RepoError, RepoResult};
pub use service::overlap::OverlapValidator;
pub use service::resolver::EffectiveAddressResolver;
pub use service::timeline_service::{PartyAddresses, TimelineService, ACTIVE_LISTING_LIMIT};
pub use service::writer::{AssignmentWriter, CorrectionOutcome, CreateOutcome, DeletionOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
