//! Domain model for the address assignment timeline.
//!
//! # Responsibility
//! - Define the assignment record and its status taxonomy.
//! - Define the user/address records the timeline references.
//!
//! # Invariants
//! - Every assignment is identified by a stable `AssignmentId`.
//! - Deletion is a `deleted` status tombstone, not a hard delete.

pub mod assignment;
pub mod directory;
pub mod smart_id;
pub mod status;
