//! Timeline use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the timeline operations.
//! - Keep HTTP and lookup callers decoupled from storage details.
//!
//! # See also
//! - `repo` for the persistence contracts these services consume.

pub mod overlap;
pub mod resolver;
pub mod timeline_service;
pub mod writer;
