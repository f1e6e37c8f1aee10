//! Onboarding Daemon library
//!
//! This module provides the core components for the onboarding daemon:
//! - Storage backends and the tick lease
//! - Collaborator adapters (Slack, eformsign, mail relay)
//! - Candidate selection, the per-record state machine and the orchestrator
//! - Daemon lifecycle management

pub mod collaborators;
pub mod config;
pub mod daemon;
pub mod error;
pub mod lease;
pub mod scheduler;
pub mod storage;

pub use collaborators::{CollaboratorError, CollaboratorResult, Collaborators};
pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult, StorageError, StorageResult};
pub use lease::{InMemoryLeaseManager, LeaseManager, PostgresLeaseManager};
pub use scheduler::{Orchestrator, RecordOutcome, Scheduler, TickReport};
pub use storage::{InMemoryStorage, PostgresStorage, SupplierStorage};
