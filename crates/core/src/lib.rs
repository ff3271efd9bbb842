//! Core domain types and shared logic for package metadata coordination.
//!
//! This crate defines the data model used across all other crates:
//! - Package coordinates and their canonical form
//! - Metadata kinds, fetch status and repository ecosystems
//! - The freshness policy deciding when to (re)fetch
//! - Fetch-result and fetch-trigger messages
//! - Integrity matching

pub mod config;
pub mod coordinate;
pub mod error;
pub mod freshness;
pub mod integrity;
pub mod kind;
pub mod result;

pub use coordinate::PackageCoordinate;
pub use error::{Error, Result};
pub use freshness::{FreshnessDecision, FreshnessPolicy, RecordState, TriggerReason};
pub use integrity::{Hashes, IntegrityMatch, IntegrityMatchStatus, compute_integrity_match};
pub use kind::{FetchStatus, MetadataKind, RepositoryType, RequestedMetadata};
pub use result::{
    AnalysisResult, ComponentRef, FetchTrigger, HealthMeta, IntegrityMeta, ResultMessage,
    ScoreCardCheck,
};
