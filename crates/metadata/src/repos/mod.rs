//! Repository traits for metadata operations.

pub mod analysis;
pub mod components;
pub mod health;
pub mod integrity;
pub mod maintenance;
pub mod repository;

pub use analysis::IntegrityAnalysisRepo;
pub use components::ComponentRepo;
pub use health::HealthMetaRepo;
pub use integrity::IntegrityMetaRepo;
pub use maintenance::MaintenanceRepo;
pub use repository::RepositoryMetaRepo;

/// What a locked read-modify-write did to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordWrite {
    /// The edit declined to write.
    Unchanged,
    /// No record existed; the edit's row was inserted.
    Created,
    /// The existing record was overwritten with the edit's row.
    Updated,
}

impl RecordWrite {
    /// Whether anything was written.
    pub fn is_written(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}
