pub mod locks;
pub mod prerequisites;
pub mod rollup;
pub mod summary;

pub use locks::ProjectLocks;
pub use prerequisites::{PrerequisiteService, PrerequisiteServiceError};
pub use rollup::{RollupError, RollupService};
pub use summary::SummaryService;
