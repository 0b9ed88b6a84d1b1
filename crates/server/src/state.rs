use db::DBService;
use sea_orm::DatabaseConnection;
use services::services::{
    ProjectLocks, PrerequisiteService, RollupService, SummaryService,
};

/// Shared handle threaded through every route. Cloning is cheap, the
/// database pool and lock map are shared underneath.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    prerequisites: PrerequisiteService,
    rollup: RollupService,
    summary: SummaryService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        let db = DBService::new().await?;
        Ok(Self::with_db(db))
    }

    pub fn with_db(db: DBService) -> Self {
        Self {
            db,
            prerequisites: PrerequisiteService::new(),
            rollup: RollupService::new(ProjectLocks::new()),
            summary: SummaryService::new(),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn pool(&self) -> &DatabaseConnection {
        &self.db.pool
    }

    pub fn prerequisites(&self) -> &PrerequisiteService {
        &self.prerequisites
    }

    pub fn rollup(&self) -> &RollupService {
        &self.rollup
    }

    pub fn summary(&self) -> &SummaryService {
        &self.summary
    }
}
