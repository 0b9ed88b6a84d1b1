use db::{
    DbErr,
    models::{project::Project, task::Task, work_hour::WorkHour},
    types::{ProjectStatus, TaskStatus},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

/// Dashboard rollup, either portfolio-wide or scoped to one member's
/// assigned work.
#[derive(Debug, Clone, Serialize, TS)]
pub struct ProjectSummary {
    pub total_projects: u64,
    pub completed_projects: u64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub inprogress_tasks: u64,
    pub pending_tasks: u64,
    pub overdue_tasks: u64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ProjectProgress {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    /// Completed share in percent, zero for an empty project.
    pub progress: f64,
}

#[derive(Clone, Default)]
pub struct SummaryService;

impl SummaryService {
    pub fn new() -> Self {
        Self
    }

    /// With `member` set, projects shrink to those holding the member's
    /// assigned tasks, task counts to their assignments, and the cost
    /// to work they recorded. Costs always come from approved entries
    /// only.
    pub async fn project_summary(
        &self,
        db: &DatabaseConnection,
        member: Option<Uuid>,
    ) -> Result<ProjectSummary, DbErr> {
        let project_ids = match member {
            Some(member) => Task::project_ids_by_assignee(db, member).await?,
            None => Project::all_ids(db).await?,
        };
        let mut completed_projects = 0;
        for project_id in &project_ids {
            if let Some(project) = Project::find_by_id(db, *project_id).await?
                && project.status == ProjectStatus::Completed
            {
                completed_projects += 1;
            }
        }

        Ok(ProjectSummary {
            total_projects: project_ids.len() as u64,
            completed_projects,
            total_tasks: Task::count_filtered(db, member, None).await?,
            completed_tasks: Task::count_filtered(db, member, Some(TaskStatus::Completed)).await?,
            inprogress_tasks: Task::count_filtered(db, member, Some(TaskStatus::InProgress))
                .await?,
            pending_tasks: Task::count_filtered(db, member, Some(TaskStatus::Pending)).await?,
            overdue_tasks: Task::count_overdue(db, member).await?,
            total_cost: WorkHour::approved_total_cost(db, member).await?,
        })
    }

    pub async fn project_progress(
        &self,
        db: &DatabaseConnection,
        project_id: Uuid,
    ) -> Result<ProjectProgress, DbErr> {
        let total_tasks = Task::count_by_project(db, project_id, None).await?;
        let completed_tasks =
            Task::count_by_project(db, project_id, Some(TaskStatus::Completed)).await?;
        let progress = if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64 * 100.0
        };
        Ok(ProjectProgress {
            total_tasks,
            completed_tasks,
            progress,
        })
    }
}
