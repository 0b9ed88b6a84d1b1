use db::{
    DbErr, TransactionTrait,
    models::{project::Project, task::Task, work_hour::WorkHour},
    types::{ProjectStatus, TaskStatus},
};
use sea_orm::DatabaseConnection;
use thiserror::Error;
use uuid::Uuid;

use super::locks::ProjectLocks;

#[derive(Debug, Error)]
pub enum RollupError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Work hour not found")]
    WorkHourNotFound,
    #[error("Task not found")]
    TaskNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Work hour is already approved")]
    AlreadyApproved,
    #[error("Work hour is not approved")]
    NotApproved,
}

/// Folds a project's task statuses into one project status. Completed
/// only when every task is completed; any task off pending otherwise
/// means in-progress.
pub fn derive_status(statuses: &[TaskStatus]) -> ProjectStatus {
    if !statuses.is_empty() && statuses.iter().all(|s| *s == TaskStatus::Completed) {
        ProjectStatus::Completed
    } else if statuses.iter().any(|s| *s != TaskStatus::Pending) {
        ProjectStatus::InProgress
    } else {
        ProjectStatus::Pending
    }
}

/// Keeps the derived columns on projects and tasks consistent with
/// their source rows: project status from task statuses, task and
/// project costs from approved work hours. Every write path takes the
/// project lock first.
#[derive(Clone)]
pub struct RollupService {
    locks: ProjectLocks,
}

impl RollupService {
    pub fn new(locks: ProjectLocks) -> Self {
        Self { locks }
    }

    /// Re-derives the project's status from its tasks. Projects with no
    /// tasks are left exactly as they are.
    pub async fn recompute_project_status(
        &self,
        db: &DatabaseConnection,
        project_id: Uuid,
    ) -> Result<Project, RollupError> {
        let _guard = self.locks.lock(project_id).await;

        let project = Project::find_by_id(db, project_id)
            .await?
            .ok_or(RollupError::ProjectNotFound)?;
        let statuses = Task::statuses_by_project(db, project_id).await?;
        if statuses.is_empty() {
            return Ok(project);
        }

        let status = derive_status(&statuses);
        if status == project.status {
            return Ok(project);
        }
        Ok(Project::set_status(db, project_id, status).await?)
    }

    /// Approves a work-hour entry and folds its snapshot cost into the
    /// task and project totals. All three writes happen in one
    /// transaction, with the approved flag flipped last so a failure
    /// anywhere leaves the entry unapproved and the totals untouched.
    pub async fn approve_work_hour(
        &self,
        db: &DatabaseConnection,
        work_hour_id: Uuid,
    ) -> Result<WorkHour, RollupError> {
        let (_, task) = self.load_entry(db, work_hour_id).await?;
        let _guard = self.locks.lock(task.project_id).await;

        // The flag must be read under the lock; a pre-lock read lets two
        // approvals both see it unset and apply the cost twice.
        let (entry, task) = self.load_entry(db, work_hour_id).await?;
        if entry.approved {
            return Err(RollupError::AlreadyApproved);
        }

        let cost = entry.cost();
        let txn = db.begin().await?;
        Task::add_cost(&txn, task.id, cost).await?;
        Project::add_total_cost(&txn, task.project_id, cost).await?;
        WorkHour::set_approved(&txn, work_hour_id, true).await?;
        txn.commit().await?;

        tracing::debug!(work_hour_id = %work_hour_id, cost, "approved work hour");
        WorkHour::find_by_id(db, work_hour_id)
            .await?
            .ok_or(RollupError::WorkHourNotFound)
    }

    /// Exact inverse of [`approve_work_hour`](Self::approve_work_hour):
    /// subtracts the same snapshot cost and clears the flag last.
    pub async fn disapprove_work_hour(
        &self,
        db: &DatabaseConnection,
        work_hour_id: Uuid,
    ) -> Result<WorkHour, RollupError> {
        let (_, task) = self.load_entry(db, work_hour_id).await?;
        let _guard = self.locks.lock(task.project_id).await;

        let (entry, task) = self.load_entry(db, work_hour_id).await?;
        if !entry.approved {
            return Err(RollupError::NotApproved);
        }

        let cost = entry.cost();
        let txn = db.begin().await?;
        Task::add_cost(&txn, task.id, -cost).await?;
        Project::add_total_cost(&txn, task.project_id, -cost).await?;
        WorkHour::set_approved(&txn, work_hour_id, false).await?;
        txn.commit().await?;

        tracing::debug!(work_hour_id = %work_hour_id, cost, "disapproved work hour");
        WorkHour::find_by_id(db, work_hour_id)
            .await?
            .ok_or(RollupError::WorkHourNotFound)
    }

    /// Recomputes every task cost and the project total from the
    /// approved work-hour rows, repairing any drift the incremental
    /// path may have accumulated. Returns the number of rows that
    /// needed fixing.
    pub async fn reconcile_project_costs(
        &self,
        db: &DatabaseConnection,
        project_id: Uuid,
    ) -> Result<usize, RollupError> {
        let _guard = self.locks.lock(project_id).await;

        Project::find_by_id(db, project_id)
            .await?
            .ok_or(RollupError::ProjectNotFound)?;

        let tasks = Task::find_by_project_id(db, project_id).await?;
        let mut repaired = 0;
        let mut project_total = 0.0;
        let txn = db.begin().await?;
        for task in &tasks {
            let expected = WorkHour::approved_cost_by_task(&txn, task.id).await?;
            project_total += expected;
            if (task.cost - expected).abs() > f64::EPSILON {
                tracing::warn!(
                    task_id = %task.id,
                    stored = task.cost,
                    expected,
                    "task cost drifted, repairing"
                );
                Task::set_cost(&txn, task.id, expected).await?;
                repaired += 1;
            }
        }

        let project = Project::find_by_id(&txn, project_id)
            .await?
            .ok_or(RollupError::ProjectNotFound)?;
        if (project.total_cost - project_total).abs() > f64::EPSILON {
            tracing::warn!(
                project_id = %project_id,
                stored = project.total_cost,
                expected = project_total,
                "project total cost drifted, repairing"
            );
            Project::set_total_cost(&txn, project_id, project_total).await?;
            repaired += 1;
        }
        txn.commit().await?;
        Ok(repaired)
    }

    /// One reconciliation sweep over every project.
    pub async fn reconcile_all(&self, db: &DatabaseConnection) -> Result<usize, RollupError> {
        let mut repaired = 0;
        for project_id in Project::all_ids(db).await? {
            repaired += self.reconcile_project_costs(db, project_id).await?;
        }
        Ok(repaired)
    }

    async fn load_entry(
        &self,
        db: &DatabaseConnection,
        work_hour_id: Uuid,
    ) -> Result<(WorkHour, Task), RollupError> {
        let entry = WorkHour::find_by_id(db, work_hour_id)
            .await?
            .ok_or(RollupError::WorkHourNotFound)?;
        let task = Task::find_by_id(db, entry.task_id)
            .await?
            .ok_or(RollupError::TaskNotFound)?;
        Ok((entry, task))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::{
        models::{
            project::{CreateProject, Project},
            task::{CreateTask, Task},
            user::{CreateUser, User},
            work_hour::{CreateWorkHour, WorkHour},
        },
        types::UserRole,
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    struct Fixture {
        project: Uuid,
        task: Uuid,
        user: Uuid,
    }

    async fn seed(db: &DatabaseConnection, rate: f64) -> Fixture {
        let user = Uuid::new_v4();
        User::create(
            db,
            &CreateUser {
                email: "ada@example.com".to_string(),
                password: "secret".to_string(),
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                job_title: None,
                role: Some(UserRole::Member),
                hourly_rate: rate,
            },
            user,
        )
        .await
        .unwrap();

        let project = Uuid::new_v4();
        Project::create(
            db,
            &CreateProject {
                name: "Engine".to_string(),
                description: None,
                created_by: Some(user),
            },
            project,
        )
        .await
        .unwrap();

        let task = Uuid::new_v4();
        Task::create(
            db,
            &CreateTask::from_name_description(project, "Cards".to_string(), None),
            task,
        )
        .await
        .unwrap();

        Fixture {
            project,
            task,
            user,
        }
    }

    async fn record_hours(db: &DatabaseConnection, f: &Fixture, hours: i32, minutes: i32) -> Uuid {
        WorkHour::create(
            db,
            &CreateWorkHour {
                task_id: f.task,
                recorded_by: f.user,
                hours,
                minutes,
                recorded_date: Utc::now(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
        .id
    }

    fn rollup() -> RollupService {
        RollupService::new(ProjectLocks::new())
    }

    #[test]
    fn status_derivation_table() {
        use ProjectStatus as P;
        use TaskStatus as T;

        assert_eq!(derive_status(&[T::Pending, T::Pending]), P::Pending);
        assert_eq!(derive_status(&[T::Pending, T::InProgress]), P::InProgress);
        assert_eq!(derive_status(&[T::Pending, T::Completed]), P::InProgress);
        assert_eq!(derive_status(&[T::Completed, T::Completed]), P::Completed);
        assert_eq!(derive_status(&[T::InProgress]), P::InProgress);
        assert_eq!(derive_status(&[]), P::Pending);
    }

    #[tokio::test]
    async fn completion_is_stamped_and_cleared() {
        let db = setup_db().await;
        let f = seed(&db, 40.0).await;
        let svc = rollup();

        Task::update_status(&db, f.task, TaskStatus::Completed)
            .await
            .unwrap();
        let project = svc.recompute_project_status(&db, f.project).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
        assert!(project.completion_date.is_some());

        Task::update_status(&db, f.task, TaskStatus::InProgress)
            .await
            .unwrap();
        let project = svc.recompute_project_status(&db, f.project).await.unwrap();
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert!(project.completion_date.is_none());
    }

    #[tokio::test]
    async fn empty_project_is_left_untouched() {
        let db = setup_db().await;
        let project_id = Uuid::new_v4();
        Project::create(
            &db,
            &CreateProject {
                name: "Empty".to_string(),
                description: None,
                created_by: None,
            },
            project_id,
        )
        .await
        .unwrap();

        let project = rollup()
            .recompute_project_status(&db, project_id)
            .await
            .unwrap();
        assert_eq!(project.status, ProjectStatus::Pending);
        assert!(project.completion_date.is_none());
    }

    #[tokio::test]
    async fn approve_folds_cost_into_task_and_project() {
        let db = setup_db().await;
        let f = seed(&db, 40.0).await;
        let svc = rollup();

        let entry = record_hours(&db, &f, 2, 30).await;
        let approved = svc.approve_work_hour(&db, entry).await.unwrap();
        assert!(approved.approved);

        let task = Task::find_by_id(&db, f.task).await.unwrap().unwrap();
        let project = Project::find_by_id(&db, f.project).await.unwrap().unwrap();
        assert_eq!(task.cost, 100.0);
        assert_eq!(project.total_cost, 100.0);

        let err = svc.approve_work_hour(&db, entry).await.unwrap_err();
        assert!(matches!(err, RollupError::AlreadyApproved));
        // Precondition failure must not touch the totals.
        let project = Project::find_by_id(&db, f.project).await.unwrap().unwrap();
        assert_eq!(project.total_cost, 100.0);
    }

    #[tokio::test]
    async fn racing_approvals_apply_the_cost_once() {
        let db = setup_db().await;
        let f = seed(&db, 40.0).await;
        let locks = ProjectLocks::new();
        let svc = RollupService::new(locks.clone());

        let entry = record_hours(&db, &f, 1, 0).await;

        // Hold the project lock so both calls read the entry and queue
        // behind it before either can flip the flag.
        let gate = locks.lock(f.project).await;
        let first = {
            let svc = svc.clone();
            let db = db.clone();
            tokio::spawn(async move { svc.approve_work_hour(&db, entry).await })
        };
        let second = {
            let svc = svc.clone();
            let db = db.clone();
            tokio::spawn(async move { svc.approve_work_hour(&db, entry).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!first.is_finished());
        assert!(!second.is_finished());
        drop(gate);

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(RollupError::AlreadyApproved)))
        );

        let task = Task::find_by_id(&db, f.task).await.unwrap().unwrap();
        let project = Project::find_by_id(&db, f.project).await.unwrap().unwrap();
        assert_eq!(task.cost, 40.0);
        assert_eq!(project.total_cost, 40.0);
    }

    #[tokio::test]
    async fn disapprove_is_the_exact_inverse() {
        let db = setup_db().await;
        let f = seed(&db, 40.0).await;
        let svc = rollup();

        let entry = record_hours(&db, &f, 3, 0).await;
        let err = svc.disapprove_work_hour(&db, entry).await.unwrap_err();
        assert!(matches!(err, RollupError::NotApproved));

        svc.approve_work_hour(&db, entry).await.unwrap();
        svc.disapprove_work_hour(&db, entry).await.unwrap();

        let task = Task::find_by_id(&db, f.task).await.unwrap().unwrap();
        let project = Project::find_by_id(&db, f.project).await.unwrap().unwrap();
        assert_eq!(task.cost, 0.0);
        assert_eq!(project.total_cost, 0.0);
    }

    #[tokio::test]
    async fn approved_cost_uses_snapshot_rate_not_current() {
        let db = setup_db().await;
        let f = seed(&db, 40.0).await;
        let svc = rollup();

        let entry = record_hours(&db, &f, 1, 0).await;
        User::update(
            &db,
            f.user,
            &db::models::user::UpdateUser {
                first_name: None,
                last_name: None,
                job_title: None,
                hourly_rate: Some(200.0),
                password: None,
            },
        )
        .await
        .unwrap();

        svc.approve_work_hour(&db, entry).await.unwrap();
        let project = Project::find_by_id(&db, f.project).await.unwrap().unwrap();
        assert_eq!(project.total_cost, 40.0);
    }

    #[tokio::test]
    async fn totals_always_match_approved_entries() {
        let db = setup_db().await;
        let f = seed(&db, 40.0).await;
        let svc = rollup();

        let first = record_hours(&db, &f, 1, 0).await;
        let second = record_hours(&db, &f, 0, 30).await;
        let third = record_hours(&db, &f, 2, 0).await;

        svc.approve_work_hour(&db, first).await.unwrap();
        svc.approve_work_hour(&db, second).await.unwrap();
        svc.approve_work_hour(&db, third).await.unwrap();
        svc.disapprove_work_hour(&db, second).await.unwrap();

        let approved_sum = WorkHour::approved_total_cost(&db, None).await.unwrap();
        let task = Task::find_by_id(&db, f.task).await.unwrap().unwrap();
        let project = Project::find_by_id(&db, f.project).await.unwrap().unwrap();
        assert_eq!(approved_sum, 120.0);
        assert_eq!(task.cost, approved_sum);
        assert_eq!(project.total_cost, approved_sum);
    }

    #[tokio::test]
    async fn reconcile_repairs_drifted_totals() {
        let db = setup_db().await;
        let f = seed(&db, 40.0).await;
        let svc = rollup();

        let entry = record_hours(&db, &f, 2, 0).await;
        svc.approve_work_hour(&db, entry).await.unwrap();

        // Corrupt the derived columns behind the service's back.
        Task::set_cost(&db, f.task, 5.0).await.unwrap();
        Project::set_total_cost(&db, f.project, 999.0).await.unwrap();

        let repaired = svc.reconcile_project_costs(&db, f.project).await.unwrap();
        assert_eq!(repaired, 2);

        let task = Task::find_by_id(&db, f.task).await.unwrap().unwrap();
        let project = Project::find_by_id(&db, f.project).await.unwrap().unwrap();
        assert_eq!(task.cost, 80.0);
        assert_eq!(project.total_cost, 80.0);

        assert_eq!(svc.reconcile_all(&db).await.unwrap(), 0);
    }
}
