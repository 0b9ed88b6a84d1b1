use std::collections::HashSet;

use db::{
    DbErr,
    models::{
        prerequisite::Prerequisite,
        task::{Task, TaskWithAssignee},
    },
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PrerequisiteServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Prerequisite link not found")]
    EdgeNotFound,
    #[error("A task cannot be its own prerequisite")]
    SelfReference,
    #[error("Both tasks must belong to the same project")]
    CrossProject,
    #[error("This prerequisite link already exists")]
    DuplicateEdge,
    #[error("Adding this prerequisite would create a circular dependency")]
    CycleDetected {
        task_id: Uuid,
        prerequisite_task_id: Uuid,
    },
    #[error("Task has {0} incomplete prerequisite(s)")]
    IncompletePrerequisites(usize),
}

/// A sibling task annotated for the prerequisite picker.
#[derive(Debug, Clone, Serialize, TS)]
pub struct AvailableTask {
    pub id: Uuid,
    pub name: String,
    /// Already a direct prerequisite of the reference task.
    pub is_prerequisite: bool,
    /// Linking it would keep the graph acyclic.
    pub can_add: bool,
}

/// Maintains the task dependency graph of each project, with the single
/// structural invariant that the graph stays acyclic.
#[derive(Clone, Default)]
pub struct PrerequisiteService;

impl PrerequisiteService {
    pub fn new() -> Self {
        Self
    }

    /// Links `prerequisite_task_id` as a prerequisite of `task_id`.
    ///
    /// Rejects self-links, links across projects, duplicates, and any
    /// link that would close a cycle. The cycle check walks the
    /// existing graph before the row is written, so a rejected call
    /// leaves no trace.
    pub async fn create(
        &self,
        db: &DatabaseConnection,
        task_id: Uuid,
        prerequisite_task_id: Uuid,
    ) -> Result<Prerequisite, PrerequisiteServiceError> {
        if task_id == prerequisite_task_id {
            return Err(PrerequisiteServiceError::SelfReference);
        }

        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(PrerequisiteServiceError::TaskNotFound)?;
        let prerequisite = Task::find_by_id(db, prerequisite_task_id)
            .await?
            .ok_or(PrerequisiteServiceError::TaskNotFound)?;
        if task.project_id != prerequisite.project_id {
            return Err(PrerequisiteServiceError::CrossProject);
        }

        if Prerequisite::exists(db, task_id, prerequisite_task_id).await? {
            return Err(PrerequisiteServiceError::DuplicateEdge);
        }

        if self
            .reaches(db, prerequisite_task_id, task_id)
            .await?
        {
            return Err(PrerequisiteServiceError::CycleDetected {
                task_id,
                prerequisite_task_id,
            });
        }

        let edge = Prerequisite::create(db, task_id, prerequisite_task_id, Uuid::new_v4()).await?;
        tracing::debug!(
            task_id = %task_id,
            prerequisite_task_id = %prerequisite_task_id,
            "linked prerequisite"
        );
        Ok(edge)
    }

    pub async fn delete(
        &self,
        db: &DatabaseConnection,
        task_id: Uuid,
        prerequisite_task_id: Uuid,
    ) -> Result<(), PrerequisiteServiceError> {
        let removed = Prerequisite::delete(db, task_id, prerequisite_task_id).await?;
        if removed == 0 {
            return Err(PrerequisiteServiceError::EdgeNotFound);
        }
        Ok(())
    }

    /// Direct prerequisites of a task, as full task records.
    pub async fn list(
        &self,
        db: &DatabaseConnection,
        task_id: Uuid,
    ) -> Result<Vec<TaskWithAssignee>, PrerequisiteServiceError> {
        Task::find_by_id(db, task_id)
            .await?
            .ok_or(PrerequisiteServiceError::TaskNotFound)?;

        let ids = Prerequisite::direct_prerequisite_ids(db, task_id).await?;
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = Task::find_with_assignee(db, id).await? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    /// Direct prerequisites that are not yet completed. A task may only
    /// move out of pending while this list is empty.
    pub async fn list_incomplete(
        &self,
        db: &DatabaseConnection,
        task_id: Uuid,
    ) -> Result<Vec<TaskWithAssignee>, PrerequisiteServiceError> {
        let mut tasks = self.list(db, task_id).await?;
        tasks.retain(|t| t.status != db::types::TaskStatus::Completed);
        Ok(tasks)
    }

    /// Fails with `IncompletePrerequisites` unless every direct
    /// prerequisite of the task is completed.
    pub async fn ensure_prerequisites_complete(
        &self,
        db: &DatabaseConnection,
        task_id: Uuid,
    ) -> Result<(), PrerequisiteServiceError> {
        let incomplete = self.list_incomplete(db, task_id).await?;
        if incomplete.is_empty() {
            Ok(())
        } else {
            Err(PrerequisiteServiceError::IncompletePrerequisites(
                incomplete.len(),
            ))
        }
    }

    /// Sibling tasks of `task_id` within its project, flagged with
    /// whether each is already linked and whether linking it now would
    /// be legal.
    pub async fn available(
        &self,
        db: &DatabaseConnection,
        task_id: Uuid,
    ) -> Result<Vec<AvailableTask>, PrerequisiteServiceError> {
        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(PrerequisiteServiceError::TaskNotFound)?;

        let direct: HashSet<Uuid> = Prerequisite::direct_prerequisite_ids(db, task_id)
            .await?
            .into_iter()
            .collect();

        let siblings = Task::find_by_project_id(db, task.project_id).await?;
        let mut available = Vec::new();
        for sibling in siblings {
            if sibling.id == task_id {
                continue;
            }
            let is_prerequisite = direct.contains(&sibling.id);
            let can_add =
                !is_prerequisite && !self.reaches(db, sibling.id, task_id).await?;
            available.push(AvailableTask {
                id: sibling.id,
                name: sibling.name.clone(),
                is_prerequisite,
                can_add,
            });
        }
        Ok(available)
    }

    /// Whether `to` is reachable from `from` along prerequisite edges.
    /// Iterative worklist with a visited set, so diamonds and deep
    /// chains terminate in one pass per node.
    async fn reaches(
        &self,
        db: &DatabaseConnection,
        from: Uuid,
        to: Uuid,
    ) -> Result<bool, DbErr> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut worklist = vec![from];
        while let Some(current) = worklist.pop() {
            if current == to {
                return Ok(true);
            }
            if !visited.insert(current) {
                continue;
            }
            worklist.extend(Prerequisite::direct_prerequisite_ids(db, current).await?);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        models::{
            project::{CreateProject, Project},
            task::{CreateTask, Task},
        },
        types::TaskStatus,
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_project(db: &DatabaseConnection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        Project::create(
            db,
            &CreateProject {
                name: name.to_string(),
                description: None,
                created_by: None,
            },
            id,
        )
        .await
        .unwrap();
        id
    }

    async fn seed_task(db: &DatabaseConnection, project_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        Task::create(
            db,
            &CreateTask::from_name_description(project_id, name.to_string(), None),
            id,
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn self_reference_is_rejected() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let a = seed_task(&db, project, "a").await;

        let err = PrerequisiteService::new()
            .create(&db, a, a)
            .await
            .unwrap_err();
        assert!(matches!(err, PrerequisiteServiceError::SelfReference));
    }

    #[tokio::test]
    async fn duplicate_edge_is_rejected() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let a = seed_task(&db, project, "a").await;
        let b = seed_task(&db, project, "b").await;
        let svc = PrerequisiteService::new();

        svc.create(&db, a, b).await.unwrap();
        let err = svc.create(&db, a, b).await.unwrap_err();
        assert!(matches!(err, PrerequisiteServiceError::DuplicateEdge));
    }

    #[tokio::test]
    async fn cross_project_edge_is_rejected() {
        let db = setup_db().await;
        let p1 = seed_project(&db, "p1").await;
        let p2 = seed_project(&db, "p2").await;
        let a = seed_task(&db, p1, "a").await;
        let b = seed_task(&db, p2, "b").await;

        let err = PrerequisiteService::new()
            .create(&db, a, b)
            .await
            .unwrap_err();
        assert!(matches!(err, PrerequisiteServiceError::CrossProject));
    }

    #[tokio::test]
    async fn direct_cycle_is_rejected() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let a = seed_task(&db, project, "a").await;
        let b = seed_task(&db, project, "b").await;
        let svc = PrerequisiteService::new();

        svc.create(&db, a, b).await.unwrap();
        let err = svc.create(&db, b, a).await.unwrap_err();
        assert!(matches!(
            err,
            PrerequisiteServiceError::CycleDetected { .. }
        ));
    }

    #[tokio::test]
    async fn transitive_cycle_is_rejected() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let a = seed_task(&db, project, "a").await;
        let b = seed_task(&db, project, "b").await;
        let c = seed_task(&db, project, "c").await;
        let svc = PrerequisiteService::new();

        // a depends on b, b depends on c; closing c -> a must fail.
        svc.create(&db, a, b).await.unwrap();
        svc.create(&db, b, c).await.unwrap();
        let err = svc.create(&db, c, a).await.unwrap_err();
        assert!(matches!(
            err,
            PrerequisiteServiceError::CycleDetected { .. }
        ));
    }

    #[tokio::test]
    async fn diamond_is_not_a_cycle() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let top = seed_task(&db, project, "top").await;
        let left = seed_task(&db, project, "left").await;
        let right = seed_task(&db, project, "right").await;
        let bottom = seed_task(&db, project, "bottom").await;
        let svc = PrerequisiteService::new();

        svc.create(&db, top, left).await.unwrap();
        svc.create(&db, top, right).await.unwrap();
        svc.create(&db, left, bottom).await.unwrap();
        svc.create(&db, right, bottom).await.unwrap();

        assert_eq!(svc.list(&db, top).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_reopens_the_edge() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let a = seed_task(&db, project, "a").await;
        let b = seed_task(&db, project, "b").await;
        let svc = PrerequisiteService::new();

        svc.create(&db, a, b).await.unwrap();
        svc.delete(&db, a, b).await.unwrap();
        // Gone from the graph, so the reverse edge is legal again.
        svc.create(&db, b, a).await.unwrap();

        let err = svc.delete(&db, a, b).await.unwrap_err();
        assert!(matches!(err, PrerequisiteServiceError::EdgeNotFound));
    }

    #[tokio::test]
    async fn incomplete_prerequisites_gate_progress() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let a = seed_task(&db, project, "a").await;
        let b = seed_task(&db, project, "b").await;
        let svc = PrerequisiteService::new();

        svc.create(&db, a, b).await.unwrap();
        let err = svc.ensure_prerequisites_complete(&db, a).await.unwrap_err();
        assert!(matches!(
            err,
            PrerequisiteServiceError::IncompletePrerequisites(1)
        ));

        Task::update_status(&db, b, TaskStatus::Completed).await.unwrap();
        svc.ensure_prerequisites_complete(&db, a).await.unwrap();
        assert!(svc.list_incomplete(&db, a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn available_flags_linked_and_cyclic_candidates() {
        let db = setup_db().await;
        let project = seed_project(&db, "p").await;
        let a = seed_task(&db, project, "a").await;
        let b = seed_task(&db, project, "b").await;
        let c = seed_task(&db, project, "c").await;
        let svc = PrerequisiteService::new();

        // b depends on a, so for a: b cannot be added (cycle), c can.
        svc.create(&db, b, a).await.unwrap();

        let available = svc.available(&db, a).await.unwrap();
        assert_eq!(available.len(), 2);
        let b_entry = available.iter().find(|t| t.id == b).unwrap();
        assert!(!b_entry.is_prerequisite);
        assert!(!b_entry.can_add);
        let c_entry = available.iter().find(|t| t.id == c).unwrap();
        assert!(!c_entry.is_prerequisite);
        assert!(c_entry.can_add);

        let available_for_b = svc.available(&db, b).await.unwrap();
        let a_entry = available_for_b.iter().find(|t| t.id == a).unwrap();
        assert!(a_entry.is_prerequisite);
        assert!(!a_entry.can_add);
    }
}
