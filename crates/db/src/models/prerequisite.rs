use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{entities::prerequisite, models::ids};

/// A single prerequisite edge, keyed by the public task ids.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Prerequisite {
    pub id: Uuid,
    pub task_id: Uuid,
    pub prerequisite_task_id: Uuid,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreatePrerequisite {
    pub task_id: Uuid,
    pub prerequisite_task_id: Uuid,
}

impl Prerequisite {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: prerequisite::Model,
    ) -> Result<Self, DbErr> {
        let task_id = ids::task_uuid_by_id(db, model.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let prerequisite_task_id = ids::task_uuid_by_id(db, model.prerequisite_task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            task_id,
            prerequisite_task_id,
            created_at: model.created_at,
        })
    }

    pub async fn exists<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        prerequisite_task_id: Uuid,
    ) -> Result<bool, DbErr> {
        let (Some(task_row_id), Some(prereq_row_id)) = (
            ids::task_id_by_uuid(db, task_id).await?,
            ids::task_id_by_uuid(db, prerequisite_task_id).await?,
        ) else {
            return Ok(false);
        };

        let count = prerequisite::Entity::find()
            .filter(prerequisite::Column::TaskId.eq(task_row_id))
            .filter(prerequisite::Column::PrerequisiteTaskId.eq(prereq_row_id))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        prerequisite_task_id: Uuid,
        edge_id: Uuid,
    ) -> Result<Self, DbErr> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let prereq_row_id = ids::task_id_by_uuid(db, prerequisite_task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let active = prerequisite::ActiveModel {
            uuid: Set(edge_id),
            task_id: Set(task_row_id),
            prerequisite_task_id: Set(prereq_row_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        prerequisite_task_id: Uuid,
    ) -> Result<u64, DbErr> {
        let (Some(task_row_id), Some(prereq_row_id)) = (
            ids::task_id_by_uuid(db, task_id).await?,
            ids::task_id_by_uuid(db, prerequisite_task_id).await?,
        ) else {
            return Ok(0);
        };

        let result = prerequisite::Entity::delete_many()
            .filter(prerequisite::Column::TaskId.eq(task_row_id))
            .filter(prerequisite::Column::PrerequisiteTaskId.eq(prereq_row_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Tasks the given task directly depends on, in insertion order.
    pub async fn direct_prerequisite_ids<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Vec<Uuid>, DbErr> {
        let task_row_id = match ids::task_id_by_uuid(db, task_id).await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let models = prerequisite::Entity::find()
            .filter(prerequisite::Column::TaskId.eq(task_row_id))
            .order_by_asc(prerequisite::Column::CreatedAt)
            .all(db)
            .await?;

        let mut prereq_ids = Vec::with_capacity(models.len());
        for model in models {
            if let Some(uuid) = ids::task_uuid_by_id(db, model.prerequisite_task_id).await? {
                prereq_ids.push(uuid);
            }
        }
        Ok(prereq_ids)
    }

}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use crate::models::{
        project::{CreateProject, Project},
        task::{CreateTask, Task},
    };

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn make_task(db: &sea_orm::DatabaseConnection, project_id: Uuid, name: &str) -> Uuid {
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
    async fn edge_roundtrip() {
        let db = setup_db().await;
        let project_id = Uuid::new_v4();
        Project::create(
            &db,
            &CreateProject {
                name: "p".to_string(),
                description: None,
                created_by: None,
            },
            project_id,
        )
        .await
        .unwrap();

        let a = make_task(&db, project_id, "a").await;
        let b = make_task(&db, project_id, "b").await;

        assert!(!Prerequisite::exists(&db, a, b).await.unwrap());
        Prerequisite::create(&db, a, b, Uuid::new_v4()).await.unwrap();
        assert!(Prerequisite::exists(&db, a, b).await.unwrap());
        assert!(!Prerequisite::exists(&db, b, a).await.unwrap());

        assert_eq!(
            Prerequisite::direct_prerequisite_ids(&db, a).await.unwrap(),
            vec![b]
        );
        assert!(
            Prerequisite::direct_prerequisite_ids(&db, b)
                .await
                .unwrap()
                .is_empty()
        );

        assert_eq!(Prerequisite::delete(&db, a, b).await.unwrap(), 1);
        assert_eq!(Prerequisite::delete(&db, a, b).await.unwrap(), 0);
        assert!(!Prerequisite::exists(&db, a, b).await.unwrap());
    }
}
