use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{task, user, work_hour},
    models::{ids, user::User},
};

#[derive(Debug, Error)]
pub enum WorkHourError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Work hour not found")]
    NotFound,
    #[error("Invalid work hour: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct WorkHour {
    pub id: Uuid,
    pub task_id: Uuid,
    pub recorded_by: Option<Uuid>,
    pub hours: i32,
    pub minutes: i32,
    /// Rate snapshotted from the recording user at creation time.
    pub hourly_rate: f64,
    #[ts(type = "Date")]
    pub recorded_date: DateTime<Utc>,
    pub approved: bool,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateWorkHour {
    pub task_id: Uuid,
    pub recorded_by: Uuid,
    pub hours: i32,
    pub minutes: i32,
    #[ts(type = "Date")]
    pub recorded_date: DateTime<Utc>,
}

/// Approved work-hour line for the manager's work-history screen.
#[derive(Debug, Clone, Serialize, TS)]
pub struct WorkHistoryEntry {
    pub task_id: Uuid,
    pub task_name: String,
    #[ts(type = "Date")]
    pub recorded_date: DateTime<Utc>,
    pub hours: i32,
    pub minutes: i32,
    pub recorded_by: Option<String>,
    pub cost: f64,
}

impl WorkHour {
    /// Cost of this entry under its snapshot rate.
    pub fn cost(&self) -> f64 {
        cost_of(self.hours, self.minutes, self.hourly_rate)
    }

    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: work_hour::Model,
    ) -> Result<Self, DbErr> {
        let task_id = ids::task_uuid_by_id(db, model.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let recorded_by = match model.recorded_by {
            Some(id) => ids::user_uuid_by_id(db, id).await?,
            None => None,
        };
        Ok(Self {
            id: model.uuid,
            task_id,
            recorded_by,
            hours: model.hours,
            minutes: model.minutes,
            hourly_rate: model.hourly_rate,
            recorded_date: model.recorded_date,
            approved: model.approved,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = work_hour::Entity::find()
            .filter(work_hour::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_task_id<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let task_row_id = match ids::task_id_by_uuid(db, task_id).await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let models = work_hour::Entity::find()
            .filter(work_hour::Column::TaskId.eq(task_row_id))
            .order_by_desc(work_hour::Column::RecordedDate)
            .all(db)
            .await?;

        let mut hours = Vec::with_capacity(models.len());
        for model in models {
            hours.push(Self::from_model(db, model).await?);
        }
        Ok(hours)
    }

    /// Creates the record with the recorder's current hourly rate frozen
    /// onto it. Later rate edits never touch this snapshot.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateWorkHour,
        work_hour_id: Uuid,
    ) -> Result<Self, WorkHourError> {
        if data.hours < 0 {
            return Err(WorkHourError::Validation(
                "hours must be non-negative".to_string(),
            ));
        }
        if !(0..60).contains(&data.minutes) {
            return Err(WorkHourError::Validation(
                "minutes must be between 0 and 59".to_string(),
            ));
        }

        let task_row_id = ids::task_id_by_uuid(db, data.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let recorder = user::Entity::find()
            .filter(user::Column::Uuid.eq(data.recorded_by))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let now = Utc::now();
        let active = work_hour::ActiveModel {
            uuid: Set(work_hour_id),
            task_id: Set(task_row_id),
            recorded_by: Set(Some(recorder.id)),
            hours: Set(data.hours),
            minutes: Set(data.minutes),
            hourly_rate: Set(recorder.hourly_rate),
            recorded_date: Set(data.recorded_date),
            approved: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn set_approved<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        approved: bool,
    ) -> Result<(), DbErr> {
        let record = work_hour::Entity::find()
            .filter(work_hour::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Work hour not found".to_string()))?;

        let mut active: work_hour::ActiveModel = record.into();
        active.approved = Set(approved);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    /// Sum of approved costs for one task, from the snapshot rates.
    pub async fn approved_cost_by_task<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<f64, DbErr> {
        let task_row_id = match ids::task_id_by_uuid(db, task_id).await? {
            Some(id) => id,
            None => return Ok(0.0),
        };

        let models = work_hour::Entity::find()
            .filter(work_hour::Column::TaskId.eq(task_row_id))
            .filter(work_hour::Column::Approved.eq(true))
            .all(db)
            .await?;

        Ok(models
            .iter()
            .map(|m| cost_of(m.hours, m.minutes, m.hourly_rate))
            .sum())
    }

    /// Sum of every approved cost, optionally scoped to one recorder.
    pub async fn approved_total_cost<C: ConnectionTrait>(
        db: &C,
        recorded_by: Option<Uuid>,
    ) -> Result<f64, DbErr> {
        let mut select = work_hour::Entity::find().filter(work_hour::Column::Approved.eq(true));
        if let Some(recorded_by) = recorded_by {
            let user_row_id = match ids::user_id_by_uuid(db, recorded_by).await? {
                Some(id) => id,
                None => return Ok(0.0),
            };
            select = select.filter(work_hour::Column::RecordedBy.eq(user_row_id));
        }

        let models = select.all(db).await?;
        Ok(models
            .iter()
            .map(|m| cost_of(m.hours, m.minutes, m.hourly_rate))
            .sum())
    }

    pub async fn history_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<WorkHistoryEntry>, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let tasks = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .all(db)
            .await?;

        let mut history = Vec::new();
        for task_model in tasks {
            let entries = work_hour::Entity::find()
                .filter(work_hour::Column::TaskId.eq(task_model.id))
                .filter(work_hour::Column::Approved.eq(true))
                .order_by_desc(work_hour::Column::RecordedDate)
                .all(db)
                .await?;

            for entry in entries {
                let recorded_by = match entry.recorded_by {
                    Some(id) => user::Entity::find_by_id(id)
                        .one(db)
                        .await?
                        .map(|u| User::from_model(u).email),
                    None => None,
                };
                history.push(WorkHistoryEntry {
                    task_id: task_model.uuid,
                    task_name: task_model.name.clone(),
                    recorded_date: entry.recorded_date,
                    hours: entry.hours,
                    minutes: entry.minutes,
                    recorded_by,
                    cost: cost_of(entry.hours, entry.minutes, entry.hourly_rate),
                });
            }
        }
        Ok(history)
    }
}

/// `hours * rate + minutes / 60 * rate`, the one cost formula used for
/// approval, disapproval and every read-side sum.
pub fn cost_of(hours: i32, minutes: i32, rate: f64) -> f64 {
    f64::from(hours) * rate + f64::from(minutes) / 60.0 * rate
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::{
        models::{
            project::{CreateProject, Project},
            task::{CreateTask, Task},
            user::{CreateUser, User},
        },
        types::UserRole,
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_task(db: &sea_orm::DatabaseConnection) -> (Uuid, Uuid) {
        let user_id = Uuid::new_v4();
        User::create(
            db,
            &CreateUser {
                email: "ada@example.com".to_string(),
                password: "secret".to_string(),
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                job_title: None,
                role: Some(UserRole::Member),
                hourly_rate: 40.0,
            },
            user_id,
        )
        .await
        .unwrap();

        let project_id = Uuid::new_v4();
        Project::create(
            db,
            &CreateProject {
                name: "Engine".to_string(),
                description: None,
                created_by: Some(user_id),
            },
            project_id,
        )
        .await
        .unwrap();

        let task_id = Uuid::new_v4();
        Task::create(
            db,
            &CreateTask::from_name_description(project_id, "Cards".to_string(), None),
            task_id,
        )
        .await
        .unwrap();
        (task_id, user_id)
    }

    #[test]
    fn cost_formula_uses_fractional_minutes() {
        assert_eq!(cost_of(2, 30, 40.0), 100.0);
        assert_eq!(cost_of(0, 0, 40.0), 0.0);
        assert_eq!(cost_of(1, 0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn rate_is_snapshotted_at_creation() {
        let db = setup_db().await;
        let (task_id, user_id) = seed_task(&db).await;

        let entry = WorkHour::create(
            &db,
            &CreateWorkHour {
                task_id,
                recorded_by: user_id,
                hours: 2,
                minutes: 30,
                recorded_date: Utc::now(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(entry.hourly_rate, 40.0);
        assert_eq!(entry.cost(), 100.0);

        User::update(
            &db,
            user_id,
            &crate::models::user::UpdateUser {
                first_name: None,
                last_name: None,
                job_title: None,
                hourly_rate: Some(90.0),
                password: None,
            },
        )
        .await
        .unwrap();

        let reloaded = WorkHour::find_by_id(&db, entry.id).await.unwrap().unwrap();
        assert_eq!(reloaded.hourly_rate, 40.0);
        assert_eq!(reloaded.cost(), 100.0);
    }

    #[tokio::test]
    async fn invalid_minutes_are_rejected() {
        let db = setup_db().await;
        let (task_id, user_id) = seed_task(&db).await;

        let err = WorkHour::create(
            &db,
            &CreateWorkHour {
                task_id,
                recorded_by: user_id,
                hours: 1,
                minutes: 60,
                recorded_date: Utc::now(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkHourError::Validation(_)));
    }

    #[tokio::test]
    async fn approved_sums_ignore_pending_entries() {
        let db = setup_db().await;
        let (task_id, user_id) = seed_task(&db).await;

        let mut ids = Vec::new();
        for _ in 0..2 {
            let entry = WorkHour::create(
                &db,
                &CreateWorkHour {
                    task_id,
                    recorded_by: user_id,
                    hours: 1,
                    minutes: 0,
                    recorded_date: Utc::now(),
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
            ids.push(entry.id);
        }

        assert_eq!(WorkHour::approved_cost_by_task(&db, task_id).await.unwrap(), 0.0);

        WorkHour::set_approved(&db, ids[0], true).await.unwrap();
        assert_eq!(WorkHour::approved_cost_by_task(&db, task_id).await.unwrap(), 40.0);
        assert_eq!(
            WorkHour::approved_total_cost(&db, Some(user_id)).await.unwrap(),
            40.0
        );
        assert_eq!(WorkHour::approved_total_cost(&db, None).await.unwrap(), 40.0);
    }
}
