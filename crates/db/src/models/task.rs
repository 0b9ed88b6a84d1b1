use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{task, user},
    models::{ids, user::User},
    types::TaskStatus,
};

pub const TASK_PAGE_SIZE: u64 = 10;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "Date | null")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub end_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub is_active: bool,
    pub status: TaskStatus,
    pub cost: f64,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// Task joined with its assignee's display name for list screens.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TaskWithAssignee {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub assignee_name: Option<String>,
}

impl std::ops::Deref for TaskWithAssignee {
    type Target = Task;
    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "Date | null")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub end_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

impl CreateTask {
    pub fn from_name_description(
        project_id: Uuid,
        name: String,
        description: Option<String>,
    ) -> Self {
        Self {
            project_id,
            name,
            description,
            start_date: None,
            end_date: None,
            assigned_to: None,
            status: Some(TaskStatus::Pending),
        }
    }
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub description: Option<String>,
    #[ts(type = "Date | null")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub end_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub is_active: Option<bool>,
    pub status: Option<TaskStatus>,
}

impl Task {
    pub(crate) async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: task::Model,
    ) -> Result<Self, DbErr> {
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let assigned_to = match model.assigned_to {
            Some(id) => ids::user_uuid_by_id(db, id).await?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            project_id,
            name: model.name,
            description: model.description,
            start_date: model.start_date,
            end_date: model.end_date,
            assigned_to,
            is_active: model.is_active,
            status: model.status,
            cost: model.cost,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    /// Display-only check: past its end date without being completed.
    /// Never persisted back into the status column.
    pub fn is_overdue(&self) -> bool {
        match self.end_date {
            Some(end) => self.status != TaskStatus::Completed && end < Utc::now(),
            None => false,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_with_assignee<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<TaskWithAssignee>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;
        let model = match record {
            Some(model) => model,
            None => return Ok(None),
        };
        let assignee_name = match model.assigned_to {
            Some(id) => user::Entity::find_by_id(id)
                .one(db)
                .await?
                .map(|u| User::from_model(u).full_name()),
            None => None,
        };
        let task = Self::from_model(db, model).await?;
        Ok(Some(TaskWithAssignee {
            task,
            assignee_name,
        }))
    }

    pub async fn find_by_project_id<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<TaskWithAssignee>, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let models = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .order_by_desc(task::Column::CreatedAt)
            .all(db)
            .await?;

        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            let assignee_name = match model.assigned_to {
                Some(id) => user::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .map(|u| User::from_model(u).full_name()),
                None => None,
            };
            let task = Self::from_model(db, model).await?;
            tasks.push(TaskWithAssignee {
                task,
                assignee_name,
            });
        }
        Ok(tasks)
    }

    /// Member dashboard listing: tasks assigned to a user, filtered by an
    /// optional case-insensitive search over name/description and either
    /// an exact status or everything not yet completed, paged ten at a
    /// time. Sorted by due date so overdue work surfaces first.
    pub async fn find_by_assignee<C: ConnectionTrait>(
        db: &C,
        assignee: Uuid,
        search: Option<&str>,
        status: Option<TaskStatus>,
        exclude_completed: bool,
        page: Option<u64>,
    ) -> Result<Vec<Self>, DbErr> {
        let user_row_id = match ids::user_id_by_uuid(db, assignee).await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let mut select = task::Entity::find()
            .filter(task::Column::AssignedTo.eq(user_row_id))
            .order_by_asc(task::Column::EndDate);
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(task::Column::Name.contains(search))
                    .add(task::Column::Description.contains(search)),
            );
        }
        if let Some(status) = status {
            select = select.filter(task::Column::Status.eq(status));
        } else if exclude_completed {
            select = select.filter(task::Column::Status.ne(TaskStatus::Completed));
        }
        if let Some(page) = page {
            select = select
                .offset(page.saturating_sub(1) * TASK_PAGE_SIZE)
                .limit(TASK_PAGE_SIZE);
        }

        let models = select.all(db).await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, data.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let assigned_to = match data.assigned_to {
            Some(id) => ids::user_id_by_uuid(db, id)
                .await?
                .ok_or(DbErr::RecordNotFound("User not found".to_string()))
                .map(Some)?,
            None => None,
        };

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            project_id: Set(project_row_id),
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            start_date: Set(data.start_date),
            end_date: Set(data.end_date),
            assigned_to: Set(assigned_to),
            is_active: Set(true),
            status: Set(data.status.unwrap_or_default()),
            cost: Set(0.0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateTask,
    ) -> Result<Self, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let assigned_to = match payload.assigned_to {
            Some(id) => ids::user_id_by_uuid(db, id)
                .await?
                .ok_or(DbErr::RecordNotFound("User not found".to_string()))
                .map(Some)?,
            None => record.assigned_to,
        };

        let mut active: task::ActiveModel = record.into();
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        if payload.start_date.is_some() {
            active.start_date = Set(payload.start_date);
        }
        if payload.end_date.is_some() {
            active.end_date = Set(payload.end_date);
        }
        active.assigned_to = Set(assigned_to);
        if let Some(is_active) = payload.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Self::from_model(db, updated).await
    }

    pub async fn update_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Self, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let mut active: task::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Self::from_model(db, updated).await
    }

    pub async fn add_cost<C: ConnectionTrait>(db: &C, id: Uuid, delta: f64) -> Result<(), DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let cost = record.cost + delta;
        let mut active: task::ActiveModel = record.into();
        active.cost = Set(cost);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    pub async fn set_cost<C: ConnectionTrait>(db: &C, id: Uuid, cost: f64) -> Result<(), DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;

        let mut active: task::ActiveModel = record.into();
        active.cost = Set(cost);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    pub async fn statuses_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<TaskStatus>, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        task::Entity::find()
            .select_only()
            .column(task::Column::Status)
            .filter(task::Column::ProjectId.eq(project_row_id))
            .into_tuple()
            .all(db)
            .await
    }

    pub async fn count_filtered<C: ConnectionTrait>(
        db: &C,
        assignee: Option<Uuid>,
        status: Option<TaskStatus>,
    ) -> Result<u64, DbErr> {
        let mut select = task::Entity::find();
        if let Some(assignee) = assignee {
            let user_row_id = match ids::user_id_by_uuid(db, assignee).await? {
                Some(id) => id,
                None => return Ok(0),
            };
            select = select.filter(task::Column::AssignedTo.eq(user_row_id));
        }
        if let Some(status) = status {
            select = select.filter(task::Column::Status.eq(status));
        }
        select.count(db).await
    }

    pub async fn count_overdue<C: ConnectionTrait>(
        db: &C,
        assignee: Option<Uuid>,
    ) -> Result<u64, DbErr> {
        let mut select = task::Entity::find()
            .filter(task::Column::Status.ne(TaskStatus::Completed))
            .filter(task::Column::EndDate.lt(Utc::now()));
        if let Some(assignee) = assignee {
            let user_row_id = match ids::user_id_by_uuid(db, assignee).await? {
                Some(id) => id,
                None => return Ok(0),
            };
            select = select.filter(task::Column::AssignedTo.eq(user_row_id));
        }
        select.count(db).await
    }

    pub async fn count_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<u64, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let mut select = task::Entity::find().filter(task::Column::ProjectId.eq(project_row_id));
        if let Some(status) = status {
            select = select.filter(task::Column::Status.eq(status));
        }
        select.count(db).await
    }

    /// Distinct projects that have at least one task assigned to the user.
    pub async fn project_ids_by_assignee<C: ConnectionTrait>(
        db: &C,
        assignee: Uuid,
    ) -> Result<Vec<Uuid>, DbErr> {
        let user_row_id = match ids::user_id_by_uuid(db, assignee).await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        let row_ids: Vec<i64> = task::Entity::find()
            .select_only()
            .column(task::Column::ProjectId)
            .filter(task::Column::AssignedTo.eq(user_row_id))
            .distinct()
            .into_tuple()
            .all(db)
            .await?;

        let mut project_ids = Vec::with_capacity(row_ids.len());
        for row_id in row_ids {
            if let Some(uuid) = ids::project_uuid_by_id(db, row_id).await? {
                project_ids.push(uuid);
            }
        }
        Ok(project_ids)
    }
}
