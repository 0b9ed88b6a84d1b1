use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::project,
    models::ids,
    types::ProjectStatus,
};

pub const PROJECT_PAGE_SIZE: u64 = 10;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub total_cost: f64,
    #[ts(type = "Date | null")]
    pub completion_date: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Manager-editable fields. Status, total cost and completion date are
/// owned by the aggregator and have no direct update path.
#[derive(Debug, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Project {
    async fn from_model<C: ConnectionTrait>(db: &C, model: project::Model) -> Result<Self, DbErr> {
        let created_by = match model.created_by {
            Some(id) => ids::user_uuid_by_id(db, id).await?,
            None => None,
        };
        Ok(Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            status: model.status,
            total_cost: model.total_cost,
            completion_date: model.completion_date,
            created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        search: Option<&str>,
        page: Option<u64>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut select = project::Entity::find().order_by_desc(project::Column::CreatedAt);
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(project::Column::Name.contains(search))
                    .add(project::Column::Description.contains(search)),
            );
        }
        if let Some(page) = page {
            select = select
                .offset(page.saturating_sub(1) * PROJECT_PAGE_SIZE)
                .limit(PROJECT_PAGE_SIZE);
        }

        let models = select.all(db).await?;
        let mut projects = Vec::with_capacity(models.len());
        for model in models {
            projects.push(Self::from_model(db, model).await?);
        }
        Ok(projects)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        project_id: Uuid,
    ) -> Result<Self, DbErr> {
        let created_by = match data.created_by {
            Some(id) => ids::user_id_by_uuid(db, id)
                .await?
                .ok_or(DbErr::RecordNotFound("User not found".to_string()))
                .map(Some)?,
            None => None,
        };

        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(project_id),
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            status: Set(ProjectStatus::Pending),
            total_cost: Set(0.0),
            completion_date: Set(None),
            created_by: Set(created_by),
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
        payload: &UpdateProject,
    ) -> Result<Self, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let mut active: project::ActiveModel = record.into();
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Self::from_model(db, updated).await
    }

    /// Persists a derived status. The completion timestamp is stamped only
    /// when the project lands on `Completed`; it is cleared when the
    /// project moves back out of that state.
    pub async fn set_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: ProjectStatus,
    ) -> Result<Self, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let mut active: project::ActiveModel = record.into();
        active.status = Set(status);
        active.completion_date = Set(match status {
            ProjectStatus::Completed => Some(Utc::now()),
            _ => None,
        });
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Self::from_model(db, updated).await
    }

    pub async fn add_total_cost<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        delta: f64,
    ) -> Result<(), DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let total = record.total_cost + delta;
        let mut active: project::ActiveModel = record.into();
        active.total_cost = Set(total);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    pub async fn set_total_cost<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        total_cost: f64,
    ) -> Result<(), DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let mut active: project::ActiveModel = record.into();
        active.total_cost = Set(total_cost);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    pub async fn all_ids<C: ConnectionTrait>(db: &C) -> Result<Vec<Uuid>, DbErr> {
        project::Entity::find()
            .select_only()
            .column(project::Column::Uuid)
            .into_tuple()
            .all(db)
            .await
    }
}
