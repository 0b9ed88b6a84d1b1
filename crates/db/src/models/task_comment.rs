use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{task_comment, user},
    models::{ids, user::User},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TaskComment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub commented_by: Option<Uuid>,
    pub commenter_name: Option<String>,
    pub comment: String,
    #[ts(type = "Date")]
    pub commented_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTaskComment {
    pub task_id: Uuid,
    pub commented_by: Option<Uuid>,
    pub comment: String,
}

impl TaskComment {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: task_comment::Model,
    ) -> Result<Self, DbErr> {
        let task_id = ids::task_uuid_by_id(db, model.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let (commented_by, commenter_name) = match model.commented_by {
            Some(id) => match user::Entity::find_by_id(id).one(db).await? {
                Some(commenter) => {
                    let commenter = User::from_model(commenter);
                    let name = commenter.full_name();
                    (Some(commenter.id), Some(name))
                }
                None => (None, None),
            },
            None => (None, None),
        };
        Ok(Self {
            id: model.uuid,
            task_id,
            commented_by,
            commenter_name,
            comment: model.comment,
            commented_at: model.commented_at,
        })
    }

    /// Newest comments first.
    pub async fn find_by_task_id<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let task_row_id = match ids::task_id_by_uuid(db, task_id).await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let models = task_comment::Entity::find()
            .filter(task_comment::Column::TaskId.eq(task_row_id))
            .order_by_desc(task_comment::Column::CommentedAt)
            .all(db)
            .await?;

        let mut comments = Vec::with_capacity(models.len());
        for model in models {
            comments.push(Self::from_model(db, model).await?);
        }
        Ok(comments)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTaskComment,
        comment_id: Uuid,
    ) -> Result<Self, DbErr> {
        let task_row_id = ids::task_id_by_uuid(db, data.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let commented_by = match data.commented_by {
            Some(id) => ids::user_id_by_uuid(db, id)
                .await?
                .ok_or(DbErr::RecordNotFound("User not found".to_string()))
                .map(Some)?,
            None => None,
        };

        let active = task_comment::ActiveModel {
            uuid: Set(comment_id),
            task_id: Set(task_row_id),
            commented_by: Set(commented_by),
            comment: Set(data.comment.clone()),
            commented_at: Set(Utc::now()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }
}
