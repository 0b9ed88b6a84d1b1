use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{entities::user, types::UserRole};

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("User not found")]
    NotFound,
    #[error("A user with this email already exists")]
    EmailTaken,
}

/// Public user record. The stored credential never leaves the db crate.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub role: UserRole,
    pub hourly_rate: f64,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub role: Option<UserRole>,
    pub hourly_rate: f64,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub hourly_rate: Option<f64>,
    pub password: Option<String>,
}

impl User {
    pub(crate) fn from_model(model: user::Model) -> Self {
        Self {
            id: model.uuid,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            job_title: model.job_title,
            role: model.role,
            hourly_rate: model.hourly_rate,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn search<C: ConnectionTrait>(
        db: &C,
        query: Option<&str>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut select = user::Entity::find().order_by_asc(user::Column::Email);
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(user::Column::Email.contains(query))
                    .add(user::Column::FirstName.contains(query))
                    .add(user::Column::LastName.contains(query))
                    .add(user::Column::JobTitle.contains(query)),
            );
        }
        let records = select.all(db).await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateUser,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        if Self::find_by_email(db, &data.email).await?.is_some() {
            return Err(UserError::EmailTaken);
        }

        let now = Utc::now();
        let active = user::ActiveModel {
            uuid: Set(user_id),
            email: Set(data.email.clone()),
            password: Set(data.password.clone()),
            first_name: Set(data.first_name.clone().unwrap_or_default()),
            last_name: Set(data.last_name.clone().unwrap_or_default()),
            job_title: Set(data.job_title.clone()),
            role: Set(data.role.unwrap_or_default()),
            hourly_rate: Set(data.hourly_rate),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Rate changes only affect work hours recorded after this call; the
    /// snapshot on existing records is left untouched.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateUser,
    ) -> Result<Self, UserError> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(UserError::NotFound)?;

        let mut active: user::ActiveModel = record.into();
        if let Some(first_name) = payload.first_name.clone() {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = payload.last_name.clone() {
            active.last_name = Set(last_name);
        }
        if payload.job_title.is_some() {
            active.job_title = Set(payload.job_title.clone());
        }
        if let Some(hourly_rate) = payload.hourly_rate {
            active.hourly_rate = Set(hourly_rate);
        }
        if let Some(password) = payload.password.clone() {
            active.password = Set(password);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = user::Entity::delete_many()
            .filter(user::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn member(email: &str, rate: f64) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            password: "secret".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            job_title: None,
            role: Some(UserRole::Member),
            hourly_rate: rate,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let db = setup_db().await;
        User::create(&db, &member("ada@example.com", 40.0), Uuid::new_v4())
            .await
            .unwrap();

        let err = User::create(&db, &member("ada@example.com", 50.0), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn update_changes_rate_for_future_lookups() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        User::create(&db, &member("ada@example.com", 40.0), id)
            .await
            .unwrap();

        let updated = User::update(
            &db,
            id,
            &UpdateUser {
                first_name: None,
                last_name: None,
                job_title: Some("Engineer".to_string()),
                hourly_rate: Some(55.0),
                password: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.hourly_rate, 55.0);
        assert_eq!(updated.job_title.as_deref(), Some("Engineer"));
    }
}
