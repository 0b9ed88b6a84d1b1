use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "work_hours")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub task_id: i64,
    pub recorded_by: Option<i64>,
    pub hours: i32,
    pub minutes: i32,
    /// Recorder's hourly rate captured at creation time. Cost math always
    /// uses this snapshot, never the user's current rate.
    pub hourly_rate: f64,
    pub recorded_date: DateTimeUtc,
    pub approved: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
