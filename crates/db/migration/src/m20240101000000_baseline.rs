use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Users::Table)
                    .col(pk_id_col(manager, Users::Id))
                    .col(uuid_col(Users::Uuid))
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(ColumnDef::new(Users::FirstName).string().not_null().default(Expr::val("")))
                    .col(ColumnDef::new(Users::LastName).string().not_null().default(Expr::val("")))
                    .col(ColumnDef::new(Users::JobTitle).string())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("member")),
                    )
                    .col(
                        ColumnDef::new(Users::HourlyRate)
                            .double()
                            .not_null()
                            .default(Expr::val(0.0)),
                    )
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_uuid")
                    .table(Users::Table)
                    .col(Users::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Projects::Table)
                    .col(pk_id_col(manager, Projects::Id))
                    .col(uuid_col(Projects::Uuid))
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("pending")),
                    )
                    .col(
                        ColumnDef::new(Projects::TotalCost)
                            .double()
                            .not_null()
                            .default(Expr::val(0.0)),
                    )
                    .col(ColumnDef::new(Projects::CompletionDate).timestamp())
                    .col(fk_id_nullable_col(manager, Projects::CreatedBy))
                    .col(timestamp_col(Projects::CreatedAt))
                    .col(timestamp_col(Projects::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_created_by")
                            .from(Projects::Table, Projects::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_uuid")
                    .table(Projects::Table)
                    .col(Projects::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_status")
                    .table(Projects::Table)
                    .col(Projects::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(fk_id_col(manager, Tasks::ProjectId))
                    .col(ColumnDef::new(Tasks::Name).string().not_null())
                    .col(ColumnDef::new(Tasks::Description).text())
                    .col(ColumnDef::new(Tasks::StartDate).timestamp())
                    .col(ColumnDef::new(Tasks::EndDate).timestamp())
                    .col(fk_id_nullable_col(manager, Tasks::AssignedTo))
                    .col(
                        ColumnDef::new(Tasks::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("pending")),
                    )
                    .col(
                        ColumnDef::new(Tasks::Cost)
                            .double()
                            .not_null()
                            .default(Expr::val(0.0)),
                    )
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_project_id")
                            .from(Tasks::Table, Tasks::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_assigned_to")
                            .from(Tasks::Table, Tasks::AssignedTo)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_project_id")
                    .table(Tasks::Table)
                    .col(Tasks::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_status")
                    .table(Tasks::Table)
                    .col(Tasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_assigned_to")
                    .table(Tasks::Table)
                    .col(Tasks::AssignedTo)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Prerequisites::Table)
                    .col(pk_id_col(manager, Prerequisites::Id))
                    .col(uuid_col(Prerequisites::Uuid))
                    .col(fk_id_col(manager, Prerequisites::TaskId))
                    .col(fk_id_col(manager, Prerequisites::PrerequisiteTaskId))
                    .col(timestamp_col(Prerequisites::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prerequisites_task_id")
                            .from(Prerequisites::Table, Prerequisites::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prerequisites_prerequisite_task_id")
                            .from(Prerequisites::Table, Prerequisites::PrerequisiteTaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_prerequisites_uuid")
                    .table(Prerequisites::Table)
                    .col(Prerequisites::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_prerequisites_task_id")
                    .table(Prerequisites::Table)
                    .col(Prerequisites::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_prerequisites_prerequisite_task_id")
                    .table(Prerequisites::Table)
                    .col(Prerequisites::PrerequisiteTaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_prerequisites_unique")
                    .table(Prerequisites::Table)
                    .col(Prerequisites::TaskId)
                    .col(Prerequisites::PrerequisiteTaskId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(WorkHours::Table)
                    .col(pk_id_col(manager, WorkHours::Id))
                    .col(uuid_col(WorkHours::Uuid))
                    .col(fk_id_col(manager, WorkHours::TaskId))
                    .col(fk_id_nullable_col(manager, WorkHours::RecordedBy))
                    .col(ColumnDef::new(WorkHours::Hours).integer().not_null())
                    .col(ColumnDef::new(WorkHours::Minutes).integer().not_null())
                    .col(ColumnDef::new(WorkHours::HourlyRate).double().not_null())
                    .col(ColumnDef::new(WorkHours::RecordedDate).timestamp().not_null())
                    .col(
                        ColumnDef::new(WorkHours::Approved)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_col(WorkHours::CreatedAt))
                    .col(timestamp_col(WorkHours::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_work_hours_task_id")
                            .from(WorkHours::Table, WorkHours::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_work_hours_recorded_by")
                            .from(WorkHours::Table, WorkHours::RecordedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_work_hours_uuid")
                    .table(WorkHours::Table)
                    .col(WorkHours::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_work_hours_task_id")
                    .table(WorkHours::Table)
                    .col(WorkHours::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_work_hours_approved")
                    .table(WorkHours::Table)
                    .col(WorkHours::Approved)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_work_hours_recorded_by")
                    .table(WorkHours::Table)
                    .col(WorkHours::RecordedBy)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TaskComments::Table)
                    .col(pk_id_col(manager, TaskComments::Id))
                    .col(uuid_col(TaskComments::Uuid))
                    .col(fk_id_col(manager, TaskComments::TaskId))
                    .col(fk_id_nullable_col(manager, TaskComments::CommentedBy))
                    .col(ColumnDef::new(TaskComments::Comment).text().not_null())
                    .col(timestamp_col(TaskComments::CommentedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_comments_task_id")
                            .from(TaskComments::Table, TaskComments::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_comments_commented_by")
                            .from(TaskComments::Table, TaskComments::CommentedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_comments_uuid")
                    .table(TaskComments::Table)
                    .col(TaskComments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_comments_task_id")
                    .table(TaskComments::Table)
                    .col(TaskComments::TaskId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaskComments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WorkHours::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Prerequisites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Uuid,
    Email,
    Password,
    FirstName,
    LastName,
    JobTitle,
    Role,
    HourlyRate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    Status,
    TotalCost,
    CompletionDate,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    ProjectId,
    Name,
    Description,
    StartDate,
    EndDate,
    AssignedTo,
    IsActive,
    Status,
    Cost,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Prerequisites {
    Table,
    Id,
    Uuid,
    TaskId,
    PrerequisiteTaskId,
    CreatedAt,
}

#[derive(Iden)]
enum WorkHours {
    Table,
    Id,
    Uuid,
    TaskId,
    RecordedBy,
    Hours,
    Minutes,
    HourlyRate,
    RecordedDate,
    Approved,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TaskComments {
    Table,
    Id,
    Uuid,
    TaskId,
    CommentedBy,
    Comment,
    CommentedAt,
}
