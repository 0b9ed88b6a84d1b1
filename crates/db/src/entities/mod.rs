pub mod prerequisite;
pub mod project;
pub mod task;
pub mod task_comment;
pub mod user;
pub mod work_hour;
