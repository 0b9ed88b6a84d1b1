pub mod comments;
pub mod health;
pub mod prerequisites;
pub mod projects;
pub mod summary;
pub mod tasks;
pub mod users;
pub mod work_hours;
