pub mod dashboard;
pub mod event;
pub mod project;
pub mod task;
pub mod user;
