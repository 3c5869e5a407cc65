pub mod auth;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;
