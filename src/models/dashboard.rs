use serde::Serialize;
use utoipa::ToSchema;

use super::event::Event;
use super::project::Project;
use super::task::Task;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardTask {
    #[serde(flatten)]
    pub task: Task,
    pub project_title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub projects: Vec<Project>,
    pub tasks: Vec<DashboardTask>,
    pub events: Vec<Event>,
}
