// File: ./src/client/service.rs
//! The remote operations the importer relies on.
//!
//! `RtmClient` talks to the real REST API; `MemoryService` keeps everything
//! in process and is what the tests drive.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with `stat="fail"`.
    #[error("API error {code}: {message}")]
    Api { code: u32, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Undo handle shared by every mutating call of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteList {
    pub id: String,
    pub name: String,
    /// Smart lists are saved searches; tasks can't be added to them.
    pub smart: bool,
}

/// Addresses a single task: the service needs all three ids for any change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub name: String,
    pub list_id: String,
    pub series_id: String,
    pub task_id: String,
}

#[allow(async_fn_in_trait)]
pub trait TaskService {
    async fn lists(&self) -> Result<Vec<RemoteList>, ServiceError>;

    /// Every task series in the account, across all lists.
    async fn task_series(&self) -> Result<Vec<RemoteTask>, ServiceError>;

    async fn create_timeline(&self) -> Result<Timeline, ServiceError>;

    async fn add_list(&self, timeline: &Timeline, name: &str) -> Result<RemoteList, ServiceError>;

    async fn add_task(
        &self,
        timeline: &Timeline,
        list_id: &str,
        name: &str,
    ) -> Result<RemoteTask, ServiceError>;

    async fn add_tags(
        &self,
        timeline: &Timeline,
        task: &RemoteTask,
        tags: &[String],
    ) -> Result<(), ServiceError>;

    async fn add_note(
        &self,
        timeline: &Timeline,
        task: &RemoteTask,
        title: &str,
        text: &str,
    ) -> Result<(), ServiceError>;

    async fn set_due_date(
        &self,
        timeline: &Timeline,
        task: &RemoteTask,
        due: NaiveDate,
    ) -> Result<(), ServiceError>;

    async fn complete(&self, timeline: &Timeline, task: &RemoteTask) -> Result<(), ServiceError>;

    async fn delete_task(&self, timeline: &Timeline, task: &RemoteTask)
    -> Result<(), ServiceError>;
}
