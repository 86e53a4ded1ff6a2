// File: ./src/client/memory.rs
//! In-process stand-in for the remote service.
//!
//! Calls are recorded under the REST method name they would have used, so
//! tests can assert on exactly what a run would send.
use crate::client::service::{RemoteList, RemoteTask, ServiceError, TaskService, Timeline};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    lists: Vec<RemoteList>,
    tasks: Vec<RemoteTask>,
    calls: Vec<RecordedCall>,
    failing: HashSet<String>,
    next_id: u64,
}

impl MemoryState {
    fn record(&mut self, method: &str, args: Vec<String>) -> Result<(), ServiceError> {
        self.calls.push(RecordedCall {
            method: method.to_string(),
            args,
        });
        if self.failing.contains(method) {
            return Err(ServiceError::Api {
                code: 105,
                message: format!("{} refused", method),
            });
        }
        Ok(())
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

#[derive(Debug, Default)]
pub struct MemoryService {
    state: Mutex<MemoryState>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(self, name: &str, smart: bool) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let id = state.fresh_id();
            state.lists.push(RemoteList {
                id,
                name: name.to_string(),
                smart,
            });
        }
        self
    }

    /// Seeds a task into the named list, creating the list when needed.
    pub fn with_task(self, list: &str, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let list_id = match state.lists.iter().find(|l| l.name == list) {
                Some(l) => l.id.clone(),
                None => {
                    let id = state.fresh_id();
                    state.lists.push(RemoteList {
                        id: id.clone(),
                        name: list.to_string(),
                        smart: false,
                    });
                    id
                }
            };
            let series_id = state.fresh_id();
            let task_id = state.fresh_id();
            state.tasks.push(RemoteTask {
                name: name.to_string(),
                list_id,
                series_id,
                task_id,
            });
        }
        self
    }

    /// Makes every later call to `method` fail with an API error.
    pub fn fail_on(self, method: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failing.insert(method.to_string());
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.iter().filter(|c| c.method == method).count())
            .unwrap_or(0)
    }

    pub fn remote_tasks(&self) -> Vec<RemoteTask> {
        self.state
            .lock()
            .map(|s| s.tasks.clone())
            .unwrap_or_default()
    }

    pub fn remote_lists(&self) -> Vec<RemoteList> {
        self.state
            .lock()
            .map(|s| s.lists.clone())
            .unwrap_or_default()
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ServiceError::Transport("memory service poisoned".to_string()))?;
        f(&mut state)
    }
}

impl TaskService for MemoryService {
    async fn lists(&self) -> Result<Vec<RemoteList>, ServiceError> {
        self.with_state(|s| {
            s.record("rtm.lists.getList", vec![])?;
            Ok(s.lists.clone())
        })
    }

    async fn task_series(&self) -> Result<Vec<RemoteTask>, ServiceError> {
        self.with_state(|s| {
            s.record("rtm.tasks.getList", vec![])?;
            Ok(s.tasks.clone())
        })
    }

    async fn create_timeline(&self) -> Result<Timeline, ServiceError> {
        self.with_state(|s| {
            s.record("rtm.timelines.create", vec![])?;
            Ok(Timeline(s.fresh_id()))
        })
    }

    async fn add_list(&self, _timeline: &Timeline, name: &str) -> Result<RemoteList, ServiceError> {
        self.with_state(|s| {
            s.record("rtm.lists.add", vec![name.to_string()])?;
            let list = RemoteList {
                id: s.fresh_id(),
                name: name.to_string(),
                smart: false,
            };
            s.lists.push(list.clone());
            Ok(list)
        })
    }

    async fn add_task(
        &self,
        _timeline: &Timeline,
        list_id: &str,
        name: &str,
    ) -> Result<RemoteTask, ServiceError> {
        self.with_state(|s| {
            s.record("rtm.tasks.add", vec![list_id.to_string(), name.to_string()])?;
            let task = RemoteTask {
                name: name.to_string(),
                list_id: list_id.to_string(),
                series_id: s.fresh_id(),
                task_id: s.fresh_id(),
            };
            s.tasks.push(task.clone());
            Ok(task)
        })
    }

    async fn add_tags(
        &self,
        _timeline: &Timeline,
        task: &RemoteTask,
        tags: &[String],
    ) -> Result<(), ServiceError> {
        self.with_state(|s| s.record("rtm.tasks.addTags", vec![task.name.clone(), tags.join(",")]))
    }

    async fn add_note(
        &self,
        _timeline: &Timeline,
        task: &RemoteTask,
        title: &str,
        text: &str,
    ) -> Result<(), ServiceError> {
        self.with_state(|s| {
            s.record(
                "rtm.tasks.notes.add",
                vec![task.name.clone(), title.to_string(), text.to_string()],
            )
        })
    }

    async fn set_due_date(
        &self,
        _timeline: &Timeline,
        task: &RemoteTask,
        due: NaiveDate,
    ) -> Result<(), ServiceError> {
        self.with_state(|s| {
            s.record(
                "rtm.tasks.setDueDate",
                vec![task.name.clone(), due.format("%Y-%m-%d").to_string()],
            )
        })
    }

    async fn complete(&self, _timeline: &Timeline, task: &RemoteTask) -> Result<(), ServiceError> {
        self.with_state(|s| s.record("rtm.tasks.complete", vec![task.name.clone()]))
    }

    async fn delete_task(
        &self,
        _timeline: &Timeline,
        task: &RemoteTask,
    ) -> Result<(), ServiceError> {
        self.with_state(|s| {
            s.record("rtm.tasks.delete", vec![task.name.clone()])?;
            s.tasks.retain(|t| t.series_id != task.series_id);
            Ok(())
        })
    }
}
