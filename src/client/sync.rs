// File: ./src/client/sync.rs
//! Replays the reconciled database against the remote service.
//!
//! Each task ends in exactly one [`SyncOutcome`]. Remote state is fetched once
//! when the [`Importer`] connects; the duplicate check and the list cache both
//! work from that snapshot.
use crate::client::service::{RemoteList, RemoteTask, ServiceError, TaskService, Timeline};
use crate::journal::ImportRecord;
use crate::model::{Database, SourceObject};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub const NOTE_TITLE: &str = "Note from Things";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOutcome {
    SkippedInvalid,
    SkippedDeleted,
    SkippedDuplicate,
    Imported,
    /// The create call itself was refused; nothing exists remotely.
    Failed,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    /// Source id and outcome, in dump order.
    pub outcomes: Vec<(String, SyncOutcome)>,
    pub created_lists: Vec<String>,
    pub enrichment_failures: usize,
}

impl SyncReport {
    pub fn count(&self, outcome: SyncOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn outcome_of(&self, source_id: &str) -> Option<SyncOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, o)| *o)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} already present, {} deleted, {} invalid",
            self.count(SyncOutcome::Imported),
            self.count(SyncOutcome::SkippedDuplicate),
            self.count(SyncOutcome::SkippedDeleted),
            self.count(SyncOutcome::SkippedInvalid),
        )?;
        let failed = self.count(SyncOutcome::Failed);
        if failed > 0 {
            write!(f, ", {} failed", failed)?;
        }
        if !self.created_lists.is_empty() {
            write!(f, "; created lists: {}", self.created_lists.join(", "))?;
        }
        Ok(())
    }
}

pub struct Importer {
    /// List name -> remote id. Smart lists never enter here.
    lists: HashMap<String, String>,
    existing: HashSet<String>,
    series_count: usize,
    dry_run: bool,
    /// Tasks created and kept so far. Empty on a dry run.
    imported: Vec<ImportRecord>,
}

impl Importer {
    pub fn new(lists: Vec<RemoteList>, tasks: Vec<RemoteTask>, dry_run: bool) -> Self {
        let lists = lists
            .into_iter()
            .filter(|l| !l.smart)
            .map(|l| (l.name, l.id))
            .collect();
        let series_count = tasks.len();
        let existing = tasks.into_iter().map(|t| t.name).collect();
        Self {
            lists,
            existing,
            series_count,
            dry_run,
            imported: Vec::new(),
        }
    }

    /// Fetches the lists and task series that already exist remotely.
    pub async fn connect<S: TaskService>(service: &S, dry_run: bool) -> Result<Self, ServiceError> {
        let lists = service.lists().await?;
        let tasks = service.task_series().await?;
        log::info!(
            "Fetched {} lists and {} task series",
            lists.len(),
            tasks.len()
        );
        Ok(Self::new(lists, tasks, dry_run))
    }

    pub fn series_count(&self) -> usize {
        self.series_count
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Hands over the records of created tasks, including those made before
    /// a run was aborted.
    pub fn take_imported(&mut self) -> Vec<ImportRecord> {
        std::mem::take(&mut self.imported)
    }

    /// Decides the outcome for tasks that need no remote call; `None` means
    /// the task must be created.
    pub fn classify(&self, obj: &SourceObject) -> Option<SyncOutcome> {
        if !obj.is_valid() {
            Some(SyncOutcome::SkippedInvalid)
        } else if obj.deleted {
            Some(SyncOutcome::SkippedDeleted)
        } else if self.existing.contains(obj.title_or_empty()) {
            Some(SyncOutcome::SkippedDuplicate)
        } else {
            None
        }
    }

    /// Processes every task of `db` in dump order on one timeline.
    ///
    /// Only list creation failures abort the run.
    pub async fn run<S: TaskService>(&mut self, service: &S, db: &Database) -> Result<SyncReport> {
        let timeline = service
            .create_timeline()
            .await
            .context("Failed to create a timeline")?;
        let mut report = SyncReport::default();

        for obj in db.tasks() {
            let outcome = match self.classify(obj) {
                Some(SyncOutcome::SkippedDuplicate) => {
                    println!(
                        "Skipping task {}: Already in Remember The Milk",
                        obj.title_or_empty()
                    );
                    SyncOutcome::SkippedDuplicate
                }
                Some(outcome) => outcome,
                None => self.import_one(service, &timeline, obj, &mut report).await?,
            };
            report.outcomes.push((obj.id.clone(), outcome));
        }
        Ok(report)
    }

    async fn ensure_list<S: TaskService>(
        &mut self,
        service: &S,
        timeline: &Timeline,
        name: &str,
        report: &mut SyncReport,
    ) -> Result<String> {
        if let Some(id) = self.lists.get(name) {
            return Ok(id.clone());
        }
        println!("Creating list {}", name);
        let list = service
            .add_list(timeline, name)
            .await
            .with_context(|| format!("Failed to create list '{}'", name))?;
        self.lists.insert(name.to_string(), list.id.clone());
        report.created_lists.push(name.to_string());
        Ok(list.id)
    }

    async fn import_one<S: TaskService>(
        &mut self,
        service: &S,
        timeline: &Timeline,
        obj: &SourceObject,
        report: &mut SyncReport,
    ) -> Result<SyncOutcome> {
        let list_id = self
            .ensure_list(service, timeline, &obj.list_name, report)
            .await?;

        let title = obj.title_or_empty();
        println!("Adding task {} to Remember The Milk", title);
        let task = match service.add_task(timeline, &list_id, title).await {
            Ok(task) => task,
            Err(e) => {
                log::error!("Failed to create task {}: {}", obj, e);
                return Ok(SyncOutcome::Failed);
            }
        };

        let mut failures = Vec::new();
        if !obj.tag_names.is_empty()
            && let Err(e) = service.add_tags(timeline, &task, &obj.tag_names).await
        {
            failures.push(("tags", e));
        }
        if let Some(text) = obj.note()
            && let Err(e) = service.add_note(timeline, &task, NOTE_TITLE, text).await
        {
            failures.push(("note", e));
        }
        if let Some(due) = obj.due
            && let Err(e) = service.set_due_date(timeline, &task, due).await
        {
            failures.push(("due date", e));
        }
        if obj.is_completed()
            && let Err(e) = service.complete(timeline, &task).await
        {
            failures.push(("completion", e));
        }
        for (what, e) in &failures {
            log::warn!("Could not set {} on {}: {}", what, obj, e);
        }
        report.enrichment_failures += failures.len();

        if self.dry_run {
            if let Err(e) = service.delete_task(timeline, &task).await {
                log::warn!("Dry run: could not delete {}: {}", obj, e);
            }
        } else {
            self.imported.push(ImportRecord {
                source_id: obj.id.clone(),
                task,
            });
        }
        Ok(SyncOutcome::Imported)
    }
}
