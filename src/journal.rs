/*
 * things2rtm/src/journal.rs
 *
 * Record of every task a migration created remotely, so `revert` can
 * delete that batch again.
 *
 * All IO goes through an explicit `AppContext`.
 */

use crate::client::service::RemoteTask;
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// Id of the object in Database.xml.
    pub source_id: String,
    #[serde(flatten)]
    pub task: RemoteTask,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Journal {
    pub imported: Vec<ImportRecord>,
}

impl Journal {
    pub fn get_path(ctx: &dyn AppContext) -> Option<PathBuf> {
        ctx.get_journal_path()
    }

    /// Loads without locking. Unreadable files count as empty.
    fn load_internal(path: &PathBuf) -> Self {
        if path.exists()
            && let Ok(content) = fs::read_to_string(path)
        {
            match serde_json::from_str(&content) {
                Ok(journal) => return journal,
                Err(e) => log::warn!("Ignoring unreadable journal {:?}: {}", path, e),
            }
        }
        Self::default()
    }

    pub fn load(ctx: &dyn AppContext) -> Self {
        if let Some(path) = Self::get_path(ctx) {
            if !path.exists() {
                return Self::default();
            }
            return LocalStorage::with_lock(&path, || Ok(Self::load_internal(&path)))
                .unwrap_or_default();
        }
        Self::default()
    }

    /// Applies `f` to the stored records and writes the result back.
    pub fn modify<F>(ctx: &dyn AppContext, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<ImportRecord>),
    {
        if let Some(path) = Self::get_path(ctx) {
            LocalStorage::with_lock(&path, || {
                let mut journal = Self::load_internal(&path);
                f(&mut journal.imported);
                let json = serde_json::to_string_pretty(&journal)?;
                LocalStorage::atomic_write(&path, json)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    pub fn push(ctx: &dyn AppContext, record: ImportRecord) -> Result<()> {
        Self::modify(ctx, |records| records.push(record))
    }

    pub fn extend(ctx: &dyn AppContext, records: Vec<ImportRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        Self::modify(ctx, |existing| existing.extend(records))
    }

    pub fn is_empty(&self) -> bool {
        self.imported.is_empty()
    }

    pub fn len(&self) -> usize {
        self.imported.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    fn record(id: &str, name: &str) -> ImportRecord {
        ImportRecord {
            source_id: id.to_string(),
            task: RemoteTask {
                name: name.to_string(),
                list_id: "10".to_string(),
                series_id: format!("s{}", id),
                task_id: format!("t{}", id),
            },
        }
    }

    #[test]
    fn test_push_and_load() {
        let ctx = TestContext::new();
        assert!(Journal::load(&ctx).is_empty());

        Journal::push(&ctx, record("z1", "Buy milk")).unwrap();
        Journal::extend(&ctx, vec![record("z2", "Call Bob"), record("z3", "Pay rent")]).unwrap();

        let journal = Journal::load(&ctx);
        assert_eq!(journal.len(), 3);
        assert_eq!(journal.imported[0], record("z1", "Buy milk"));
        assert_eq!(journal.imported[2].task.name, "Pay rent");
    }

    #[test]
    fn test_records_are_flat_on_disk() {
        let ctx = TestContext::new();
        Journal::push(&ctx, record("z1", "Buy milk")).unwrap();
        let path = Journal::get_path(&ctx).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let entry = &raw["imported"][0];
        assert_eq!(entry["source_id"], "z1");
        assert_eq!(entry["series_id"], "sz1");
        assert_eq!(entry["name"], "Buy milk");
    }

    #[test]
    fn test_modify_can_drop_records() {
        let ctx = TestContext::new();
        Journal::extend(&ctx, vec![record("a", "A"), record("b", "B")]).unwrap();
        Journal::modify(&ctx, |records| records.retain(|r| r.source_id == "b")).unwrap();
        let journal = Journal::load(&ctx);
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.imported[0].source_id, "b");
    }

    #[test]
    fn test_corrupt_journal_loads_empty() {
        let ctx = TestContext::new();
        let path = Journal::get_path(&ctx).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(Journal::load(&ctx).is_empty());
    }
}
