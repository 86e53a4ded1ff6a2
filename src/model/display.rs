// File: ./src/model/display.rs
use crate::model::item::SourceObject;
use crate::model::parser::Database;
use std::fmt;

impl fmt::Display for SourceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.id, self.title_or_empty())?;
        if self.is_completed() {
            write!(f, " (completed)")?;
        }
        Ok(())
    }
}

/// Counts printed before anything is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseSummary {
    /// To-dos that aren't containers.
    pub tasks: usize,
    pub valid: usize,
    pub deleted: usize,
    /// Valid to-dos with children, i.e. projects that become lists.
    pub lists: usize,
}

impl DatabaseSummary {
    pub fn from_database(db: &Database) -> Self {
        let mut summary = Self::default();
        for obj in db.tasks() {
            if obj.is_container() {
                if obj.is_valid() {
                    summary.lists += 1;
                }
            } else {
                summary.tasks += 1;
                if obj.is_valid() {
                    summary.valid += 1;
                }
            }
            if obj.deleted {
                summary.deleted += 1;
            }
        }
        summary
    }
}

impl fmt::Display for DatabaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Database.xml has {} TODOs, {} valid, {} deleted, in {} lists",
            self.tasks, self.valid, self.deleted, self.lists
        )
    }
}

/// Objects that will never be sent because they fail the validity check.
pub fn invalid_objects(db: &Database) -> impl Iterator<Item = &SourceObject> {
    db.objects().iter().filter(|o| !o.is_valid())
}
