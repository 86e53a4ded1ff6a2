// File: ./src/model/resolve.rs
// Resolves the id references between parsed objects: list membership, tag
// names and the trash.
use crate::model::item::ObjectKind;
use crate::model::parser::Database;
use std::collections::HashSet;
use std::fmt;

/// A dangling reference found while resolving. The reference is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    MissingChild { container: String, child: String },
    MissingTag { task: String, tag: String },
    MissingTrashed { id: String },
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingChild { container, child } => {
                write!(f, "Missing child id {} for container with id {}", child, container)
            }
            Self::MissingTag { task, tag } => {
                write!(f, "Missing tag id {} for TODO with id {}", tag, task)
            }
            Self::MissingTrashed { id } => write!(f, "Missing trashed object id {}", id),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("expected exactly one trash focus in the database, found {found}")]
    TrashMarker { found: usize },
}

impl Database {
    /// Runs the three resolution passes in order and returns what was skipped.
    /// Fails only when the trash can't be identified.
    pub fn reconcile(
        &mut self,
        ignored_tags: &HashSet<String>,
    ) -> Result<Vec<ReconcileWarning>, ReconcileError> {
        let mut warnings = self.resolve_lists();
        warnings.extend(self.resolve_tags(ignored_tags));
        warnings.extend(self.resolve_trash()?);

        for w in &warnings {
            log::warn!("{}", w);
        }
        Ok(warnings)
    }

    /// Objects with children are containers (projects): their children go
    /// into a list named after the container.
    pub fn resolve_lists(&mut self) -> Vec<ReconcileWarning> {
        let mut warnings = Vec::new();
        let mut moves = Vec::new();

        for container in self.objects().iter().filter(|o| o.is_container()) {
            let Some(title) = &container.title else {
                continue;
            };
            for child_id in &container.children {
                match self.position(child_id) {
                    Some(pos) => moves.push((pos, title.clone())),
                    None => warnings.push(ReconcileWarning::MissingChild {
                        container: container.id.clone(),
                        child: child_id.clone(),
                    }),
                }
            }
        }

        for (pos, list_name) in moves {
            self.object_mut(pos).list_name = list_name;
        }
        warnings
    }

    /// Fills `tag_names` of every task. The import tag is always first, ignored
    /// names are dropped and each name appears once.
    pub fn resolve_tags(&mut self, ignored_tags: &HashSet<String>) -> Vec<ReconcileWarning> {
        let mut warnings = Vec::new();
        let mut resolved = Vec::new();

        for (pos, task) in self.objects().iter().enumerate().filter(|(_, o)| o.is_task()) {
            let mut names = task.tag_names.clone();
            for tag_id in &task.tags {
                let tag = self.get(tag_id).filter(|t| t.kind == ObjectKind::Tag);
                let Some(tag) = tag else {
                    warnings.push(ReconcileWarning::MissingTag {
                        task: task.id.clone(),
                        tag: tag_id.clone(),
                    });
                    continue;
                };
                if let Some(name) = &tag.title
                    && !ignored_tags.contains(name)
                    && !names.contains(name)
                {
                    names.push(name.clone());
                }
            }
            resolved.push((pos, names));
        }

        for (pos, names) in resolved {
            self.object_mut(pos).tag_names = names;
        }
        warnings
    }

    /// Marks everything the trash focus refers to as deleted.
    pub fn resolve_trash(&mut self) -> Result<Vec<ReconcileWarning>, ReconcileError> {
        let trash: Vec<_> = self.objects().iter().filter(|o| o.is_trash()).collect();
        let [trash] = trash.as_slice() else {
            return Err(ReconcileError::TrashMarker { found: trash.len() });
        };

        let mut warnings = Vec::new();
        let mut trashed = Vec::new();
        for id in &trash.focus_items {
            match self.position(id) {
                Some(pos) => trashed.push(pos),
                None => warnings.push(ReconcileWarning::MissingTrashed { id: id.clone() }),
            }
        }

        for pos in trashed {
            self.object_mut(pos).deleted = true;
        }
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{IMPORT_TAG, SourceObject, TRASH_IDENTIFIER};

    fn task(id: &str, title: &str) -> SourceObject {
        let mut obj = SourceObject::new(id, ObjectKind::Task, "Inbox");
        obj.title = Some(title.to_string());
        obj
    }

    fn tag(id: &str, title: &str) -> SourceObject {
        let mut obj = SourceObject::new(id, ObjectKind::Tag, "Inbox");
        obj.title = Some(title.to_string());
        obj
    }

    fn trash(items: &[&str]) -> SourceObject {
        let mut obj = SourceObject::new("trash", ObjectKind::Focus, "Inbox");
        obj.identifier = Some(TRASH_IDENTIFIER.to_string());
        obj.focus_items = items.iter().map(|s| s.to_string()).collect();
        obj
    }

    fn ignored() -> HashSet<String> {
        ["High", "Medium", "Low"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_container_children_get_list_name() {
        let mut db = Database::default();
        let mut project = task("p1", "Work");
        project.children = vec!["t1".to_string()];
        db.insert(project);
        db.insert(task("t1", "Write report"));
        db.insert(task("t2", "Loose task"));

        let warnings = db.resolve_lists();
        assert!(warnings.is_empty());
        assert_eq!(db.get("t1").unwrap().list_name, "Work");
        assert_eq!(db.get("t2").unwrap().list_name, "Inbox");
        assert_eq!(db.get("p1").unwrap().list_name, "Inbox");
    }

    #[test]
    fn test_missing_child_is_reported() {
        let mut db = Database::default();
        let mut project = task("p1", "Work");
        project.children = vec!["gone".to_string(), "t1".to_string()];
        db.insert(project);
        db.insert(task("t1", "Still here"));

        let warnings = db.resolve_lists();
        assert_eq!(
            warnings,
            vec![ReconcileWarning::MissingChild {
                container: "p1".to_string(),
                child: "gone".to_string()
            }]
        );
        assert_eq!(db.get("t1").unwrap().list_name, "Work");
    }

    #[test]
    fn test_tags_resolve_with_ignored_and_sentinel() {
        let mut db = Database::default();
        let mut t = task("t1", "Call mom");
        t.tags = vec!["g1".to_string(), "g2".to_string()];
        db.insert(t);
        db.insert(tag("g1", "High"));
        db.insert(tag("g2", "Urgent"));

        let warnings = db.resolve_tags(&ignored());
        assert!(warnings.is_empty());
        assert_eq!(db.get("t1").unwrap().tag_names, vec![IMPORT_TAG, "Urgent"]);
    }

    #[test]
    fn test_tags_appended_once() {
        let mut db = Database::default();
        let mut t = task("t1", "Call mom");
        t.tags = vec!["g1".to_string(), "g2".to_string(), "g3".to_string()];
        db.insert(t);
        db.insert(tag("g1", "Home"));
        db.insert(tag("g2", "Phone"));
        db.insert(tag("g3", "Home"));

        db.resolve_tags(&ignored());
        assert_eq!(db.get("t1").unwrap().tag_names, vec![IMPORT_TAG, "Home", "Phone"]);
    }

    #[test]
    fn test_missing_tag_is_skipped() {
        let mut db = Database::default();
        let mut t = task("t1", "Call mom");
        t.tags = vec!["nope".to_string(), "t2".to_string(), "g1".to_string()];
        db.insert(t);
        db.insert(task("t2", "Not a tag"));
        db.insert(tag("g1", "Phone"));

        let warnings = db.resolve_tags(&ignored());
        assert_eq!(warnings.len(), 2);
        assert_eq!(db.get("t1").unwrap().tag_names, vec![IMPORT_TAG, "Phone"]);
    }

    #[test]
    fn test_trash_marks_deleted() {
        let mut db = Database::default();
        db.insert(task("t1", "Old"));
        db.insert(task("t2", "Current"));
        db.insert(trash(&["t1", "ghost"]));

        let warnings = db.resolve_trash().unwrap();
        assert_eq!(warnings, vec![ReconcileWarning::MissingTrashed { id: "ghost".to_string() }]);
        assert!(db.get("t1").unwrap().deleted);
        assert!(!db.get("t2").unwrap().deleted);
    }

    #[test]
    fn test_trash_must_be_unique() {
        let mut db = Database::default();
        db.insert(task("t1", "Old"));
        assert_eq!(db.resolve_trash(), Err(ReconcileError::TrashMarker { found: 0 }));

        db.insert(trash(&[]));
        let mut second = trash(&[]);
        second.id = "trash2".to_string();
        db.insert(second);
        assert_eq!(db.resolve_trash(), Err(ReconcileError::TrashMarker { found: 2 }));
    }

    #[test]
    fn test_other_focus_objects_are_not_trash() {
        let mut db = Database::default();
        let mut today = SourceObject::new("f1", ObjectKind::Focus, "Inbox");
        today.identifier = Some("FocusToday".to_string());
        today.focus_items = vec!["t1".to_string()];
        db.insert(today);
        db.insert(task("t1", "Today thing"));
        db.insert(trash(&[]));

        db.reconcile(&ignored()).unwrap();
        assert!(!db.get("t1").unwrap().deleted);
    }
}
