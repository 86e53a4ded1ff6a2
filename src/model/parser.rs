// File: ./src/model/parser.rs
// Builds the in-memory object model from Things' Database.xml.
use crate::model::content::{extract_note_text, unescape};
use crate::model::item::{ObjectKind, SourceObject};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

type AttributeSetter = fn(&mut SourceObject, String, NaiveDate);
type RelationshipField = fn(&mut SourceObject) -> &mut Vec<String>;

/// Simple attributes we model, keyed by their name in the dump.
/// `content` is not here: it needs the note decoder rather than a plain unescape.
const ATTRIBUTE_SETTERS: &[(&str, AttributeSetter)] = &[
    ("title", set_title),
    ("datecompleted", set_completed),
    ("datedue", set_due),
    ("identifier", set_identifier),
];

const RELATIONSHIP_FIELDS: &[(&str, RelationshipField)] = &[
    ("children", children_field),
    ("tags", tags_field),
    ("focustodos", focus_items_field),
];

fn set_title(obj: &mut SourceObject, value: String, _: NaiveDate) {
    obj.title = Some(value);
}

fn set_completed(obj: &mut SourceObject, value: String, _: NaiveDate) {
    obj.completed = Some(value);
}

// The stored value is not decoded, see SourceObject::due.
fn set_due(obj: &mut SourceObject, _: String, today: NaiveDate) {
    obj.due = Some(today);
}

fn set_identifier(obj: &mut SourceObject, value: String, _: NaiveDate) {
    obj.identifier = Some(value);
}

fn children_field(obj: &mut SourceObject) -> &mut Vec<String> {
    &mut obj.children
}

fn tags_field(obj: &mut SourceObject) -> &mut Vec<String> {
    &mut obj.tags
}

fn focus_items_field(obj: &mut SourceObject) -> &mut Vec<String> {
    &mut obj.focus_items
}

/// All consumed objects of a dump, in dump order, plus an id index.
#[derive(Debug, Clone, Default)]
pub struct Database {
    objects: Vec<SourceObject>,
    index: HashMap<String, usize>,
}

impl Database {
    /// Reads and parses the dump at `path`.
    pub fn load(path: &Path, default_list: &str) -> Result<Self> {
        let xml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read database '{}'", path.display()))?;
        Self::parse(&xml, default_list)
            .with_context(|| format!("Failed to parse database '{}'", path.display()))
    }

    pub fn parse(xml: &str, default_list: &str) -> Result<Self> {
        Self::parse_with_date(xml, default_list, Local::now().date_naive())
    }

    /// Same as [`Database::parse`], with the date used for due dates given explicitly.
    pub fn parse_with_date(xml: &str, default_list: &str, today: NaiveDate) -> Result<Self> {
        // Core Data dumps come with a DOCTYPE line.
        let opts = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(xml, opts)?;
        let root = doc.root_element();
        if !root.has_tag_name("database") {
            anyhow::bail!(
                "Expected top XML node to be named 'database', found '{}'",
                root.tag_name().name()
            );
        }

        let mut db = Self::default();
        for node in root.children().filter(|n| n.has_tag_name("object")) {
            let Some(kind) = node.attribute("type").and_then(ObjectKind::from_dump_type) else {
                continue;
            };
            let id = node.attribute("id").unwrap_or_default();
            db.insert(build_object(node, id, kind, default_list, today));
        }

        log::debug!("Parsed {} objects from database", db.objects.len());
        Ok(db)
    }

    /// Appends an object. A repeated id keeps both entries in the list, but lookups see the last one.
    pub fn insert(&mut self, obj: SourceObject) {
        if self.index.contains_key(&obj.id) {
            log::warn!("Duplicate object id {} in database, keeping the last one", obj.id);
        }
        self.index.insert(obj.id.clone(), self.objects.len());
        self.objects.push(obj);
    }

    pub fn get(&self, id: &str) -> Option<&SourceObject> {
        self.index.get(id).map(|&i| &self.objects[i])
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn object_mut(&mut self, pos: usize) -> &mut SourceObject {
        &mut self.objects[pos]
    }

    pub fn objects(&self) -> &[SourceObject] {
        &self.objects
    }

    pub fn tasks(&self) -> impl Iterator<Item = &SourceObject> {
        self.objects.iter().filter(|o| o.is_task())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn build_object(
    node: roxmltree::Node,
    id: &str,
    kind: ObjectKind,
    default_list: &str,
    today: NaiveDate,
) -> SourceObject {
    let mut obj = SourceObject::new(id, kind, default_list);

    for child in node.children().filter(|n| n.is_element()) {
        let Some(name) = child.attribute("name") else {
            continue;
        };

        if child.has_tag_name("attribute") {
            let Some(raw) = child.text() else {
                continue;
            };
            if name == "content" {
                match extract_note_text(raw) {
                    Ok(text) => obj.content = Some(text),
                    Err(e) => log::warn!("Discarding note of object {}: {}", id, e),
                }
            } else if let Some((_, set)) = ATTRIBUTE_SETTERS.iter().find(|(n, _)| *n == name) {
                set(&mut obj, unescape(raw), today);
            }
        } else if child.has_tag_name("relationship")
            && let Some(idrefs) = child.attribute("idrefs")
            && let Some((_, field)) = RELATIONSHIP_FIELDS.iter().find(|(n, _)| *n == name)
        {
            field(&mut obj).extend(idrefs.split_whitespace().map(str::to_string));
        }
    }
    obj
}
