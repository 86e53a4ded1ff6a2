// File: ./src/model/item.rs
use chrono::NaiveDate;
use std::fmt;

/// Tag added to every imported task so the whole batch can be found (and removed) later.
pub const IMPORT_TAG: &str = "things2rtm";

/// Identifier carried by the focus object that holds deleted items.
pub const TRASH_IDENTIFIER: &str = "FocusTrash";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ObjectKind {
    /// A to-do. Projects are to-dos with children.
    Task,
    /// A focus (sidebar view). One of them is the trash.
    Focus,
    Tag,
}

impl ObjectKind {
    /// Maps the `type` attribute of a dump object. Kinds we don't consume yield `None`.
    pub fn from_dump_type(value: &str) -> Option<Self> {
        match value {
            "TODO" => Some(Self::Task),
            "FOCUS" => Some(Self::Focus),
            "TAG" => Some(Self::Tag),
            _ => None,
        }
    }

    pub fn as_dump_type(&self) -> &'static str {
        match self {
            Self::Task => "TODO",
            Self::Focus => "FOCUS",
            Self::Tag => "TAG",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_dump_type())
    }
}

/// One object read from Database.xml.
///
/// Built once by the parser, then only touched by the reconciliation passes
/// (`list_name`, `tag_names`, `deleted`).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceObject {
    pub id: String,
    pub kind: ObjectKind,
    pub title: Option<String>,
    /// Raw completion value. Only its presence matters: the remote side can't
    /// store the raw timestamp.
    pub completed: Option<String>,
    /// Things' date encoding isn't decoded; any due date becomes the import day.
    pub due: Option<NaiveDate>,
    pub content: Option<String>,
    pub identifier: Option<String>,
    pub children: Vec<String>,
    pub tags: Vec<String>,
    pub focus_items: Vec<String>,
    pub list_name: String,
    pub tag_names: Vec<String>,
    pub deleted: bool,
}

impl SourceObject {
    /// Creates an object with every modeled field at its default value.
    pub fn new(id: &str, kind: ObjectKind, default_list: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            title: None,
            completed: None,
            due: None,
            content: None,
            identifier: None,
            children: Vec::new(),
            tags: Vec::new(),
            focus_items: Vec::new(),
            list_name: default_list.to_string(),
            tag_names: vec![IMPORT_TAG.to_string()],
            deleted: false,
        }
    }

    /// Focus objects are always valid; everything else needs a non-empty title.
    pub fn is_valid(&self) -> bool {
        self.kind == ObjectKind::Focus || self.title.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn is_task(&self) -> bool {
        self.kind == ObjectKind::Task
    }

    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_trash(&self) -> bool {
        self.kind == ObjectKind::Focus && self.identifier.as_deref() == Some(TRASH_IDENTIFIER)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Note text worth sending, if any.
    pub fn note(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}
