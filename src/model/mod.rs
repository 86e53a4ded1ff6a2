// File: ./src/model/mod.rs
pub mod content;
pub mod display;
pub mod item;
pub mod parser;
pub mod resolve;

pub use display::DatabaseSummary;
pub use item::{IMPORT_TAG, ObjectKind, SourceObject};
pub use parser::Database;
pub use resolve::{ReconcileError, ReconcileWarning};
