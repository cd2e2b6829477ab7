pub mod field;
pub mod issue_record;
pub mod item;
pub mod label;
pub mod milestone;
