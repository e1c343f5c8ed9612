// Adapters layer: concrete implementations for external systems (filesystem, spreadsheet formats).

pub mod source;
pub mod storage;

pub use source::{FileRowSource, SourceFormat};
pub use storage::LocalStorage;
