//! An embeddable object-graph persistence engine with undo/redo.
//!
//! A host defines its record types by implementing [`model::Persistable`],
//! then drives everything through a single [`engine::Persister`]: `save`,
//! `save_all`, `delete`, `delete_all`, `retrieve`, `related`, `undo`, `redo`,
//! and a small prefix-completion index. The engine keeps no in-memory mirror
//! of state — every call reads or writes the backing SQLite database
//! directly — and every mutation is recorded so it can be undone and redone
//! in the order it was made.

pub mod codec;
pub mod completion;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod repository;
pub mod store;
pub mod transaction;
pub mod traversal;
pub mod undo;

pub use engine::Persister;
pub use error::{EngineError, EngineResult};
pub use model::{Cardinality, EdgeDescriptor, Persistable};
pub use undo::UndoRedoOutcome;
