//! The item graph and on-demand content pipeline: the orchestration layer
//! sitting between the HTTP adapter (`rmcl-api`), the persistence adapter
//! (`rmcl-cache`), and the kernel-facing adapter (`rmcl-fuse`).

mod error;
mod graph;
mod item;

pub use error::GraphError;
pub use graph::ItemGraph;
pub use item::{Document, DocumentLazyState, Folder, Item, ModeFile, VirtualFolder};
