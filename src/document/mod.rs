//! # Document Store Seam
//!
//! The engine never owns documents. It asks a [`DocumentStore`] whether an
//! id exists and what kind of document it is, and is told about deletions
//! through [`Graph::on_document_deleted`](crate::Graph::on_document_deleted).
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryDocumentStore` | `memory` | In-memory id → kind table for tests/embedding |

pub mod memory;

use async_trait::async_trait;

use crate::model::DocId;
use crate::Result;

pub use memory::MemoryDocumentStore;

/// Lookup contract for the external document store.
///
/// Calls happen before the graph lock is taken, so implementations are free
/// to do I/O. Failures should be reported as [`Error::DocumentStore`](crate::Error::DocumentStore).
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Whether a document with this id exists.
    async fn exists(&self, id: &DocId) -> Result<bool>;

    /// The document's kind (e.g. `"guide"`, `"issue"`), `None` if it has none
    /// or does not exist.
    async fn kind_of(&self, id: &DocId) -> Result<Option<String>>;

    /// Release connections. Called from [`Graph::shutdown`](crate::Graph::shutdown).
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
