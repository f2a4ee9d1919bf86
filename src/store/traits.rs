//! Abstract store traits.

use thiserror::Error;
use uuid::Uuid;

use crate::term::Term;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path cannot address a document (e.g. a non-numeric array index).
    #[error("Invalid path /{path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A required document does not exist.
    #[error("Document not found: /{0}")]
    NotFound(String),

    /// The transaction was not opened on this store.
    #[error("Invalid transaction {0}")]
    InvalidTransaction(Uuid),

    /// Backend failure (I/O, poisoned lock, corrupt document).
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Read transaction handle.
///
/// One evaluation reads through one transaction; the store guarantees a
/// stable view for its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    id: Uuid,
    store_id: Uuid,
}

impl Transaction {
    /// Creates a transaction bound to the store identified by `store_id`.
    #[must_use]
    pub fn new(store_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            store_id,
        }
    }

    /// Transaction identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Identifier of the store that opened the transaction.
    #[must_use]
    pub const fn store_id(&self) -> Uuid {
        self.store_id
    }
}

/// Hierarchical document store.
///
/// Implementations must be safe to share across concurrent evaluations.
pub trait Store: Send + Sync {
    /// Opens a read transaction.
    ///
    /// # Errors
    /// Returns a backend error if the store cannot serve reads.
    fn begin_read(&self) -> Result<Transaction, StoreError>;

    /// Reads the document at `path`. `Ok(None)` means no document exists
    /// there, which is distinct from a stored `null`.
    ///
    /// # Errors
    /// Returns an error for foreign transactions or backend failures.
    fn read(&self, txn: &Transaction, path: &[String]) -> Result<Option<Term>, StoreError>;
}
