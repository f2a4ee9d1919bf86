//! Document store interface and the in-memory backend.
//!
//! The evaluator only consumes [`Store::read`]; writes are a concern of the
//! backend and are used here to seed documents.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{Store, StoreError, Transaction};
