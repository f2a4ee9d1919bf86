//! Per-evaluation caches.
//!
//! - [`VirtualCache`]: memoized rule outcomes, one independent trie per frame
//! - [`BaseCache`]: documents read from the store, as a path trie
//! - [`ComprehensionCache`]: comprehension results keyed by their free variables
//!
//! None of these are shared between evaluations.

mod base_cache;
mod comprehension;
mod virtual_cache;

pub use base_cache::BaseCache;
pub use comprehension::ComprehensionCache;
pub use virtual_cache::{CachedValue, VirtualCache};
