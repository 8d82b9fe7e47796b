//! Concrete collaborator implementations.

#[cfg(feature = "memory-index")]
pub mod memory_index;
