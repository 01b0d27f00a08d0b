//! Concrete collaborators: the ONA form service, JSON and filesystem
//! storage, and in-memory doubles.

mod filesystem;
mod json_store;
pub mod memory;
mod ona;

pub use filesystem::FileSystemDocuments;
pub use json_store::JsonCollectStore;
pub use memory::{Faults, MemoryCollectStore, MemoryDocuments, MemoryFormService};
pub use ona::{LazyOnaFormService, OnaFormService};
