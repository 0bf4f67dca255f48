pub mod codes;
pub mod contract;
pub mod error;
pub mod media;
pub mod memory;
pub mod query;

pub use codes::{CodeGenerator, PrefixCodeGenerator};
pub use contract::{Document, DocumentStore};
pub use error::StoreError;
pub use media::{MediaError, MediaStore, MemoryMediaStore, UploadedAsset};
pub use memory::MemoryStore;
pub use query::{Clause, Condition, FindOptions, Predicate, Sort, UpdateSpec};
