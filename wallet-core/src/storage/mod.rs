pub mod file;
pub mod interface;
pub mod repository;
pub mod secure;

pub use file::FileStorage;
pub use interface::{MemoryStorage, ScopedStorage, StorageInterface};
pub use repository::StorageRepository;
pub use secure::{KdfParameters, SecureStorageRepository};
