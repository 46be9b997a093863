pub mod bulk;
pub mod gateway;
pub mod lmdb_storage;
pub mod manager;
pub mod memory;

pub use bulk::{BulkConfig, BulkProcessor, BulkStats};
pub use gateway::{BulkItemFailure, BulkOp, BulkResponse, CatalogGateway, Cursor, Page};
pub use lmdb_storage::LmdbCatalog;
pub use manager::{open_catalog, CatalogBackend};
pub use memory::MemoryCatalog;
