pub mod memory;
pub mod ports;
pub mod postgres;

pub use memory::MemoryCatalog;
pub use ports::{CatalogStore, CatalogTx};
pub use postgres::PostgresCatalog;
