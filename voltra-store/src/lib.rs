pub mod app_config;
pub mod blob;
pub mod catalog_repo;
pub mod database;
pub mod offer_repo;
pub mod search_index;

pub use app_config::Config;
pub use blob::{FsBlobStore, XlsxSheetWriter};
pub use catalog_repo::PostgresProductStore;
pub use database::DbClient;
pub use offer_repo::PostgresOfferStore;
pub use search_index::RedisSearchIndexer;
