pub mod pricing;
pub mod product;
pub mod repository;

pub use pricing::{lowest_price, price_from_wp, supports_wp_pricing, MODULE_POWER_PARAM};
pub use product::{Product, ProductParameter, ProductStatus};
pub use repository::ProductStore;
