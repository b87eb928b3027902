use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Active,
    Inactive,
}

/// A named specification attribute of a product, e.g. "Module Power" =>
/// "550 W". Values come from supplier datasheets and are free-form text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductParameter {
    pub name: String,
    pub value: String,
}

/// A catalog product that offers are listed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub status: ProductStatus,
    pub parameters: Vec<ProductParameter>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn parameter_value(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }
}
