//! Product records handed over by the catalog layer
//!
//! The catalog CRUD layer owns persistence; the printing core only reads
//! these shapes to build label specs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::label::PackEntry;

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Internal article code printed on every label
    pub code: String,
    /// EAN/UPC barcode; not every article has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Price per pack when `sizes` is non-empty, otherwise per piece
    pub wholesale_price: Decimal,
    /// Ordered size breakdown of one pack (empty for single-piece articles)
    #[serde(default)]
    pub sizes: Vec<PackEntry>,
    /// Number of packs covered by `wholesale_price`
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_multiplier() -> u32 {
    1
}

/// One line of a restock delivery: a product plus how many labels to print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestockEntry {
    pub product: Product,
    pub quantity: u32,
}

/// A restock delivery as handed over by the catalog layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestockBatch {
    pub entries: Vec<RestockEntry>,
}

impl RestockBatch {
    pub fn new(entries: Vec<RestockEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
