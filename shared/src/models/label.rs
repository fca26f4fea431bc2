//! Label spec - the immutable input of the label compiler

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::Product;

/// One entry of a pack's size breakdown, e.g. `{size: "M", quantity: 3}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackEntry {
    pub size: String,
    pub quantity: u32,
}

/// Structured, immutable description of one label's content
///
/// Constructed fresh per print request from a product (or ad hoc fields)
/// plus the requested print quantity; never mutated afterwards. Pricing
/// derivation (pack division, secondary currency) happens in the compiler,
/// not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Flat per-piece price, used when there is no pack breakdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    /// Price of the whole pack, used with `sizes`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_price: Option<Decimal>,
    /// Ordered size breakdown; order is preserved verbatim on the label
    #[serde(default)]
    pub sizes: Vec<PackEntry>,
    pub multiplier: u32,
    /// How many copies of this label to print
    ///
    /// Kept signed so that a zero/negative request from the calling layer
    /// reaches the compiler and is rejected there as `InvalidSpec`.
    pub quantity: i32,
}

impl LabelSpec {
    /// Build a spec for a catalog product
    pub fn from_product(product: &Product, quantity: i32) -> Self {
        let (unit_price, pack_price) = if product.sizes.is_empty() {
            (Some(product.wholesale_price), None)
        } else {
            (None, Some(product.wholesale_price))
        };

        Self {
            name: product.name.clone(),
            code: Some(product.code.clone()),
            barcode: product.barcode.clone(),
            unit_price,
            pack_price,
            sizes: product.sizes.clone(),
            multiplier: product.multiplier.max(1),
            quantity,
        }
    }

    /// Build a spec for an ad hoc (non-catalog) label
    pub fn adhoc(name: impl Into<String>, unit_price: Decimal, quantity: i32) -> Self {
        Self {
            name: name.into(),
            code: None,
            barcode: None,
            unit_price: Some(unit_price),
            pack_price: None,
            sizes: Vec::new(),
            multiplier: 1,
            quantity,
        }
    }

    /// Total piece count of the pack breakdown
    pub fn pack_piece_count(&self) -> u32 {
        self.sizes.iter().map(|e| e.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn shirt() -> Product {
        Product {
            id: "p-1".to_string(),
            name: "Тениска".to_string(),
            code: "C1".to_string(),
            barcode: Some("123".to_string()),
            wholesale_price: dec!(10.00),
            sizes: vec![
                PackEntry {
                    size: "S".to_string(),
                    quantity: 2,
                },
                PackEntry {
                    size: "M".to_string(),
                    quantity: 3,
                },
            ],
            multiplier: 1,
        }
    }

    #[test]
    fn test_from_product_with_sizes_uses_pack_price() {
        let spec = LabelSpec::from_product(&shirt(), 1);
        assert_eq!(spec.pack_price, Some(dec!(10.00)));
        assert_eq!(spec.unit_price, None);
        assert_eq!(spec.pack_piece_count(), 5);
        assert_eq!(spec.quantity, 1);
    }

    #[test]
    fn test_from_product_without_sizes_uses_flat_price() {
        let mut product = shirt();
        product.sizes.clear();
        let spec = LabelSpec::from_product(&product, 3);
        assert_eq!(spec.unit_price, Some(dec!(10.00)));
        assert_eq!(spec.pack_price, None);
        assert_eq!(spec.quantity, 3);
    }

    #[test]
    fn test_adhoc_spec() {
        let spec = LabelSpec::adhoc("Колан", dec!(7.50), 2);
        assert_eq!(spec.unit_price, Some(dec!(7.50)));
        assert!(spec.sizes.is_empty());
        assert_eq!(spec.multiplier, 1);
    }
}
