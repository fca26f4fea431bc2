//! Label compiler
//!
//! Compiles a [`LabelSpec`] into a TSPL [`Document`]. Pure and
//! deterministic: the same spec always produces byte-identical output.
//!
//! Pricing rules:
//! - pack breakdown present: unit price = pack price / (piece count x
//!   multiplier), rounded to 2 decimal places
//! - otherwise the flat unit price is used as supplied
//! - the secondary-currency price is always derived from the printed unit
//!   price via [`convert_currency`], never supplied independently

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use shared::models::LabelSpec;

use crate::encoding::encode_cp1251;
use crate::error::{PrintError, PrintResult};
use crate::tspl::TsplBuilder;

/// Fixed BGN per EUR conversion rate
const BGN_PER_EUR: Decimal = dec!(1.95583);

/// Convert a BGN amount to EUR, rounded half-away-from-zero to 2 decimals
pub fn convert_currency(amount: Decimal) -> Decimal {
    (amount / BGN_PER_EUR).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rendered printer-control-language payload plus repeat metadata
///
/// The payload is opaque to callers: a setup block followed by one content
/// block. Sinks with native repeat support take [`Document::render`]
/// (`PRINT 1,n`); for sinks without it, [`Document::render_flattened`]
/// replicates the whole label `n` times.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    setup: String,
    content: String,
    repeat_count: u32,
}

impl Document {
    /// Number of copies this document asks for
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Render with the language-native repeat instruction
    pub fn render(&self) -> Vec<u8> {
        encode_cp1251(self.to_text().as_bytes())
    }

    /// Render with the content replicated per copy (no native repeat)
    pub fn render_flattened(&self) -> Vec<u8> {
        let single = format!("{}{}PRINT 1,1\r\n", self.setup, self.content);
        let mut text = String::with_capacity(single.len() * self.repeat_count as usize);
        for _ in 0..self.repeat_count {
            text.push_str(&single);
        }
        encode_cp1251(text.as_bytes())
    }

    /// UTF-8 view of the native-repeat rendering (tests, logging)
    pub fn to_text(&self) -> String {
        format!(
            "{}{}PRINT 1,{}\r\n",
            self.setup, self.content, self.repeat_count
        )
    }
}

/// Label compiler with a fixed label geometry
#[derive(Debug, Clone)]
pub struct LabelCompiler {
    width_mm: u32,
    height_mm: u32,
    gap_mm: u32,
}

impl LabelCompiler {
    pub fn new(width_mm: u32, height_mm: u32) -> Self {
        Self {
            width_mm,
            height_mm,
            gap_mm: 2,
        }
    }

    /// Compile a spec into a printable document
    ///
    /// Fails with [`PrintError::InvalidSpec`] only when mandatory fields are
    /// absent (name, a price source) or the requested quantity is not
    /// positive; a catalog item without a barcode still compiles.
    pub fn compile(&self, spec: &LabelSpec) -> PrintResult<Document> {
        if spec.name.trim().is_empty() {
            return Err(PrintError::InvalidSpec("label name is empty".to_string()));
        }
        if spec.quantity <= 0 {
            return Err(PrintError::InvalidSpec(format!(
                "print quantity must be positive, got {}",
                spec.quantity
            )));
        }

        let unit_price = self.effective_unit_price(spec)?;
        let eur_price = convert_currency(unit_price);
        let size_range = size_range_text(spec);

        let mut setup = TsplBuilder::new();
        setup
            .size_mm(self.width_mm, self.height_mm)
            .gap_mm(self.gap_mm, 0)
            .direction(1)
            .codepage(1251)
            .cls();

        let mut content = TsplBuilder::new();
        content.text(16, 8, "0", 0, 1, 2, &spec.name);

        let mut y = 64;
        if let Some(code) = spec.code.as_deref().filter(|c| !c.is_empty()) {
            content.text(16, y, "0", 0, 1, 1, code);
            y += 24;
        }
        if !size_range.is_empty() {
            content.text(16, y, "0", 0, 1, 1, &size_range);
            y += 24;
        }

        content.text(16, y, "0", 0, 2, 2, &format!("{:.2} лв", unit_price));
        y += 48;
        content.text(16, y, "0", 0, 1, 1, &format!("({:.2} EUR)", eur_price));
        y += 24;

        if let Some(barcode) = spec.barcode.as_deref().filter(|b| !b.is_empty()) {
            content.barcode(16, y, "128", 50, 1, 0, 2, 2, barcode);
        }

        Ok(Document {
            setup: setup.finalize(),
            content: content.finalize(),
            repeat_count: spec.quantity as u32,
        })
    }

    /// Derive the per-piece price printed on the label
    fn effective_unit_price(&self, spec: &LabelSpec) -> PrintResult<Decimal> {
        if spec.sizes.is_empty() {
            return spec.unit_price.ok_or_else(|| {
                PrintError::InvalidSpec("no unit price and no pack breakdown".to_string())
            });
        }

        let pack_price = spec.pack_price.ok_or_else(|| {
            PrintError::InvalidSpec("pack breakdown without a pack price".to_string())
        })?;

        let pieces = spec.pack_piece_count() * spec.multiplier.max(1);
        if pieces == 0 {
            return Err(PrintError::InvalidSpec(
                "pack breakdown has zero total quantity".to_string(),
            ));
        }

        Ok((pack_price / Decimal::from(pieces))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Default for LabelCompiler {
    fn default() -> Self {
        Self::new(57, 32)
    }
}

/// `[first-last]` over the ordered size sequence, verbatim, no re-sorting
fn size_range_text(spec: &LabelSpec) -> String {
    match (spec.sizes.first(), spec.sizes.last()) {
        (Some(first), Some(last)) => format!("[{}-{}]", first.size, last.size),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{PackEntry, Product};

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
    fn test_pack_price_division() {
        let spec = LabelSpec::from_product(&shirt(), 1);
        let doc = LabelCompiler::default().compile(&spec).unwrap();

        let text = doc.to_text();
        // 10.00 over (2 + 3) pieces x 1 pack
        assert!(text.contains("\"2.00 лв\""));
        assert!(text.contains("\"(1.02 EUR)\""));
        assert!(text.contains("\"[S-M]\""));
        assert_eq!(doc.repeat_count(), 1);
    }

    #[test]
    fn test_multiplier_scales_divisor() {
        let mut product = shirt();
        product.multiplier = 2;
        let spec = LabelSpec::from_product(&product, 1);
        let doc = LabelCompiler::default().compile(&spec).unwrap();

        // 10.00 over 5 pieces x 2 packs
        assert!(doc.to_text().contains("\"1.00 лв\""));
    }

    #[test]
    fn test_flat_price_when_no_sizes() {
        let spec = LabelSpec::adhoc("Колан", dec!(7.50), 2);
        let doc = LabelCompiler::default().compile(&spec).unwrap();

        let text = doc.to_text();
        assert!(text.contains("\"7.50 лв\""));
        assert!(!text.contains('['));
        assert_eq!(doc.repeat_count(), 2);
    }

    #[test]
    fn test_size_range_not_resorted() {
        let mut product = shirt();
        product.sizes.reverse(); // M first, S last - stays that way
        let spec = LabelSpec::from_product(&product, 1);
        let doc = LabelCompiler::default().compile(&spec).unwrap();

        assert!(doc.to_text().contains("\"[M-S]\""));
    }

    #[test]
    fn test_size_range_single_entry() {
        let mut product = shirt();
        product.sizes.truncate(1);
        let spec = LabelSpec::from_product(&product, 1);
        let doc = LabelCompiler::default().compile(&spec).unwrap();

        assert!(doc.to_text().contains("\"[S-S]\""));
        // 10.00 over the remaining 2 pieces
        assert!(doc.to_text().contains("\"5.00 лв\""));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let spec = LabelSpec::from_product(&shirt(), 4);
        let compiler = LabelCompiler::default();

        let a = compiler.compile(&spec).unwrap();
        let b = compiler.compile(&spec).unwrap();
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn test_zero_and_negative_quantity_rejected() {
        for quantity in [0, -1, -100] {
            let spec = LabelSpec::from_product(&shirt(), quantity);
            let err = LabelCompiler::default().compile(&spec).unwrap_err();
            assert!(matches!(err, PrintError::InvalidSpec(_)), "{quantity}");
        }
    }

    #[test]
    fn test_repeat_count_equals_quantity() {
        let spec = LabelSpec::from_product(&shirt(), 7);
        let doc = LabelCompiler::default().compile(&spec).unwrap();

        assert_eq!(doc.repeat_count(), 7);
        assert!(doc.to_text().ends_with("PRINT 1,7\r\n"));
    }

    #[test]
    fn test_barcode_emitted_only_when_present() {
        let with = LabelCompiler::default()
            .compile(&LabelSpec::from_product(&shirt(), 1))
            .unwrap();
        assert!(with.to_text().contains("BARCODE"));

        let mut product = shirt();
        product.barcode = None;
        let without = LabelCompiler::default()
            .compile(&LabelSpec::from_product(&product, 1))
            .unwrap();
        // Degraded label still compiles, just without the barcode block
        assert!(!without.to_text().contains("BARCODE"));

        product.barcode = Some(String::new());
        let empty = LabelCompiler::default()
            .compile(&LabelSpec::from_product(&product, 1))
            .unwrap();
        assert!(!empty.to_text().contains("BARCODE"));
    }

    #[test]
    fn test_missing_mandatory_fields_rejected() {
        let mut spec = LabelSpec::adhoc("Колан", dec!(1.00), 1);
        spec.name = "  ".to_string();
        assert!(matches!(
            LabelCompiler::default().compile(&spec).unwrap_err(),
            PrintError::InvalidSpec(_)
        ));

        let mut spec = LabelSpec::adhoc("Колан", dec!(1.00), 1);
        spec.unit_price = None;
        assert!(matches!(
            LabelCompiler::default().compile(&spec).unwrap_err(),
            PrintError::InvalidSpec(_)
        ));

        // Pack breakdown without a pack price is malformed
        let mut spec = LabelSpec::from_product(&shirt(), 1);
        spec.pack_price = None;
        assert!(matches!(
            LabelCompiler::default().compile(&spec).unwrap_err(),
            PrintError::InvalidSpec(_)
        ));
    }

    #[test]
    fn test_render_flattened_replicates_content() {
        let spec = LabelSpec::from_product(&shirt(), 3);
        let doc = LabelCompiler::default().compile(&spec).unwrap();

        let flattened = String::from_utf8_lossy(&doc.render_flattened()).into_owned();
        assert_eq!(flattened.matches("PRINT 1,1\r\n").count(), 3);
        assert_eq!(flattened.matches("CLS\r\n").count(), 3);

        let native = String::from_utf8_lossy(&doc.render()).into_owned();
        assert_eq!(native.matches("PRINT 1,3\r\n").count(), 1);
        assert_eq!(native.matches("CLS\r\n").count(), 1);
    }

    #[test]
    fn test_convert_currency_fixed_rate() {
        assert_eq!(convert_currency(dec!(2.00)), dec!(1.02));
        assert_eq!(convert_currency(dec!(1.95583)), dec!(1.00));
        assert_eq!(convert_currency(dec!(10.00)), dec!(5.11));
        assert_eq!(convert_currency(dec!(0.00)), dec!(0.00));
    }
}
