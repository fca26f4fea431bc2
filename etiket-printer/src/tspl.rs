//! TSPL command builder
//!
//! Provides a fluent API for building TSPL label print data.

use crate::encoding::encode_cp1251;

/// TSPL command builder
///
/// Accumulates TSPL commands as UTF-8 text; [`TsplBuilder::build`] converts
/// the result to CP1251 while preserving the ASCII command frame.
pub struct TsplBuilder {
    buf: String,
}

impl TsplBuilder {
    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(512),
        }
    }

    // === Label Setup ===

    /// Set the label size in millimetres
    pub fn size_mm(&mut self, width: u32, height: u32) -> &mut Self {
        self.command(&format!("SIZE {} mm,{} mm", width, height))
    }

    /// Set the gap between labels in millimetres
    pub fn gap_mm(&mut self, gap: u32, offset: u32) -> &mut Self {
        self.command(&format!("GAP {} mm,{} mm", gap, offset))
    }

    /// Set the print direction (0 or 1)
    pub fn direction(&mut self, direction: u8) -> &mut Self {
        self.command(&format!("DIRECTION {}", direction.min(1)))
    }

    /// Select the printer code page
    pub fn codepage(&mut self, codepage: u16) -> &mut Self {
        self.command(&format!("CODEPAGE {}", codepage))
    }

    /// Clear the image buffer
    pub fn cls(&mut self) -> &mut Self {
        self.command("CLS")
    }

    // === Content ===

    /// Place a text element
    ///
    /// `font` is a TSPL font name ("0" is the scalable font), `x_mul`/`y_mul`
    /// the magnification (1-10). Double quotes inside the content would
    /// terminate the TSPL string literal and are replaced with single quotes.
    pub fn text(
        &mut self,
        x: u32,
        y: u32,
        font: &str,
        rotation: u16,
        x_mul: u8,
        y_mul: u8,
        content: &str,
    ) -> &mut Self {
        self.command(&format!(
            "TEXT {},{},\"{}\",{},{},{},\"{}\"",
            x,
            y,
            font,
            rotation,
            x_mul.clamp(1, 10),
            y_mul.clamp(1, 10),
            sanitize(content),
        ))
    }

    /// Place a barcode element
    ///
    /// `kind` is a TSPL symbology name (e.g. "128", "EAN13");
    /// `readable` 0 hides, 1 prints the human-readable line.
    #[allow(clippy::too_many_arguments)]
    pub fn barcode(
        &mut self,
        x: u32,
        y: u32,
        kind: &str,
        height: u32,
        readable: u8,
        rotation: u16,
        narrow: u8,
        wide: u8,
        content: &str,
    ) -> &mut Self {
        self.command(&format!(
            "BARCODE {},{},\"{}\",{},{},{},{},{},\"{}\"",
            x,
            y,
            kind,
            height,
            readable.min(1),
            rotation,
            narrow,
            wide,
            sanitize(content),
        ))
    }

    /// Issue the print command: `sets` label sets, `copies` copies per set
    pub fn print(&mut self, sets: u32, copies: u32) -> &mut Self {
        self.command(&format!("PRINT {},{}", sets.max(1), copies.max(1)))
    }

    /// Write a raw TSPL command line
    pub fn raw(&mut self, line: &str) -> &mut Self {
        self.command(line)
    }

    fn command(&mut self, line: &str) -> &mut Self {
        self.buf.push_str(line);
        self.buf.push_str("\r\n");
        self
    }

    // === Build ===

    /// Finalize as UTF-8 text (for inspection and tests)
    pub fn finalize(self) -> String {
        self.buf
    }

    /// Build the final byte buffer with CP1251 encoding
    pub fn build(self) -> Vec<u8> {
        encode_cp1251(self.buf.as_bytes())
    }
}

impl Default for TsplBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace characters that would break a TSPL string literal
fn sanitize(content: &str) -> String {
    content.replace('"', "'")
}
