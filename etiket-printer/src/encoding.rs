//! CP1251 encoding utilities for Cyrillic label printers
//!
//! The label printers this crate targets expect Windows-1251 for Cyrillic
//! text (`CODEPAGE 1251`). This module provides utilities for:
//! - Calculating CP1251 string widths
//! - Truncating/padding strings to CP1251 widths
//! - Converting UTF-8 to CP1251 while preserving TSPL command bytes

/// Get the CP1251 byte width of a string
///
/// Cyrillic and ASCII characters are both 1 byte in CP1251; characters
/// outside the code page are replaced and still count as their encoded
/// width.
pub fn cp1251_width(s: &str) -> usize {
    let (cow, _, _) = encoding_rs::WINDOWS_1251.encode(s);
    cow.len()
}

/// Truncate a string to fit within a CP1251 byte width
pub fn truncate_cp1251(s: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let s_char = c.to_string();
        let (cow, _, _) = encoding_rs::WINDOWS_1251.encode(&s_char);
        let char_len = cow.len();

        if width + char_len > max_width {
            break;
        }
        result.push(c);
        width += char_len;
    }
    result
}

/// Pad a string to a specific CP1251 byte width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_cp1251(s: &str, width: usize, align_right: bool) -> String {
    let current_width = cp1251_width(s);
    if current_width >= width {
        return truncate_cp1251(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Convert UTF-8 TSPL content to CP1251
///
/// ASCII bytes (0x00-0x7F) are passed through exactly as is, which keeps
/// TSPL keywords, quotes and line terminators intact. Only bytes >= 0x80
/// are treated as UTF-8 sequences and converted to CP1251.
pub fn encode_cp1251(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len());
    let mut buffer = Vec::new();

    for &b in bytes {
        if b < 128 {
            // ASCII byte (command or ASCII text)
            flush_buffer(&mut buffer, &mut result);
            result.push(b);
        } else {
            // Non-ASCII byte (part of a UTF-8 sequence)
            buffer.push(b);
        }
    }

    flush_buffer(&mut buffer, &mut result);
    result
}

/// Flush the non-ASCII buffer, converting UTF-8 to CP1251
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(buffer);
    let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode(&s);
    result.extend_from_slice(&encoded);
    buffer.clear();
}
