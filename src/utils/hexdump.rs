//! Hex dump of captured memory for verbose output

use std::fmt::Write;

/// Render `bytes` sixteen per line, each line prefixed with its offset
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + bytes.len() / 16 * 7);
    for (line, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:04X}: ", line * 16);
        for byte in chunk {
            let _ = write!(out, "{:02x} ", byte);
        }
        out.push('\n');
    }
    out
}
