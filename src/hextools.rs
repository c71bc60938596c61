use std::fmt;

/// Wireshark-style hex dump: offset column, 16 bytes per row split 8/8,
/// printable ASCII on the right.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.0.chunks(16).enumerate() {
            write!(f, "0x{:04x}: ", row * 16)?;

            for column in 0..16 {
                if column == 8 {
                    f.write_str(" ")?;
                }
                match chunk.get(column) {
                    Some(byte) => write!(f, " {:02x}", byte)?,
                    None => f.write_str("   ")?,
                }
            }

            f.write_str("  ")?;
            for &byte in chunk {
                let shown = if byte.is_ascii_graphic() { byte as char } else { '.' };
                write!(f, "{}", shown)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
