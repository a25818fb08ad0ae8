//! Human-readable views of validated extents.

use crate::hex_image::Extent;
use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

fn format_addr(addr: usize) -> String {
    let s = format!("{addr:08X}");
    format!("0x{}_{}", &s[..s.len() - 4], &s[s.len() - 4..])
}

/// One line per extent: address range (inclusive) and size.
///
/// # Example
/// ```
/// use factoryhex::{Extent, dump};
///
/// let extents = [Extent { start: 0x8000, data: vec![0xBB; 64] }];
/// assert_eq!(dump::summary(&extents), "0x0000_8000 - 0x0000_803F  64 bytes\n");
/// ```
#[must_use]
pub fn summary(extents: &[Extent]) -> String {
    let mut out = String::new();
    for extent in extents.iter().filter(|extent| !extent.is_empty()) {
        let _ = writeln!(
            out,
            "{} - {}  {} bytes",
            format_addr(extent.start),
            format_addr(extent.end() - 1),
            extent.len()
        );
    }
    out
}

/// Classic hex dump of every extent: address, 16 bytes in hex, and their ASCII rendering.
/// Lines are aligned to 16-byte boundaries; bytes outside the extent are left blank.
#[must_use]
pub fn hexdump(extents: &[Extent]) -> String {
    let mut out = String::new();

    for extent in extents.iter().filter(|extent| !extent.is_empty()) {
        let _ = writeln!(
            out,
            "[{} - {}] {} bytes",
            format_addr(extent.start),
            format_addr(extent.end() - 1),
            extent.len()
        );

        let end = extent.end();
        let first_line = extent.start - extent.start % BYTES_PER_LINE;
        for line_addr in (first_line..end).step_by(BYTES_PER_LINE) {
            let mut hex = String::with_capacity(BYTES_PER_LINE * 3);
            let mut ascii = String::with_capacity(BYTES_PER_LINE);

            for addr in line_addr..line_addr + BYTES_PER_LINE {
                if addr == line_addr + BYTES_PER_LINE / 2 {
                    hex.push(' ');
                }
                if addr < extent.start || addr >= end {
                    hex.push_str("   ");
                    ascii.push(' ');
                    continue;
                }

                let byte = extent.data[addr - extent.start];
                let _ = write!(hex, "{byte:02X} ");
                ascii.push(if byte.is_ascii_graphic() || byte == b' ' {
                    byte as char
                } else {
                    '.'
                });
            }

            let _ = writeln!(out, "{line_addr:08X}  {hex} |{ascii}|");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_addr() {
        assert_eq!(format_addr(0x0), "0x0000_0000");
        assert_eq!(format_addr(0x0FE0_0100), "0x0FE0_0100");
    }

    #[test]
    fn test_summary_multiple_extents() {
        // Arrange
        let extents = [
            Extent {
                start: 0x0,
                data: vec![0xAA; 32],
            },
            Extent {
                start: 0x0FE0_0100,
                data: vec![0x12, 0x34],
            },
        ];

        // Act
        let text = summary(&extents);

        // Assert
        assert_eq!(
            text,
            "0x0000_0000 - 0x0000_001F  32 bytes\n0x0FE0_0100 - 0x0FE0_0101  2 bytes\n"
        );
    }

    #[test]
    fn test_hexdump_aligned_extent() {
        // Arrange
        let extents = [Extent {
            start: 0x10,
            data: b"Hello, factory!\x00".to_vec(),
        }];

        // Act
        let text = hexdump(&extents);

        // Assert
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[0x0000_0010 - 0x0000_001F] 16 bytes");
        assert_eq!(
            lines[1],
            "00000010  48 65 6C 6C 6F 2C 20 66  61 63 74 6F 72 79 21 00  |Hello, factory!.|"
        );
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_hexdump_unaligned_extent() {
        // Arrange
        let extents = [Extent {
            start: 0x0E,
            data: vec![0x41, 0x42, 0x43, 0x44],
        }];

        // Act
        let text = hexdump(&extents);

        // Assert
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("00000000  "));
        assert!(lines[1].ends_with("41 42  |              AB|"));
        assert!(lines[2].starts_with("00000010  43 44 "));
        assert!(lines[2].ends_with("|CD              |"));
    }

    #[test]
    fn test_hexdump_range_follows_data() {
        // Arrange
        let extents = [Extent {
            start: 0x0,
            data: vec![0x01, 0x02],
        }];

        // Act
        let text = hexdump(&extents);

        // Assert
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[0x0000_0000 - 0x0000_0001] 2 bytes");
        assert!(lines[1].starts_with("00000000  01 02 "));
        assert!(lines[1].ends_with("|..              |"));
        assert_eq!(lines.len(), 2);
    }
}
