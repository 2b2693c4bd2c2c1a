// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Canonical offset + hex + ASCII rendering of a byte slice, 16 columns per
//! line with a gap after the eighth column. Used by the host tool to render
//! responses it can't otherwise interpret, and exercised directly by tests
//! since its exact output is a pinned property.

use core::fmt;

const COLUMNS: usize = 16;
const MID_GAP_AFTER: usize = 8;

/// Wraps a byte slice for `Display`-based hex-dump rendering.
pub struct HexDump<'a>(pub &'a [u8]);

impl<'a> HexDump<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self(data)
    }
}

impl<'a> fmt::Display for HexDump<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (line_index, chunk) in self.0.chunks(COLUMNS).enumerate() {
            if line_index > 0 {
                writeln!(f)?;
            }
            write!(f, "{:08x}  ", line_index * COLUMNS)?;
            for i in 0..COLUMNS {
                match chunk.get(i) {
                    Some(b) => write!(f, "{b:02x} ")?,
                    None => write!(f, "   ")?,
                }
                if i + 1 == MID_GAP_AFTER {
                    write!(f, " ")?;
                }
            }
            write!(f, " ")?;
            for i in 0..COLUMNS {
                match chunk.get(i) {
                    Some(&b) if (0x20..0x7f).contains(&b) => write!(f, "{}", b as char)?,
                    Some(_) => write!(f, ".")?,
                    None => write!(f, " ")?,
                }
            }
        }
        // An empty slice still produces one (empty) line, matching a
        // degenerate single-chunk dump.
        if self.0.is_empty() {
            write!(f, "{:08x}  ", 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fixed-capacity `core::fmt::Write` sink, for exercising `HexDump`
    /// without pulling in `std` or an allocator.
    struct FixedBuf<const N: usize> {
        data: [u8; N],
        len: usize,
    }

    impl<const N: usize> FixedBuf<N> {
        fn new() -> Self {
            Self { data: [0; N], len: 0 }
        }
        fn as_str(&self) -> &str {
            core::str::from_utf8(&self.data[..self.len]).unwrap()
        }
    }

    impl<const N: usize> fmt::Write for FixedBuf<N> {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let bytes = s.as_bytes();
            self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
            self.len += bytes.len();
            Ok(())
        }
    }

    #[test]
    fn renders_three_bytes_exactly() {
        // P8 scenario: hex-dump of b"123"
        let expected =
            "00000000  31 32 33                                          123             ";
        let mut buf: FixedBuf<128> = FixedBuf::new();
        fmt::write(&mut buf, format_args!("{}", HexDump::new(b"123"))).unwrap();
        assert_eq!(buf.as_str(), expected);
    }

    #[test]
    fn wraps_a_62_byte_alphanumeric_string_into_four_lines() {
        let mut data = [0u8; 62];
        for (i, b) in data.iter_mut().enumerate() {
            *b = b'a' + (i % 26) as u8;
        }
        let mut buf: FixedBuf<512> = FixedBuf::new();
        fmt::write(&mut buf, format_args!("{}", HexDump::new(&data))).unwrap();
        let lines: heapless::Vec<&str, 8> = buf.as_str().lines().collect();
        assert_eq!(lines.len(), 4);
        let full_width = lines[0].len();
        for line in lines.iter() {
            assert_eq!(line.len(), full_width);
        }
        assert!(lines[3].contains("61 62 63 64 65 66 67 68 69 6a 6b 6c 6d 6e"));
    }
}
