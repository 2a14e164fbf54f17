use std::fmt::{Display, Error, Formatter};
use std::ops::Range;

use crate::header::Header;

/// Region of story memory an address falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    Dynamic,
    Static,
    High,
}

impl MemoryRegion {
    pub fn label(&self) -> &'static str {
        match self {
            MemoryRegion::Dynamic => "dynamic",
            MemoryRegion::Static => "static",
            MemoryRegion::High => "high",
        }
    }
}

impl Display for MemoryRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.label())
    }
}

pub fn classify(address: usize, header: &Header) -> MemoryRegion {
    if address < header.static_memory_base as usize {
        MemoryRegion::Dynamic
    } else if address < header.high_memory_base as usize {
        MemoryRegion::Static
    } else {
        MemoryRegion::High
    }
}

/// MemorySummary reflects the region layout of a loaded story file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySummary {
    pub dynamic: Range<usize>,
    pub static_region: Range<usize>,
    pub high: Range<usize>,
    pub file_len: usize,
    pub zero_bytes: usize,
}

impl MemorySummary {
    /// Region extents are clamped to the file length, so an implausible header
    /// yields empty ranges rather than ranges past the end.
    pub fn scan(bytes: &[u8], header: &Header) -> MemorySummary {
        let len = bytes.len();
        let static_base = (header.static_memory_base as usize).min(len);
        let high_base = (header.high_memory_base as usize).min(len).max(static_base);

        MemorySummary {
            dynamic: 0..static_base,
            static_region: static_base..high_base,
            high: high_base..len,
            file_len: len,
            zero_bytes: bytes.iter().filter(|b| **b == 0).count(),
        }
    }

    pub fn zero_percentage(&self) -> f64 {
        if self.file_len == 0 {
            return 0.0;
        }
        100.0 * self.zero_bytes as f64 / self.file_len as f64
    }
}

impl Display for MemorySummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "            base    end     size")?;
        for (range, name) in [
            (&self.dynamic, "Dynamic memory"),
            (&self.static_region, "Static memory"),
            (&self.high, "High memory"),
        ] {
            writeln!(
                f,
                "            {:#06x}\t{:#06x}\t{:#06x}     {}",
                range.start,
                range.end,
                range.len(),
                name
            )?;
        }
        writeln!(
            f,
            "Null bytes: {} ({:.1}%)",
            self.zero_bytes,
            self.zero_percentage()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(static_base: u16, high_base: u16, file_len: usize) -> Header {
        Header {
            version: 3,
            release: 1,
            high_memory_base: high_base,
            initial_pc: high_base,
            dictionary: 0,
            object_table_addr: 0,
            global_variables: 0,
            static_memory_base: static_base,
            file_len,
        }
    }

    #[test]
    fn test_classify_boundaries() {
        let header = header_with(0x100, 0x200, 0x400);
        assert_eq!(classify(0, &header), MemoryRegion::Dynamic);
        assert_eq!(classify(0xff, &header), MemoryRegion::Dynamic);
        assert_eq!(classify(0x100, &header), MemoryRegion::Static);
        assert_eq!(classify(0x1ff, &header), MemoryRegion::Static);
        assert_eq!(classify(0x200, &header), MemoryRegion::High);
        assert_eq!(classify(0xffff, &header), MemoryRegion::High);
    }

    #[test]
    fn test_inverted_bases_skip_static() {
        // static above high: nothing is static
        let header = header_with(0x300, 0x200, 0x400);
        assert_eq!(classify(0x250, &header), MemoryRegion::Dynamic);
        assert_eq!(classify(0x300, &header), MemoryRegion::High);
    }

    #[test]
    fn test_summary_clamps_to_file() {
        let mut bytes = vec![1u8; 0x80];
        bytes[0] = 0;
        bytes[1] = 0;
        let header = header_with(0x40, 0x1000, bytes.len());
        let summary = MemorySummary::scan(&bytes, &header);

        assert_eq!(summary.dynamic, 0..0x40);
        assert_eq!(summary.static_region, 0x40..0x80);
        assert_eq!(summary.high, 0x80..0x80);
        assert_eq!(summary.zero_bytes, 2);
        assert!((summary.zero_percentage() - 1.5625).abs() < 1e-9);
    }
}
