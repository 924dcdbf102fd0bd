//! Address-range classification for DMA endpoints.
//!
//! The unit size and trigger source of a transfer depend on where its two
//! endpoints live. A [`MemoryMap`] is a static table of ranges; the first
//! range containing an address wins.

/// Class of a peripheral FIFO register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralClass {
    /// Byte-wide FIFO (UART family)
    Uart,
    /// Word-wide FIFO (I2S, ADC, PWM, SPI, ...)
    Word,
}

/// What lives in an address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionKind {
    /// On-chip SRAM
    Sram,
    /// External PSRAM (word access only)
    Psram,
    /// Peripheral register space
    Peripheral(PeripheralClass),
}

impl RegionKind {
    /// True for SRAM and PSRAM.
    #[inline]
    pub const fn is_memory(self) -> bool {
        matches!(self, RegionKind::Sram | RegionKind::Psram)
    }
}

/// One address range, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    /// First address
    pub start: u32,
    /// Last address (inclusive)
    pub end: u32,
    /// Contents of the range
    pub kind: RegionKind,
}

impl Region {
    /// Create a region.
    pub const fn new(start: u32, end: u32, kind: RegionKind) -> Self {
        Self { start, end, kind }
    }

    /// Check whether `addr` falls inside the region.
    #[inline]
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }
}

/// Static table of address ranges.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMap {
    regions: &'static [Region],
}

impl MemoryMap {
    /// Create a map from a region table. Earlier entries take precedence.
    pub const fn new(regions: &'static [Region]) -> Self {
        Self { regions }
    }

    /// Region table.
    pub const fn regions(&self) -> &'static [Region] {
        self.regions
    }

    /// Find the region containing `addr`.
    pub fn region_of(&self, addr: u32) -> Option<&'static Region> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// Classify a single address.
    pub fn classify(&self, addr: u32) -> Option<RegionKind> {
        self.region_of(addr).map(|r| r.kind)
    }

    /// Classify an endpoint touched by a transfer of `len` bytes.
    ///
    /// An incrementing endpoint must stay inside one region for the whole
    /// span; a fixed endpoint (FIFO register) is checked at `addr` only.
    pub fn classify_span(&self, addr: u32, len: usize, incrementing: bool) -> Option<RegionKind> {
        let region = self.region_of(addr)?;
        if incrementing && len > 1 {
            let last = addr.checked_add(u32::try_from(len - 1).ok()?)?;
            if !region.contains(last) {
                return None;
            }
        }
        Some(region.kind)
    }
}
