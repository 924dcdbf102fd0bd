//! Hardware descriptors and the transfer-to-descriptor builder.
//!
//! A [`Transfer`] names two endpoints and a length. [`DescriptorBuilder`]
//! classifies both endpoints against the [`MemoryMap`] and derives the
//! trigger source, unit size and burst length from the result:
//!
//! | endpoints                 | trigger  | unit                       |
//! |---------------------------|----------|----------------------------|
//! | memory ↔ memory           | software | word if any PSRAM, else byte |
//! | any end UART FIFO         | hardware | byte                       |
//! | any end other peripheral  | hardware | word                       |
//!
//! Word transfers must move a multiple of 4 bytes; anything else is
//! [`Error::Alignment`]. Every check runs before anything is allocated.

use alloc::vec::Vec;

use super::region::{MemoryMap, PeripheralClass, RegionKind};
use crate::driver::error::{Error, Result};
use crate::internal::constants::{BURST_BEATS, DMA_CHANNELS, DMA_MAX_LEN, WORD_SIZE};

/// Control word bit fields.
pub mod ctrl {
    /// Reload the descriptor when it completes
    pub const AUTO_RELOAD: u32 = 1 << 0;
    /// Source address increments (bits 1..=2: 0 = fixed, 1 = increment)
    pub const SRC_INC: u32 = 1 << 1;
    /// Destination address increments (bits 3..=4)
    pub const DEST_INC: u32 = 1 << 3;
    /// Transfer unit shift (0 = byte, 1 = half-word, 2 = word)
    pub const UNIT_SHIFT: u32 = 5;
    /// Transfer unit mask
    pub const UNIT_MASK: u32 = 0b11 << UNIT_SHIFT;
    /// Four-beat burst
    pub const BURST4: u32 = 1 << 7;
    /// Byte count shift
    pub const LEN_SHIFT: u32 = 8;
    /// Byte count mask (16 bits)
    pub const LEN_MASK: u32 = 0xFFFF << LEN_SHIFT;
    /// Raise the channel interrupt on completion
    pub const IRQ_EN: u32 = 1 << 24;
    /// Follow `next` when this descriptor completes
    pub const CHAIN: u32 = 1 << 25;
    /// Circular addressing within the wrap lengths
    pub const WRAP: u32 = 1 << 26;
    /// Channel number shift
    pub const CHANNEL_SHIFT: u32 = 27;
    /// Channel number mask
    pub const CHANNEL_MASK: u32 = 0b111 << CHANNEL_SHIFT;
}

/// Endpoint addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddrMode {
    /// Address advances by one unit per beat
    Increment,
    /// Address stays put (FIFO register)
    Fixed,
}

impl AddrMode {
    const fn increments(self) -> bool {
        matches!(self, AddrMode::Increment)
    }
}

/// Channel operating mode requested for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaMode {
    /// One descriptor, one shot
    Normal,
    /// Circular addressing: each end wraps after the given byte count
    Wrap {
        /// Source wrap length in bytes
        src_wrap: u16,
        /// Destination wrap length in bytes
        dest_wrap: u16,
    },
    /// Element of a linked descriptor chain
    List,
}

/// What starts each beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// Runs as fast as the bus allows (memory to memory)
    Software,
    /// Paced by the peripheral's DMA request line
    Hardware(u8),
}

/// Bytes moved per beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Unit {
    /// 1 byte
    Byte = 0,
    /// 2 bytes
    HalfWord = 1,
    /// 4 bytes
    Word = 2,
}

impl Unit {
    /// Size in bytes.
    pub const fn size(self) -> usize {
        match self {
            Unit::Byte => 1,
            Unit::HalfWord => 2,
            Unit::Word => WORD_SIZE,
        }
    }

    const fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Unit::Byte,
            1 => Unit::HalfWord,
            _ => Unit::Word,
        }
    }
}

/// A logical transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Source address
    pub src: u32,
    /// Destination address
    pub dest: u32,
    /// Byte count
    pub len: usize,
    /// Source addressing
    pub src_mode: AddrMode,
    /// Destination addressing
    pub dest_mode: AddrMode,
    /// DMA request line of the peripheral end, if any
    pub request: Option<u8>,
}

impl Transfer {
    /// Memory to memory copy.
    pub const fn memcpy(src: u32, dest: u32, len: usize) -> Self {
        Self {
            src,
            dest,
            len,
            src_mode: AddrMode::Increment,
            dest_mode: AddrMode::Increment,
            request: None,
        }
    }

    /// Memory to peripheral FIFO.
    pub const fn to_peripheral(src: u32, fifo: u32, len: usize, request: u8) -> Self {
        Self {
            src,
            dest: fifo,
            len,
            src_mode: AddrMode::Increment,
            dest_mode: AddrMode::Fixed,
            request: Some(request),
        }
    }

    /// Peripheral FIFO to memory.
    pub const fn from_peripheral(fifo: u32, dest: u32, len: usize, request: u8) -> Self {
        Self {
            src: fifo,
            dest,
            len,
            src_mode: AddrMode::Fixed,
            dest_mode: AddrMode::Increment,
            request: Some(request),
        }
    }
}

/// One hardware descriptor.
///
/// The first four words are what the controller reads; the rest is driver
/// bookkeeping. `tag` is the ring slot the descriptor was built for and is
/// reported back on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct HwDescriptor {
    /// Source address
    pub src: u32,
    /// Destination address
    pub dest: u32,
    /// Control word, see [`ctrl`]
    pub ctrl: u32,
    /// Address of the next descriptor in list mode, 0 terminates
    pub next: u32,
    trigger: Trigger,
    src_wrap: u16,
    dest_wrap: u16,
    tag: u16,
}

impl HwDescriptor {
    /// Byte count.
    pub const fn len(&self) -> usize {
        ((self.ctrl & ctrl::LEN_MASK) >> ctrl::LEN_SHIFT) as usize
    }

    /// True when the byte count is zero.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transfer unit.
    pub const fn unit(&self) -> Unit {
        Unit::from_bits((self.ctrl & ctrl::UNIT_MASK) >> ctrl::UNIT_SHIFT)
    }

    /// Beats per burst.
    pub const fn burst(&self) -> usize {
        if self.ctrl & ctrl::BURST4 != 0 { BURST_BEATS } else { 1 }
    }

    /// Trigger source.
    pub const fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Wrap lengths `(src, dest)`, zero when not in wrap mode.
    pub const fn wrap(&self) -> (u16, u16) {
        (self.src_wrap, self.dest_wrap)
    }

    /// Channel stamped into the control word.
    pub const fn channel(&self) -> u8 {
        ((self.ctrl & ctrl::CHANNEL_MASK) >> ctrl::CHANNEL_SHIFT) as u8
    }

    /// True when the descriptor is part of a chain.
    pub const fn is_chained(&self) -> bool {
        self.ctrl & ctrl::CHAIN != 0
    }

    /// Ring slot this descriptor serves.
    pub const fn tag(&self) -> u16 {
        self.tag
    }

    /// Return a copy tagged with `tag`.
    #[must_use]
    pub const fn with_tag(mut self, tag: u16) -> Self {
        self.tag = tag;
        self
    }

    /// Return a copy bound to `channel`.
    #[must_use]
    pub const fn with_channel(mut self, channel: u8) -> Self {
        debug_assert!((channel as usize) < DMA_CHANNELS);
        self.ctrl = (self.ctrl & !ctrl::CHANNEL_MASK)
            | (((channel as u32) << ctrl::CHANNEL_SHIFT) & ctrl::CHANNEL_MASK);
        self
    }

    /// Return a copy with the auto-reload bit set or cleared.
    #[must_use]
    pub const fn with_auto_reload(mut self, enable: bool) -> Self {
        if enable {
            self.ctrl |= ctrl::AUTO_RELOAD;
        } else {
            self.ctrl &= !ctrl::AUTO_RELOAD;
        }
        self
    }
}

/// Owned, linked list of descriptors.
///
/// `next` fields hold the addresses of the following elements, so the
/// storage never moves once linked. Dropping the chain frees every element.
#[derive(Debug)]
pub struct DescriptorChain {
    descs: Vec<HwDescriptor>,
}

impl DescriptorChain {
    pub(crate) fn single(desc: HwDescriptor) -> Result<Self> {
        let mut descs = Vec::new();
        descs.try_reserve_exact(1)?;
        descs.push(desc);
        Ok(Self { descs })
    }

    /// Descriptors in chain order.
    pub fn descriptors(&self) -> &[HwDescriptor] {
        &self.descs
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    /// True for an empty chain.
    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Address of the first descriptor.
    pub fn head_addr(&self) -> u32 {
        self.descs.as_ptr() as u32
    }

    /// Total bytes the chain moves.
    pub fn total_len(&self) -> usize {
        self.descs.iter().map(HwDescriptor::len).sum()
    }

    fn link(&mut self) {
        let count = self.descs.len();
        for i in 0..count {
            let next = if i + 1 < count {
                &self.descs[i + 1] as *const HwDescriptor as u32
            } else {
                0
            };
            self.descs[i].next = next;
        }
    }
}

/// Turns [`Transfer`]s into [`HwDescriptor`]s.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorBuilder {
    map: MemoryMap,
}

impl DescriptorBuilder {
    /// Create a builder for the given address map.
    pub const fn new(map: MemoryMap) -> Self {
        Self { map }
    }

    /// Address map used for classification.
    pub const fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// Transfer unit forced by a peripheral FIFO.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `fifo` is not a peripheral address.
    pub fn fifo_unit(&self, fifo: u32) -> Result<Unit> {
        match self.map.classify(fifo) {
            Some(RegionKind::Peripheral(PeripheralClass::Uart)) => Ok(Unit::Byte),
            Some(RegionKind::Peripheral(PeripheralClass::Word)) => Ok(Unit::Word),
            _ => Err(Error::InvalidParameter),
        }
    }

    /// Build one descriptor.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`]: zero or oversized length, unknown
    ///   endpoint address, or a peripheral endpoint with no request line
    /// - [`Error::Alignment`]: word-unit transfer whose length is not a
    ///   multiple of 4
    pub fn build(&self, t: &Transfer, mode: DmaMode) -> Result<HwDescriptor> {
        if t.len == 0 || t.len > DMA_MAX_LEN {
            return Err(Error::InvalidParameter);
        }

        let src = self
            .map
            .classify_span(t.src, t.len, t.src_mode.increments())
            .ok_or(Error::InvalidParameter)?;
        let dest = self
            .map
            .classify_span(t.dest, t.len, t.dest_mode.increments())
            .ok_or(Error::InvalidParameter)?;

        let (trigger, unit) = match (src, dest) {
            (s, d) if s.is_memory() && d.is_memory() => {
                let psram = s == RegionKind::Psram || d == RegionKind::Psram;
                (Trigger::Software, if psram { Unit::Word } else { Unit::Byte })
            }
            (s, d) => {
                let request = t.request.ok_or(Error::InvalidParameter)?;
                let uart = [s, d]
                    .contains(&RegionKind::Peripheral(PeripheralClass::Uart));
                (Trigger::Hardware(request), if uart { Unit::Byte } else { Unit::Word })
            }
        };

        if unit == Unit::Word && t.len % WORD_SIZE != 0 {
            return Err(Error::Alignment);
        }

        let burst4 = matches!(mode, DmaMode::Normal) && t.len % (unit.size() * BURST_BEATS) == 0;

        let mut word = ctrl::IRQ_EN
            | ((unit as u32) << ctrl::UNIT_SHIFT)
            | ((t.len as u32) << ctrl::LEN_SHIFT);
        if t.src_mode.increments() {
            word |= ctrl::SRC_INC;
        }
        if t.dest_mode.increments() {
            word |= ctrl::DEST_INC;
        }
        if burst4 {
            word |= ctrl::BURST4;
        }

        let (src_wrap, dest_wrap) = match mode {
            DmaMode::Wrap { src_wrap, dest_wrap } => {
                word |= ctrl::WRAP;
                (src_wrap, dest_wrap)
            }
            DmaMode::List => {
                word |= ctrl::CHAIN;
                (0, 0)
            }
            DmaMode::Normal => (0, 0),
        };

        Ok(HwDescriptor {
            src: t.src,
            dest: t.dest,
            ctrl: word,
            next: 0,
            trigger,
            src_wrap,
            dest_wrap,
            tag: 0,
        })
    }

    /// Build a linked chain, one descriptor per transfer.
    ///
    /// All transfers are validated before the chain storage is allocated;
    /// on any failure nothing is left behind.
    ///
    /// # Errors
    ///
    /// As [`build`](Self::build), plus [`Error::InvalidParameter`] for an
    /// empty list and [`Error::NoMemory`] when the chain cannot be allocated.
    pub fn build_chain(&self, transfers: &[Transfer]) -> Result<DescriptorChain> {
        if transfers.is_empty() {
            return Err(Error::InvalidParameter);
        }
        for t in transfers {
            self.build(t, DmaMode::List)?;
        }

        let mut descs = Vec::new();
        descs.try_reserve_exact(transfers.len())?;
        for (i, t) in transfers.iter().enumerate() {
            descs.push(self.build(t, DmaMode::List)?.with_tag(i as u16));
        }

        let mut chain = DescriptorChain { descs };
        chain.link();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::region::Region;

    const UART_FIFO: u32 = 0x4000_0E00;
    const I2S_FIFO: u32 = 0x4000_1000;
    const SRAM: u32 = 0x2000_0000;
    const PSRAM: u32 = 0x3000_0000;

    static REGIONS: [Region; 4] = [
        Region::new(0x4000_0E00, 0x4000_0EFF, RegionKind::Peripheral(PeripheralClass::Uart)),
        Region::new(0x4000_0000, 0x4000_FFFF, RegionKind::Peripheral(PeripheralClass::Word)),
        Region::new(0x2000_0000, 0x2004_7FFF, RegionKind::Sram),
        Region::new(0x3000_0000, 0x307F_FFFF, RegionKind::Psram),
    ];

    fn builder() -> DescriptorBuilder {
        DescriptorBuilder::new(MemoryMap::new(&REGIONS))
    }

    #[test]
    fn sram_copy_is_software_byte() {
        let d = builder()
            .build(&Transfer::memcpy(SRAM, SRAM + 0x100, 6), DmaMode::Normal)
            .unwrap();
        assert_eq!(d.trigger(), Trigger::Software);
        assert_eq!(d.unit(), Unit::Byte);
        assert_eq!(d.burst(), 1);
        assert_eq!(d.len(), 6);
        assert!(d.ctrl & ctrl::SRC_INC != 0);
        assert!(d.ctrl & ctrl::DEST_INC != 0);
        assert!(d.ctrl & ctrl::IRQ_EN != 0);
    }

    #[test]
    fn fifo_unit_follows_peripheral_class() {
        let b = builder();
        assert_eq!(b.fifo_unit(UART_FIFO), Ok(Unit::Byte));
        assert_eq!(b.fifo_unit(I2S_FIFO), Ok(Unit::Word));
        assert_eq!(b.fifo_unit(SRAM), Err(Error::InvalidParameter));
        assert_eq!(b.fifo_unit(0x6000_0000), Err(Error::InvalidParameter));
    }

    #[test]
    fn psram_forces_word_unit() {
        let d = builder()
            .build(&Transfer::memcpy(PSRAM, SRAM, 32), DmaMode::Normal)
            .unwrap();
        assert_eq!(d.unit(), Unit::Word);
        assert_eq!(d.burst(), 4);
    }

    #[test]
    fn psram_misaligned_length_is_alignment_error() {
        let b = builder();
        assert_eq!(
            b.build(&Transfer::memcpy(SRAM, PSRAM, 30), DmaMode::Normal),
            Err(Error::Alignment)
        );
        assert_eq!(
            b.build_chain(&[Transfer::memcpy(SRAM, SRAM + 64, 8), Transfer::memcpy(PSRAM, SRAM, 7)])
                .err(),
            Some(Error::Alignment)
        );
    }

    #[test]
    fn uart_fifo_is_hardware_byte() {
        let d = builder()
            .build(&Transfer::to_peripheral(SRAM, UART_FIFO, 5, 3), DmaMode::Normal)
            .unwrap();
        assert_eq!(d.trigger(), Trigger::Hardware(3));
        assert_eq!(d.unit(), Unit::Byte);
        assert_eq!(d.ctrl & ctrl::DEST_INC, 0);
    }

    #[test]
    fn word_peripheral_requires_alignment() {
        let b = builder();
        let ok = b
            .build(&Transfer::from_peripheral(I2S_FIFO, SRAM, 64, 1), DmaMode::Normal)
            .unwrap();
        assert_eq!(ok.unit(), Unit::Word);
        assert_eq!(ok.trigger(), Trigger::Hardware(1));
        assert_eq!(
            b.build(&Transfer::from_peripheral(I2S_FIFO, SRAM, 6, 1), DmaMode::Normal),
            Err(Error::Alignment)
        );
    }

    #[test]
    fn peripheral_without_request_line_rejected() {
        let mut t = Transfer::to_peripheral(SRAM, I2S_FIFO, 16, 0);
        t.request = None;
        assert_eq!(builder().build(&t, DmaMode::Normal), Err(Error::InvalidParameter));
    }

    #[test]
    fn burst_selection() {
        let b = builder();
        // Byte unit: burst needs a multiple of 4 bytes.
        let d = b.build(&Transfer::memcpy(SRAM, SRAM + 64, 8), DmaMode::Normal).unwrap();
        assert_eq!(d.burst(), 4);
        // Word unit: burst needs a multiple of 16 bytes.
        let d = b
            .build(&Transfer::to_peripheral(SRAM, I2S_FIFO, 20, 1), DmaMode::Normal)
            .unwrap();
        assert_eq!(d.burst(), 1);
        // Non-normal modes never burst.
        let d = b.build(&Transfer::memcpy(SRAM, SRAM + 64, 16), DmaMode::List).unwrap();
        assert_eq!(d.burst(), 1);
        let wrap = DmaMode::Wrap { src_wrap: 16, dest_wrap: 0 };
        let d = b.build(&Transfer::memcpy(SRAM, SRAM + 64, 16), wrap).unwrap();
        assert_eq!(d.burst(), 1);
        assert_eq!(d.wrap(), (16, 0));
        assert!(d.ctrl & ctrl::WRAP != 0);
    }

    #[test]
    fn length_limits() {
        let b = builder();
        assert_eq!(
            b.build(&Transfer::memcpy(SRAM, SRAM + 4, 0), DmaMode::Normal),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            b.build(&Transfer::memcpy(SRAM, SRAM + 0x2_0000, DMA_MAX_LEN + 1), DmaMode::Normal),
            Err(Error::InvalidParameter)
        );
        let d = b
            .build(&Transfer::memcpy(SRAM, SRAM + 0x2_0000, DMA_MAX_LEN), DmaMode::Normal)
            .unwrap();
        assert_eq!(d.len(), DMA_MAX_LEN);
    }

    #[test]
    fn unknown_address_rejected() {
        assert_eq!(
            builder().build(&Transfer::memcpy(0x0800_0000, SRAM, 4), DmaMode::Normal),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn channel_and_tag_stamping() {
        let d = builder()
            .build(&Transfer::memcpy(SRAM, SRAM + 4, 4), DmaMode::Normal)
            .unwrap()
            .with_channel(5)
            .with_tag(9);
        assert_eq!(d.channel(), 5);
        assert_eq!(d.tag(), 9);
        assert_eq!(d.len(), 4);
        assert_eq!(d.with_channel(2).channel(), 2);
    }

    #[test]
    fn chain_links_elements_in_order() {
        let chain = builder()
            .build_chain(&[
                Transfer::memcpy(SRAM, SRAM + 0x100, 8),
                Transfer::memcpy(SRAM + 8, SRAM + 0x108, 8),
                Transfer::memcpy(PSRAM, SRAM + 0x200, 12),
            ])
            .unwrap();
        let descs = chain.descriptors();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.total_len(), 28);
        assert_eq!(chain.head_addr(), &descs[0] as *const HwDescriptor as u32);
        assert_eq!(descs[0].next, &descs[1] as *const HwDescriptor as u32);
        assert_eq!(descs[1].next, &descs[2] as *const HwDescriptor as u32);
        assert_eq!(descs[2].next, 0);
        assert!(descs.iter().all(HwDescriptor::is_chained));
        assert_eq!(descs[2].tag(), 2);
        assert_eq!(descs[2].unit(), Unit::Word);
    }

    #[test]
    fn empty_chain_rejected() {
        assert_eq!(builder().build_chain(&[]).err(), Some(Error::InvalidParameter));
    }
}
